//! The protocol contract.

use crate::{CodecError, OutMessages};
use anchorlog_types::NodeId;

/// A message that may cross the peer transport.
///
/// Only peer-to-peer message enums implement this. Local inputs (ledger
/// events, consensus results, suspend) deliberately do not.
pub trait WireMessage: Sized {
    /// Encode to the wire format.
    fn encode(&self) -> Vec<u8>;

    /// Decode from the wire format, consuming the whole slice.
    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;

    /// Human-readable name for diagnostics.
    fn type_name(&self) -> &'static str;
}

/// A synchronous, deterministic protocol instance.
///
/// Implementations must not block (apart from their persistence port), spawn
/// work or perform network I/O. Every effect is either an element of the
/// returned [`OutMessages`] or visible through [`Protocol::output`].
pub trait Protocol {
    /// Local events fed by the driver.
    type Input;

    /// Peer-to-peer messages.
    type Message: WireMessage;

    /// The current instruction for the driver.
    type Output;

    /// Handle a local input.
    fn input(&mut self, input: Self::Input) -> OutMessages<Self::Message>;

    /// Handle a message received from a peer.
    fn message(&mut self, from: NodeId, message: Self::Message) -> OutMessages<Self::Message>;

    /// Current output, if any.
    fn output(&self) -> Option<&Self::Output>;

    /// One-line state summary for logs.
    fn status(&self) -> String;

    /// Decode a raw payload from `from` and handle it.
    ///
    /// Malformed payloads are dropped with a warning.
    fn message_bytes(&mut self, from: NodeId, bytes: &[u8]) -> OutMessages<Self::Message> {
        match Self::Message::decode(bytes) {
            Ok(message) => self.message(from, message),
            Err(error) => {
                tracing::warn!(%from, %error, len = bytes.len(), "Dropping malformed message");
                OutMessages::new()
            }
        }
    }
}
