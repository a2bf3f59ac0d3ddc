//! Actor core for committee chain protocols.
//!
//! Every protocol in this workspace implements [`Protocol`]:
//!
//! ```text
//! Input / (from, Message) → Protocol → OutMessages
//!                                 └──→ Output()
//! ```
//!
//! A protocol instance is:
//! - **Synchronous**: No async, no spawning, no .await
//! - **Deterministic**: Same state + same call = same messages
//! - **Pure-ish**: Mutates self; the only permitted I/O is a synchronous
//!   persistence port injected at construction
//!
//! The driver (simulation or a real node) owns transport and scheduling:
//! 1. Decodes bytes into the protocol's wire message enum
//! 2. Delivers inputs and messages
//! 3. Sends the returned [`OutMessages`] and acts on [`Protocol::output`]
//!
//! Wire messages implement [`WireMessage`]. Local inputs are plain enums with
//! no codec, so a local-only message can never be handed to the transport.

mod codec;
mod message;
mod traits;

pub use codec::{CodecError, WireReader};
pub use message::{OutMessage, OutMessages};
pub use traits::{Protocol, WireMessage};
