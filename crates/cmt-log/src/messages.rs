//! Inputs and wire messages of the committee log.
//!
//! # Wire Format
//!
//! ```text
//! NextLogIndex: [tag: u8 = 1][log_index: u32 BE]
//! ```

use anchorlog_core::{CodecError, WireMessage, WireReader};
use anchorlog_types::{AnchorOutput, LogIndex, OutputId};

/// Type tag of [`CmtLogMessage::NextLogIndex`].
pub const MSG_NEXT_LOG_INDEX: u8 = 1;

/// Local events fed to a committee log by its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmtLogInput {
    /// First input after construction; proposes the minimal log index.
    Start,

    /// The ledger confirmed an anchor controlled by this committee.
    AnchorConfirmed(AnchorOutput),

    /// The ledger rejected an anchor (or its publication failed).
    AnchorRejected(AnchorOutput),

    /// A consensus round finished.
    ConsensusOutput {
        log_index: LogIndex,
        /// Anchor the round consumed.
        consumed: OutputId,
        /// Anchor the round produced.
        produced: AnchorOutput,
    },

    /// A consensus round did not finish in time.
    ConsensusTimeout { log_index: LogIndex },

    /// Stop starting new rounds.
    Suspend,
}

impl CmtLogInput {
    pub fn type_name(&self) -> &'static str {
        match self {
            CmtLogInput::Start => "Start",
            CmtLogInput::AnchorConfirmed(_) => "AnchorConfirmed",
            CmtLogInput::AnchorRejected(_) => "AnchorRejected",
            CmtLogInput::ConsensusOutput { .. } => "ConsensusOutput",
            CmtLogInput::ConsensusTimeout { .. } => "ConsensusTimeout",
            CmtLogInput::Suspend => "Suspend",
        }
    }
}

/// Messages exchanged between committee log instances of one committee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmtLogMessage {
    /// Vote for the next log index.
    NextLogIndex(LogIndex),
}

impl WireMessage for CmtLogMessage {
    fn encode(&self) -> Vec<u8> {
        match self {
            CmtLogMessage::NextLogIndex(li) => {
                let mut bytes = Vec::with_capacity(5);
                bytes.push(MSG_NEXT_LOG_INDEX);
                bytes.extend_from_slice(&li.as_u32().to_be_bytes());
                bytes
            }
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = WireReader::new(bytes);
        let message = match reader.read_u8()? {
            MSG_NEXT_LOG_INDEX => CmtLogMessage::NextLogIndex(LogIndex(reader.read_u32()?)),
            other => return Err(CodecError::UnknownMessageType(other)),
        };
        reader.finish()?;
        Ok(message)
    }

    fn type_name(&self) -> &'static str {
        match self {
            CmtLogMessage::NextLogIndex(_) => "NextLogIndex",
        }
    }
}
