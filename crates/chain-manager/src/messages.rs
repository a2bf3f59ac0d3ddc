//! Chain manager inputs and the committee envelope.
//!
//! # Wire Format
//!
//! Committee log messages of different committees share one transport
//! channel. Each is wrapped with its committee id:
//!
//! ```text
//! [id_len: u16 BE][committee id: id_len bytes][committee log payload]
//! ```

use anchorlog_cmt_log::CmtLogMessage;
use anchorlog_core::{CodecError, WireMessage, WireReader};
use anchorlog_types::{
    AnchorOutput, CommitteeId, LogIndex, OutputId, Transaction, TransactionId,
};

/// Local events fed to the chain manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainManagerInput {
    /// The ledger confirmed an anchor.
    AnchorConfirmed(AnchorOutput),

    /// The ledger rejected an anchor.
    AnchorRejected(AnchorOutput),

    /// A consensus round of `committee` finished.
    ConsensusOutput {
        committee: CommitteeId,
        log_index: LogIndex,
        consumed: OutputId,
        produced: AnchorOutput,
        transaction: Transaction,
    },

    /// A consensus round of `committee` timed out.
    ConsensusTimeout {
        committee: CommitteeId,
        log_index: LogIndex,
    },

    /// The ledger client finished publishing a transaction.
    PublishResult {
        transaction_id: TransactionId,
        confirmed: bool,
    },
}

impl ChainManagerInput {
    pub fn type_name(&self) -> &'static str {
        match self {
            ChainManagerInput::AnchorConfirmed(_) => "AnchorConfirmed",
            ChainManagerInput::AnchorRejected(_) => "AnchorRejected",
            ChainManagerInput::ConsensusOutput { .. } => "ConsensusOutput",
            ChainManagerInput::ConsensusTimeout { .. } => "ConsensusTimeout",
            ChainManagerInput::PublishResult { .. } => "PublishResult",
        }
    }
}

/// A committee log message addressed to one committee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmtLogEnvelope {
    pub committee: CommitteeId,
    pub inner: CmtLogMessage,
}

impl WireMessage for CmtLogEnvelope {
    fn encode(&self) -> Vec<u8> {
        let inner = self.inner.encode();
        let mut bytes = Vec::with_capacity(2 + CommitteeId::LEN + inner.len());
        bytes.extend_from_slice(&(CommitteeId::LEN as u16).to_be_bytes());
        bytes.extend_from_slice(self.committee.as_bytes());
        bytes.extend(inner);
        bytes
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = WireReader::new(bytes);
        let id_len = reader.read_u16()? as usize;
        if id_len != CommitteeId::LEN {
            return Err(CodecError::InvalidCommitteeIdLength(id_len));
        }
        let committee = CommitteeId::from_slice(reader.take(id_len)?)
            .map_err(|_| CodecError::InvalidCommitteeIdLength(id_len))?;
        let inner = CmtLogMessage::decode(reader.rest())?;
        Ok(Self { committee, inner })
    }

    fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }
}
