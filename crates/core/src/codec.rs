//! Shared helpers for the fixed binary wire formats.
//!
//! Integers are big-endian. Every decoder must consume its whole input;
//! leftover bytes are an error.

use thiserror::Error;

/// Errors that can occur while decoding a wire payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Message too short: needed {needed} more bytes, {remaining} remaining")]
    MessageTooShort { needed: usize, remaining: usize },

    #[error("Unknown message type tag: {0}")]
    UnknownMessageType(u8),

    #[error("Trailing bytes after message: {0}")]
    TrailingBytes(usize),

    #[error("Invalid committee id length: {0}")]
    InvalidCommitteeIdLength(usize),

    #[error("Unknown committee: {0}")]
    UnknownCommittee(String),
}

/// Cursor over a received payload.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Take the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.data.len() < n {
            return Err(CodecError::MessageTooShort {
                needed: n - self.data.len(),
                remaining: self.data.len(),
            });
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    /// Take everything left.
    pub fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.data)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Fail if any bytes are left unread.
    pub fn finish(self) -> Result<(), CodecError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes(self.data.len()))
        }
    }
}
