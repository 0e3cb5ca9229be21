// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! XDR (External Data Representation, RFC 4506) encoding/decoding.
//!
//! Every value on an ONC RPC wire goes through this module: the message
//! headers, the credentials, and the application payloads. The format is
//! big-endian throughout, with all opaque/string data padded to 4-byte
//! alignment.

pub mod buffer;
pub mod traits;

pub use buffer::{ChunkSource, XdrBuffer};
pub use traits::{XdrDecode, XdrEncode};

use std::fmt;

/// Error type for XDR encode/decode operations.
#[derive(Debug, Clone)]
pub enum XdrError {
    /// Fewer bytes remain in the buffer than the field requires.
    Truncated { offset: usize, needed: usize },

    /// A decoded length or element count is negative.
    CorruptLength { value: i32 },

    /// A fixed-size vector/opaque was supplied with the wrong number of
    /// elements. Caller bug, not a wire-protocol condition.
    LengthMismatch { expected: usize, actual: usize },

    /// A decoded string is not valid UTF-8.
    InvalidUtf8 { offset: usize },

    /// An external payload is already attached to this buffer.
    PayloadAttached,

    /// The buffer is inside a begin/end encode or decode pass.
    InUse,

    /// Reading from an attached external payload source failed.
    PayloadSource { reason: String },
}

impl fmt::Display for XdrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { offset, needed } => {
                write!(f, "truncated stream at offset {}: {} bytes needed", offset, needed)
            }
            Self::CorruptLength { value } => {
                write!(f, "corrupt length/count on wire: {}", value)
            }
            Self::LengthMismatch { expected, actual } => {
                write!(f, "fixed vector length mismatch: expected {}, got {}", expected, actual)
            }
            Self::InvalidUtf8 { offset } => {
                write!(f, "string at offset {} is not valid UTF-8", offset)
            }
            Self::PayloadAttached => {
                write!(f, "an external payload is already attached")
            }
            Self::InUse => write!(f, "buffer is in use by an encode/decode pass"),
            Self::PayloadSource { reason } => {
                write!(f, "external payload read failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for XdrError {}

pub type XdrResult<T> = Result<T, XdrError>;

/// Bytes of zero padding needed after `len` bytes of opaque data.
#[inline]
pub fn pad_for(len: usize) -> usize {
    (4 - len % 4) % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_for() {
        assert_eq!(pad_for(0), 0);
        assert_eq!(pad_for(1), 3);
        assert_eq!(pad_for(2), 2);
        assert_eq!(pad_for(3), 1);
        assert_eq!(pad_for(4), 0);
        assert_eq!(pad_for(5), 3);
    }

    #[test]
    fn test_error_display() {
        let err = XdrError::Truncated { offset: 12, needed: 4 };
        assert_eq!(format!("{}", err), "truncated stream at offset 12: 4 bytes needed");

        let err = XdrError::CorruptLength { value: -3 };
        assert_eq!(format!("{}", err), "corrupt length/count on wire: -3");

        let err = XdrError::LengthMismatch { expected: 8, actual: 5 };
        assert_eq!(format!("{}", err), "fixed vector length mismatch: expected 8, got 5");
    }
}
