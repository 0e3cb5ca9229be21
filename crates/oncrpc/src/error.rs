// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for RPC operations.
//!
//! The taxonomy follows RFC 1831: accept-level conditions travel on the
//! wire as successful replies, reject-level conditions as denials, and
//! transport conditions (disconnect, send failure, timeout) never reach
//! the wire at all -- they surface locally to the caller's handler.

use crate::protocol::message::AuthStat;
use crate::xdr::XdrError;
use std::fmt;

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors surfaced to RPC callers and handlers.
#[derive(Debug, Clone)]
pub enum RpcError {
    /// XDR encode/decode failure (truncated or corrupt data).
    Codec(XdrError),

    /// The message envelope carried an unknown discriminant.
    Envelope(String),

    /// Server has no such program.
    ProgUnavailable,

    /// Server has the program, but not this version.
    ProgMismatch { low: u32, high: u32 },

    /// Server has the program/version, but not this procedure.
    ProcUnavailable,

    /// Server could not decode the call arguments.
    GarbageArgs,

    /// Unexpected error inside the remote handler.
    SystemError,

    /// Server does not speak this RPC protocol version.
    RpcMismatch { low: u32, high: u32 },

    /// Call denied for an authentication reason.
    Auth(AuthStat),

    /// Connection lost; delivered to every pending request on it.
    Disconnected,

    /// Handing the message to the transport failed.
    SendFailed(String),

    /// No reply arrived within the caller's timeout.
    Timeout,

    /// The caller cancelled the local wait. The message already on the
    /// wire is not retracted.
    Cancelled,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Codec(e) => write!(f, "XDR error: {}", e),
            Self::Envelope(msg) => write!(f, "malformed RPC message: {}", msg),
            Self::ProgUnavailable => write!(f, "program unavailable"),
            Self::ProgMismatch { low, high } => {
                write!(f, "program version mismatch (supported {}..{})", low, high)
            }
            Self::ProcUnavailable => write!(f, "procedure unavailable"),
            Self::GarbageArgs => write!(f, "garbage arguments"),
            Self::SystemError => write!(f, "remote system error"),
            Self::RpcMismatch { low, high } => {
                write!(f, "RPC version mismatch (supported {}..{})", low, high)
            }
            Self::Auth(stat) => write!(f, "authentication error: {:?}", stat),
            Self::Disconnected => write!(f, "connection closed"),
            Self::SendFailed(msg) => write!(f, "send failed: {}", msg),
            Self::Timeout => write!(f, "call timed out"),
            Self::Cancelled => write!(f, "call cancelled"),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<XdrError> for RpcError {
    fn from(e: XdrError) -> Self {
        Self::Codec(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_variants() {
        assert_eq!(
            format!("{}", RpcError::ProgMismatch { low: 2, high: 4 }),
            "program version mismatch (supported 2..4)"
        );
        assert_eq!(format!("{}", RpcError::Timeout), "call timed out");
        assert_eq!(format!("{}", RpcError::Disconnected), "connection closed");
    }

    #[test]
    fn test_codec_error_source() {
        use std::error::Error;
        let err = RpcError::from(XdrError::Truncated { offset: 0, needed: 4 });
        assert!(err.source().is_some());
    }
}
