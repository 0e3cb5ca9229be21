// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RPCSEC_GSS security layer (RFC 2203).
//!
//! An optional filter between message decode and the dispatch engine,
//! active only for calls whose credential is `RPCSEC_GSS`. Control
//! procedures (Init/Continue/Destroy) negotiate and tear down a security
//! context; Data procedures verify a MIC over the call header and, at
//! the Integrity/Privacy service levels, (un)wrap the argument and
//! result bodies.
//!
//! The GSS mechanism itself (Kerberos and friends) stays behind the
//! [`GssContext`] trait; [`HmacSealMechanism`] ships as a shared-secret
//! mechanism built on HMAC-SHA256 and AES-256-GCM.

pub mod context;
pub mod filter;
pub mod mechanism;

pub use context::{GssContext, GssMechanism, GssSessionTable, SessionState};
pub use filter::{GssClientSession, GssFilter};
pub use mechanism::HmacSealMechanism;

use crate::error::RpcError;
use crate::protocol::message::AuthStat;
use std::fmt;

/// GSS layer failures. All of them surface on the wire as `AUTH_ERROR`
/// with a GSS-specific reason.
#[derive(Debug, Clone)]
pub enum GssError {
    /// No session for the presented context handle.
    NoContext,

    /// Session exists but is in the wrong state for the procedure.
    WrongState,

    /// A message integrity checksum did not verify.
    MicMismatch,

    /// Sealing or unsealing a body failed.
    SealFailure(String),

    /// The underlying mechanism rejected a negotiation token.
    Mechanism(String),

    /// Data call sequence number outside the accepted range.
    SequenceOutOfRange(u32),
}

impl fmt::Display for GssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoContext => write!(f, "no context for handle"),
            Self::WrongState => write!(f, "context in wrong state"),
            Self::MicMismatch => write!(f, "MIC verification failed"),
            Self::SealFailure(msg) => write!(f, "seal/unseal failed: {}", msg),
            Self::Mechanism(msg) => write!(f, "mechanism error: {}", msg),
            Self::SequenceOutOfRange(seq) => write!(f, "sequence {} out of range", seq),
        }
    }
}

impl std::error::Error for GssError {}

impl From<GssError> for RpcError {
    fn from(e: GssError) -> Self {
        let stat = match e {
            GssError::NoContext => AuthStat::GssCredProblem,
            _ => AuthStat::GssContextProblem,
        };
        log::debug!("GSS failure mapped to {:?}: {}", stat, e);
        RpcError::Auth(stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gss_errors_map_to_auth_error() {
        let err: RpcError = GssError::NoContext.into();
        assert!(matches!(err, RpcError::Auth(AuthStat::GssCredProblem)));

        let err: RpcError = GssError::MicMismatch.into();
        assert!(matches!(err, RpcError::Auth(AuthStat::GssContextProblem)));
    }
}
