// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RPC credentials and verifiers.
//!
//! RFC 1831 models authentication as an open-ended set of "flavors"; this
//! engine supports the closed set it actually speaks -- AUTH_NONE,
//! AUTH_SYS, RPCSEC_GSS, and the AUTH_TLS probe -- as a tagged union, so
//! encode/decode is a match over the tag and exhaustiveness is checked by
//! the compiler.

use super::constants::{
    AUTH_NONE, AUTH_SYS, AUTH_SYS_MAX_GIDS, AUTH_TLS, GSS_PROC_CONTINUE_INIT, GSS_PROC_DATA,
    GSS_PROC_DESTROY, GSS_PROC_INIT, GSS_SVC_INTEGRITY, GSS_SVC_NONE, GSS_SVC_PRIVACY,
    RPCSEC_GSS,
};
use super::message::AuthStat;
use crate::error::{RpcError, RpcResult};
use crate::xdr::XdrBuffer;

/// Verifier accompanying a credential or a reply: flavor plus opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verifier {
    pub flavor: u32,
    pub body: Vec<u8>,
}

impl Verifier {
    /// The empty AUTH_NONE verifier.
    pub fn none() -> Self {
        Self {
            flavor: AUTH_NONE,
            body: Vec::new(),
        }
    }

    pub fn new(flavor: u32, body: Vec<u8>) -> Self {
        Self { flavor, body }
    }

    pub fn encode(&self, buf: &mut XdrBuffer) {
        buf.encode_uint(self.flavor);
        buf.encode_dynamic_opaque(&self.body);
    }

    pub fn decode(buf: &mut XdrBuffer) -> RpcResult<Self> {
        let flavor = buf.decode_uint()?;
        let body = buf.decode_dynamic_opaque()?;
        Ok(Self { flavor, body })
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::none()
    }
}

/// RPCSEC_GSS control/data procedure carried in the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GssProcedure {
    Data,
    Init,
    ContinueInit,
    Destroy,
}

impl GssProcedure {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Data => GSS_PROC_DATA,
            Self::Init => GSS_PROC_INIT,
            Self::ContinueInit => GSS_PROC_CONTINUE_INIT,
            Self::Destroy => GSS_PROC_DESTROY,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            GSS_PROC_DATA => Some(Self::Data),
            GSS_PROC_INIT => Some(Self::Init),
            GSS_PROC_CONTINUE_INIT => Some(Self::ContinueInit),
            GSS_PROC_DESTROY => Some(Self::Destroy),
            _ => None,
        }
    }
}

/// Negotiated RPCSEC_GSS protection level for data exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GssService {
    /// Authentication only; arguments travel in the clear.
    None,
    /// Arguments paired with a sequence number and a detached MIC.
    Integrity,
    /// The whole (sequence, arguments) pair is sealed.
    Privacy,
}

impl GssService {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::None => GSS_SVC_NONE,
            Self::Integrity => GSS_SVC_INTEGRITY,
            Self::Privacy => GSS_SVC_PRIVACY,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            GSS_SVC_NONE => Some(Self::None),
            GSS_SVC_INTEGRITY => Some(Self::Integrity),
            GSS_SVC_PRIVACY => Some(Self::Privacy),
            _ => None,
        }
    }
}

/// Call credential: one variant per supported authentication flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// AUTH_NONE: empty body.
    None,

    /// AUTH_SYS: caller identity as seen by the client host.
    Unix {
        stamp: u32,
        machine: String,
        uid: u32,
        gid: u32,
        gids: Vec<u32>,
    },

    /// RPCSEC_GSS control/data credential (RFC 2203 Sec.5.3.1).
    Gss {
        version: u32,
        procedure: GssProcedure,
        sequence: u32,
        service: GssService,
        handle: Vec<u8>,
    },

    /// AUTH_TLS: zero-length probe requesting a TLS upgrade.
    TlsStart,
}

impl Credential {
    pub fn flavor(&self) -> u32 {
        match self {
            Self::None => AUTH_NONE,
            Self::Unix { .. } => AUTH_SYS,
            Self::Gss { .. } => RPCSEC_GSS,
            Self::TlsStart => AUTH_TLS,
        }
    }

    /// Encode as `flavor | opaque body` with the body built per variant.
    pub fn encode(&self, buf: &mut XdrBuffer) -> RpcResult<()> {
        buf.encode_uint(self.flavor());
        let mut body = XdrBuffer::new();
        body.begin_encoding()?;
        match self {
            Self::None | Self::TlsStart => {}
            Self::Unix {
                stamp,
                machine,
                uid,
                gid,
                gids,
            } => {
                body.encode_uint(*stamp);
                body.encode_string(machine);
                body.encode_uint(*uid);
                body.encode_uint(*gid);
                body.encode_uint_vector(gids);
            }
            Self::Gss {
                version,
                procedure,
                sequence,
                service,
                handle,
            } => {
                body.encode_uint(*version);
                body.encode_uint(procedure.as_u32());
                body.encode_uint(*sequence);
                body.encode_uint(service.as_u32());
                body.encode_dynamic_opaque(handle);
            }
        }
        body.end_encoding();
        buf.encode_dynamic_opaque(body.as_written());
        Ok(())
    }

    /// Decode `flavor | opaque body`; an unknown flavor or an over-long
    /// body is a bad credential, not a codec error.
    pub fn decode(buf: &mut XdrBuffer) -> RpcResult<Self> {
        let flavor = buf.decode_uint()?;
        let raw = buf.decode_dynamic_opaque()?;
        let mut body = XdrBuffer::from_bytes(raw);
        match flavor {
            AUTH_NONE => Ok(Self::None),
            AUTH_TLS => {
                if body.remaining() != 0 {
                    return Err(RpcError::Auth(AuthStat::BadCred));
                }
                Ok(Self::TlsStart)
            }
            AUTH_SYS => {
                let stamp = body.decode_uint()?;
                let machine = body.decode_string()?;
                let uid = body.decode_uint()?;
                let gid = body.decode_uint()?;
                let gids = body.decode_uint_vector()?;
                if gids.len() > AUTH_SYS_MAX_GIDS {
                    return Err(RpcError::Auth(AuthStat::BadCred));
                }
                Ok(Self::Unix {
                    stamp,
                    machine,
                    uid,
                    gid,
                    gids,
                })
            }
            RPCSEC_GSS => {
                let version = body.decode_uint()?;
                let procedure = GssProcedure::from_u32(body.decode_uint()?)
                    .ok_or(RpcError::Auth(AuthStat::BadCred))?;
                let sequence = body.decode_uint()?;
                let service = GssService::from_u32(body.decode_uint()?)
                    .ok_or(RpcError::Auth(AuthStat::BadCred))?;
                let handle = body.decode_dynamic_opaque()?;
                Ok(Self::Gss {
                    version,
                    procedure,
                    sequence,
                    service,
                    handle,
                })
            }
            _ => Err(RpcError::Auth(AuthStat::BadCred)),
        }
    }
}
