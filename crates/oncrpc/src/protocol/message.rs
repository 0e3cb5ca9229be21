// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RPC message headers (RFC 1831 Sec.8).
//!
//! Wire layout, big-endian throughout:
//!
//! ```text
//! Call:  xid(4) | CALL(4) | rpcvers=2(4) | prog(4) | vers(4) | proc(4)
//!        | credential | verifier | arguments...
//! Reply: xid(4) | REPLY(4) | reply_stat(4)
//!        accepted: verifier | accept_stat(4) [| mismatch lo,hi] | results...
//!        denied:   reject_stat(4) | lo,hi or auth_stat
//! ```

use super::auth::{Credential, Verifier};
use super::constants::RPC_VERSION;
use crate::error::{RpcError, RpcResult};
use crate::xdr::XdrBuffer;

/// Message discriminant: call or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Call,
    Reply,
}

impl MsgType {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Call => 0,
            Self::Reply => 1,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Call),
            1 => Some(Self::Reply),
            _ => None,
        }
    }
}

/// Authentication failure reasons (RFC 1831 Sec.9 + RFC 2203 Sec.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStat {
    Ok,
    BadCred,
    RejectedCred,
    BadVerf,
    RejectedVerf,
    TooWeak,
    InvalidResp,
    Failed,
    /// RPCSEC_GSS: no such context / credential problem.
    GssCredProblem,
    /// RPCSEC_GSS: context expired, wrong state, or MIC failure.
    GssContextProblem,
}

impl AuthStat {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::BadCred => 1,
            Self::RejectedCred => 2,
            Self::BadVerf => 3,
            Self::RejectedVerf => 4,
            Self::TooWeak => 5,
            Self::InvalidResp => 6,
            Self::Failed => 7,
            Self::GssCredProblem => 13,
            Self::GssContextProblem => 14,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::BadCred),
            2 => Some(Self::RejectedCred),
            3 => Some(Self::BadVerf),
            4 => Some(Self::RejectedVerf),
            5 => Some(Self::TooWeak),
            6 => Some(Self::InvalidResp),
            7 => Some(Self::Failed),
            13 => Some(Self::GssCredProblem),
            14 => Some(Self::GssContextProblem),
            _ => None,
        }
    }
}

/// Key into the server's handler registry; equality and hashing are
/// structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId {
    pub program: u32,
    pub version: u32,
}

impl ProgramId {
    pub fn new(program: u32, version: u32) -> Self {
        Self { program, version }
    }
}

/// Decoded call header, credential and verifier included.
#[derive(Debug, Clone)]
pub struct CallHeader {
    pub xid: u32,
    pub rpc_version: u32,
    pub program: u32,
    pub version: u32,
    pub procedure: u32,
    pub credential: Credential,
    pub verifier: Verifier,
}

impl CallHeader {
    pub fn new(
        xid: u32,
        program: u32,
        version: u32,
        procedure: u32,
        credential: Credential,
        verifier: Verifier,
    ) -> Self {
        Self {
            xid,
            rpc_version: RPC_VERSION,
            program,
            version,
            procedure,
            credential,
            verifier,
        }
    }

    pub fn program_id(&self) -> ProgramId {
        ProgramId::new(self.program, self.version)
    }

    /// Encode `xid` through the credential, stopping before the verifier.
    ///
    /// RPCSEC_GSS computes its verifier as a MIC over exactly these bytes,
    /// so the split point is part of the contract.
    pub fn encode_through_credential(&self, buf: &mut XdrBuffer) -> RpcResult<()> {
        buf.encode_uint(self.xid);
        buf.encode_uint(MsgType::Call.as_u32());
        buf.encode_uint(self.rpc_version);
        buf.encode_uint(self.program);
        buf.encode_uint(self.version);
        buf.encode_uint(self.procedure);
        self.credential.encode(buf)
    }

    pub fn encode(&self, buf: &mut XdrBuffer) -> RpcResult<()> {
        self.encode_through_credential(buf)?;
        self.verifier.encode(buf);
        Ok(())
    }

    /// Decode the remainder of a call header once the preamble (xid and
    /// message type) has been consumed.
    pub fn decode_after_preamble(xid: u32, buf: &mut XdrBuffer) -> RpcResult<DecodedCall> {
        let rpc_version = buf.decode_uint()?;
        Self::decode_after_version(xid, rpc_version, buf)
    }

    /// Decode the remainder once the rpc_version word has also been
    /// consumed -- the dispatcher checks the version before decoding any
    /// further.
    pub fn decode_after_version(
        xid: u32,
        rpc_version: u32,
        buf: &mut XdrBuffer,
    ) -> RpcResult<DecodedCall> {
        let program = buf.decode_uint()?;
        let version = buf.decode_uint()?;
        let procedure = buf.decode_uint()?;
        let credential = Credential::decode(buf)?;
        let credential_end = buf.read_pos();
        let verifier = Verifier::decode(buf)?;
        Ok(DecodedCall {
            header: CallHeader {
                xid,
                rpc_version,
                program,
                version,
                procedure,
                credential,
                verifier,
            },
            credential_end,
        })
    }
}

/// A decoded call plus the byte offset one past its credential -- the
/// boundary of RPCSEC_GSS MIC coverage.
#[derive(Debug, Clone)]
pub struct DecodedCall {
    pub header: CallHeader,
    pub credential_end: usize,
}

/// How an accepted call was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptedStat {
    /// Results follow in the stream.
    Success,
    ProgUnavail,
    ProgMismatch { low: u32, high: u32 },
    ProcUnavail,
    GarbageArgs,
    SystemErr,
}

impl AcceptedStat {
    fn discriminant(&self) -> u32 {
        match self {
            Self::Success => 0,
            Self::ProgUnavail => 1,
            Self::ProgMismatch { .. } => 2,
            Self::ProcUnavail => 3,
            Self::GarbageArgs => 4,
            Self::SystemErr => 5,
        }
    }
}

/// Why a call was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeniedStat {
    RpcMismatch { low: u32, high: u32 },
    AuthError(AuthStat),
}

/// Reply body: accepted (with verifier and accept status) or denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Accepted {
        verifier: Verifier,
        stat: AcceptedStat,
    },
    Denied(DeniedStat),
}

impl ReplyBody {
    /// Map a non-success body to the error a caller should see.
    pub fn to_error(&self) -> Option<RpcError> {
        match self {
            Self::Accepted { stat, .. } => match stat {
                AcceptedStat::Success => None,
                AcceptedStat::ProgUnavail => Some(RpcError::ProgUnavailable),
                AcceptedStat::ProgMismatch { low, high } => Some(RpcError::ProgMismatch {
                    low: *low,
                    high: *high,
                }),
                AcceptedStat::ProcUnavail => Some(RpcError::ProcUnavailable),
                AcceptedStat::GarbageArgs => Some(RpcError::GarbageArgs),
                AcceptedStat::SystemErr => Some(RpcError::SystemError),
            },
            Self::Denied(denied) => match denied {
                DeniedStat::RpcMismatch { low, high } => Some(RpcError::RpcMismatch {
                    low: *low,
                    high: *high,
                }),
                DeniedStat::AuthError(stat) => Some(RpcError::Auth(*stat)),
            },
        }
    }
}

/// Decoded reply header. For `Success`, results follow at the buffer's
/// read cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyHeader {
    pub xid: u32,
    pub body: ReplyBody,
}

impl ReplyHeader {
    pub fn accepted(xid: u32, verifier: Verifier, stat: AcceptedStat) -> Self {
        Self {
            xid,
            body: ReplyBody::Accepted { verifier, stat },
        }
    }

    pub fn success(xid: u32) -> Self {
        Self::accepted(xid, Verifier::none(), AcceptedStat::Success)
    }

    pub fn denied(xid: u32, stat: DeniedStat) -> Self {
        Self {
            xid,
            body: ReplyBody::Denied(stat),
        }
    }

    pub fn encode(&self, buf: &mut XdrBuffer) {
        buf.encode_uint(self.xid);
        buf.encode_uint(MsgType::Reply.as_u32());
        match &self.body {
            ReplyBody::Accepted { verifier, stat } => {
                buf.encode_uint(0); // MSG_ACCEPTED
                verifier.encode(buf);
                buf.encode_uint(stat.discriminant());
                if let AcceptedStat::ProgMismatch { low, high } = stat {
                    buf.encode_uint(*low);
                    buf.encode_uint(*high);
                }
            }
            ReplyBody::Denied(denied) => {
                buf.encode_uint(1); // MSG_DENIED
                match denied {
                    DeniedStat::RpcMismatch { low, high } => {
                        buf.encode_uint(0);
                        buf.encode_uint(*low);
                        buf.encode_uint(*high);
                    }
                    DeniedStat::AuthError(stat) => {
                        buf.encode_uint(1);
                        buf.encode_uint(stat.as_u32());
                    }
                }
            }
        }
    }

    /// Decode the remainder of a reply once the preamble is consumed.
    pub fn decode_after_preamble(xid: u32, buf: &mut XdrBuffer) -> RpcResult<Self> {
        let reply_stat = buf.decode_uint()?;
        let body = match reply_stat {
            0 => {
                let verifier = Verifier::decode(buf)?;
                let stat = match buf.decode_uint()? {
                    0 => AcceptedStat::Success,
                    1 => AcceptedStat::ProgUnavail,
                    2 => AcceptedStat::ProgMismatch {
                        low: buf.decode_uint()?,
                        high: buf.decode_uint()?,
                    },
                    3 => AcceptedStat::ProcUnavail,
                    4 => AcceptedStat::GarbageArgs,
                    5 => AcceptedStat::SystemErr,
                    other => {
                        return Err(RpcError::Envelope(format!("accept_stat {}", other)));
                    }
                };
                ReplyBody::Accepted { verifier, stat }
            }
            1 => match buf.decode_uint()? {
                0 => ReplyBody::Denied(DeniedStat::RpcMismatch {
                    low: buf.decode_uint()?,
                    high: buf.decode_uint()?,
                }),
                1 => {
                    let raw = buf.decode_uint()?;
                    let stat = AuthStat::from_u32(raw)
                        .ok_or_else(|| RpcError::Envelope(format!("auth_stat {}", raw)))?;
                    ReplyBody::Denied(DeniedStat::AuthError(stat))
                }
                other => {
                    return Err(RpcError::Envelope(format!("reject_stat {}", other)));
                }
            },
            other => {
                return Err(RpcError::Envelope(format!("reply_stat {}", other)));
            }
        };
        Ok(Self { xid, body })
    }
}

/// Decode the two fields every RPC message starts with.
pub fn decode_preamble(buf: &mut XdrBuffer) -> RpcResult<(u32, MsgType)> {
    let xid = buf.decode_uint()?;
    let raw = buf.decode_uint()?;
    let kind =
        MsgType::from_u32(raw).ok_or_else(|| RpcError::Envelope(format!("msg_type {}", raw)))?;
    Ok((xid, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::auth::GssService;

    #[test]
    fn test_call_header_roundtrip() {
        let header = CallHeader::new(
            0xCAFE_BABE,
            100003,
            3,
            7,
            Credential::Unix {
                stamp: 1,
                machine: "host".to_string(),
                uid: 500,
                gid: 500,
                gids: vec![],
            },
            Verifier::none(),
        );
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        header.encode(&mut buf).expect("encode header");
        buf.encode_uint(0x1111_2222); // first argument word
        buf.end_encoding();

        buf.begin_decoding().expect("begin decode");
        let (xid, kind) = decode_preamble(&mut buf).expect("preamble");
        assert_eq!(xid, 0xCAFE_BABE);
        assert_eq!(kind, MsgType::Call);
        let decoded = CallHeader::decode_after_preamble(xid, &mut buf).expect("call header");
        assert_eq!(decoded.header.program, 100003);
        assert_eq!(decoded.header.version, 3);
        assert_eq!(decoded.header.procedure, 7);
        assert_eq!(decoded.header.rpc_version, RPC_VERSION);
        assert_eq!(decoded.header.credential, header.credential);
        // Arguments continue right after the verifier.
        assert_eq!(buf.decode_uint().expect("first arg"), 0x1111_2222);
    }

    #[test]
    fn test_credential_end_marks_mic_boundary() {
        let header = CallHeader::new(7, 1, 2, 3, Credential::None, Verifier::none());
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        header.encode_through_credential(&mut buf).expect("encode");
        let boundary = buf.write_pos();
        header.verifier.encode(&mut buf);
        buf.end_encoding();

        buf.begin_decoding().expect("begin decode");
        let (xid, _) = decode_preamble(&mut buf).expect("preamble");
        let decoded = CallHeader::decode_after_preamble(xid, &mut buf).expect("header");
        assert_eq!(decoded.credential_end, boundary);
    }

    #[test]
    fn test_reply_roundtrip_success() {
        let reply = ReplyHeader::success(9);
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        reply.encode(&mut buf);
        buf.encode_int(-5); // result word
        buf.end_encoding();

        buf.begin_decoding().expect("begin decode");
        let (xid, kind) = decode_preamble(&mut buf).expect("preamble");
        assert_eq!(kind, MsgType::Reply);
        let decoded = ReplyHeader::decode_after_preamble(xid, &mut buf).expect("reply");
        assert_eq!(decoded, reply);
        assert!(decoded.body.to_error().is_none());
        assert_eq!(buf.decode_int().expect("result"), -5);
    }

    #[test]
    fn test_reply_roundtrip_prog_mismatch() {
        let reply = ReplyHeader::accepted(
            3,
            Verifier::none(),
            AcceptedStat::ProgMismatch { low: 2, high: 4 },
        );
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        reply.encode(&mut buf);
        buf.end_encoding();

        buf.begin_decoding().expect("begin decode");
        let (xid, _) = decode_preamble(&mut buf).expect("preamble");
        let decoded = ReplyHeader::decode_after_preamble(xid, &mut buf).expect("reply");
        assert_eq!(decoded, reply);
        assert!(matches!(
            decoded.body.to_error(),
            Some(RpcError::ProgMismatch { low: 2, high: 4 })
        ));
    }

    #[test]
    fn test_reply_roundtrip_denied_auth() {
        let reply = ReplyHeader::denied(11, DeniedStat::AuthError(AuthStat::GssContextProblem));
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        reply.encode(&mut buf);
        buf.end_encoding();

        buf.begin_decoding().expect("begin decode");
        let (xid, _) = decode_preamble(&mut buf).expect("preamble");
        let decoded = ReplyHeader::decode_after_preamble(xid, &mut buf).expect("reply");
        assert!(matches!(
            decoded.body.to_error(),
            Some(RpcError::Auth(AuthStat::GssContextProblem))
        ));
    }

    #[test]
    fn test_unknown_msg_type_rejected() {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        buf.encode_uint(1);
        buf.encode_uint(7); // not CALL/REPLY
        buf.end_encoding();
        buf.begin_decoding().expect("begin decode");
        assert!(matches!(
            decode_preamble(&mut buf),
            Err(RpcError::Envelope(_))
        ));
    }

    #[test]
    fn test_gss_credential_in_call_header() {
        let header = CallHeader::new(
            1,
            100024,
            1,
            0,
            Credential::Gss {
                version: 1,
                procedure: crate::protocol::auth::GssProcedure::Init,
                sequence: 0,
                service: GssService::None,
                handle: vec![],
            },
            Verifier::none(),
        );
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin encode");
        header.encode(&mut buf).expect("encode");
        buf.end_encoding();
        buf.begin_decoding().expect("begin decode");
        let (xid, _) = decode_preamble(&mut buf).expect("preamble");
        let decoded = CallHeader::decode_after_preamble(xid, &mut buf).expect("header");
        assert_eq!(decoded.header.credential, header.credential);
    }
}
