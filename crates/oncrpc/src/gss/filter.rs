// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The RPCSEC_GSS filter and its client-side counterpart.
//!
//! Server side, per credential procedure:
//! - **Init/Continue**: token exchange against a `Created` session; on
//!   establishment the server picks the sequence window and proves it
//!   with a MIC in the reply verifier.
//! - **Data**: verify the call verifier (a MIC over the header through
//!   the credential), unwrap the arguments per the negotiated service
//!   level, and hand the call on with a reply transform installed.
//! - **Destroy**: verify, dispose the context, drop the session.
//!
//! Wrapped bodies pair the credential's sequence number with the
//! payload: Integrity sends `opaque(seq|payload) | opaque(MIC)`, Privacy
//! seals the whole pair.

use super::context::{GssMechanism, GssSession, GssSessionTable, SessionState};
use super::GssError;
use crate::client::RpcClient;
use crate::error::{RpcError, RpcResult};
use crate::protocol::constants::{
    GSS_COMPLETE, GSS_CONTINUE_NEEDED, GSS_MAX_SEQ, RPCSEC_GSS, RPCSEC_GSS_VERSION,
};
use crate::protocol::message::{
    AcceptedStat, AuthStat, CallHeader, DecodedCall, ReplyBody, ReplyHeader,
};
use crate::protocol::{Credential, GssProcedure, GssService, Verifier};
use crate::server::dispatch::{FilterOutcome, ReplyTransform, SecurityFilter};
use crate::transport::Transport;
use crate::xdr::{XdrBuffer, XdrDecode, XdrEncode};
use parking_lot::Mutex;
use ring::rand::{SecureRandom, SystemRandom};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Server-side RPCSEC_GSS filter.
pub struct GssFilter {
    mechanism: Arc<dyn GssMechanism>,
    sessions: GssSessionTable,
}

impl GssFilter {
    pub fn new(mechanism: Arc<dyn GssMechanism>) -> Arc<Self> {
        Arc::new(Self {
            mechanism,
            sessions: GssSessionTable::new(),
        })
    }

    pub fn sessions(&self) -> &GssSessionTable {
        &self.sessions
    }

    fn negotiate(
        &self,
        transport: &Arc<dyn Transport>,
        reply_to: SocketAddr,
        decoded: &DecodedCall,
        mut buf: XdrBuffer,
        handle: &[u8],
        procedure: GssProcedure,
    ) -> RpcResult<FilterOutcome> {
        let token = buf.decode_dynamic_opaque()?;

        let (handle, session) = match procedure {
            GssProcedure::Init => {
                let context = self.mechanism.new_context();
                let handle = self.sessions.create(context);
                let session = self
                    .sessions
                    .get_in_state(&handle, SessionState::Created)
                    .map_err(RpcError::from)?;
                (handle, session)
            }
            _ => {
                let session = self
                    .sessions
                    .get_in_state(handle, SessionState::Created)
                    .map_err(RpcError::from)?;
                (handle.to_vec(), session)
            }
        };

        let (response, established, seq_window) = {
            let mut session = session.lock();
            let response = session
                .context
                .accept_token(&token)
                .map_err(RpcError::from)?;
            let established = session.context.is_established();
            if established {
                session.state = SessionState::Established;
                session.seq_window = choose_seq_window();
            }
            (response, established, session.seq_window)
        };

        // Reply body: handle, major status, minor status, window, token.
        let verifier = if established {
            let mic = session
                .lock()
                .context
                .mic(&seq_window.to_be_bytes())
                .map_err(RpcError::from)?;
            Verifier::new(RPCSEC_GSS, mic)
        } else {
            Verifier::none()
        };

        let mut out = XdrBuffer::new();
        out.begin_encoding()?;
        ReplyHeader::accepted(decoded.header.xid, verifier, AcceptedStat::Success)
            .encode(&mut out);
        out.encode_dynamic_opaque(&handle);
        out.encode_uint(if established { GSS_COMPLETE } else { GSS_CONTINUE_NEEDED });
        out.encode_uint(0);
        out.encode_uint(seq_window);
        out.encode_dynamic_opaque(&response);
        out.end_encoding();

        log::debug!(
            "GSS negotiation xid {:#x}: {}",
            decoded.header.xid,
            if established { "complete" } else { "continue needed" }
        );
        transport.send(out, reply_to, None);
        Ok(FilterOutcome::Consumed)
    }

    fn verify_call_mic(
        &self,
        session: &Arc<Mutex<GssSession>>,
        decoded: &DecodedCall,
        buf: &XdrBuffer,
    ) -> RpcResult<()> {
        if decoded.header.verifier.flavor != RPCSEC_GSS {
            return Err(RpcError::Auth(AuthStat::BadVerf));
        }
        let covered = &buf.as_written()[..decoded.credential_end];
        session
            .lock()
            .context
            .verify_mic(covered, &decoded.header.verifier.body)
            .map_err(RpcError::from)
    }

    fn unwrap_args(
        &self,
        session: &Arc<Mutex<GssSession>>,
        service: GssService,
        sequence: u32,
        mut buf: XdrBuffer,
    ) -> RpcResult<XdrBuffer> {
        match service {
            GssService::None => Ok(buf),
            GssService::Integrity => {
                let databody = buf.decode_dynamic_opaque()?;
                let mic = buf.decode_dynamic_opaque()?;
                session
                    .lock()
                    .context
                    .verify_mic(&databody, &mic)
                    .map_err(RpcError::from)?;
                split_sequenced_body(databody, sequence)
            }
            GssService::Privacy => {
                let sealed = buf.decode_dynamic_opaque()?;
                let plain = session
                    .lock()
                    .context
                    .unwrap(&sealed)
                    .map_err(RpcError::from)?;
                split_sequenced_body(plain, sequence)
            }
        }
    }
}

/// Decode `(sequence, payload)` and check the sequence echoes the
/// credential's.
fn split_sequenced_body(body: Vec<u8>, expected_seq: u32) -> RpcResult<XdrBuffer> {
    let mut inner = XdrBuffer::from_bytes(body);
    let seq = inner.decode_uint()?;
    if seq != expected_seq {
        return Err(GssError::SequenceOutOfRange(seq).into());
    }
    Ok(XdrBuffer::from_bytes(inner.decode_remaining()))
}

fn choose_seq_window() -> u32 {
    let mut bytes = [0u8; 4];
    if SystemRandom::new().fill(&mut bytes).is_ok() {
        u32::from_be_bytes(bytes) % GSS_MAX_SEQ
    } else {
        128
    }
}

impl SecurityFilter for GssFilter {
    fn intercept(
        &self,
        transport: &Arc<dyn Transport>,
        reply_to: SocketAddr,
        decoded: &DecodedCall,
        buf: XdrBuffer,
    ) -> RpcResult<FilterOutcome> {
        let Credential::Gss {
            version,
            procedure,
            sequence,
            service,
            handle,
        } = decoded.header.credential.clone()
        else {
            return Err(RpcError::Auth(AuthStat::BadCred));
        };
        if version != RPCSEC_GSS_VERSION {
            return Err(RpcError::Auth(AuthStat::BadCred));
        }

        match procedure {
            GssProcedure::Init | GssProcedure::ContinueInit => {
                self.negotiate(transport, reply_to, decoded, buf, &handle, procedure)
            }
            GssProcedure::Data => {
                if sequence > GSS_MAX_SEQ {
                    return Err(GssError::SequenceOutOfRange(sequence).into());
                }
                let session = self
                    .sessions
                    .get_in_state(&handle, SessionState::Established)
                    .map_err(RpcError::from)?;
                self.verify_call_mic(&session, decoded, &buf)?;
                let args = self.unwrap_args(&session, service, sequence, buf)?;
                Ok(FilterOutcome::Proceed {
                    args,
                    reply_transform: Some(Arc::new(GssReplyTransform {
                        session,
                        sequence,
                        service,
                    })),
                })
            }
            GssProcedure::Destroy => {
                let session = self
                    .sessions
                    .get_in_state(&handle, SessionState::Established)
                    .map_err(RpcError::from)?;
                self.verify_call_mic(&session, decoded, &buf)?;

                let verifier = {
                    let mut session = session.lock();
                    let mic = session
                        .context
                        .mic(&sequence.to_be_bytes())
                        .map_err(RpcError::from)?;
                    session.context.dispose();
                    Verifier::new(RPCSEC_GSS, mic)
                };
                self.sessions.remove(&handle).map_err(RpcError::from)?;

                let mut out = XdrBuffer::new();
                out.begin_encoding()?;
                ReplyHeader::accepted(decoded.header.xid, verifier, AcceptedStat::Success)
                    .encode(&mut out);
                out.end_encoding();
                transport.send(out, reply_to, None);
                Ok(FilterOutcome::Consumed)
            }
        }
    }
}

/// Reply-side transform installed for one Data call.
struct GssReplyTransform {
    session: Arc<Mutex<GssSession>>,
    sequence: u32,
    service: GssService,
}

impl ReplyTransform for GssReplyTransform {
    fn reply_verifier(&self) -> RpcResult<Verifier> {
        let mic = self
            .session
            .lock()
            .context
            .mic(&self.sequence.to_be_bytes())
            .map_err(RpcError::from)?;
        Ok(Verifier::new(RPCSEC_GSS, mic))
    }

    fn wrap_reply_body(&self, plain: &[u8]) -> RpcResult<Vec<u8>> {
        match self.service {
            GssService::None => Ok(plain.to_vec()),
            GssService::Integrity => {
                let databody = sequenced_body(self.sequence, plain)?;
                let mic = self
                    .session
                    .lock()
                    .context
                    .mic(&databody)
                    .map_err(RpcError::from)?;
                let mut out = XdrBuffer::new();
                out.begin_encoding()?;
                out.encode_dynamic_opaque(&databody);
                out.encode_dynamic_opaque(&mic);
                out.end_encoding();
                Ok(out.as_written().to_vec())
            }
            GssService::Privacy => {
                let databody = sequenced_body(self.sequence, plain)?;
                let sealed = self
                    .session
                    .lock()
                    .context
                    .wrap(&databody)
                    .map_err(RpcError::from)?;
                let mut out = XdrBuffer::new();
                out.begin_encoding()?;
                out.encode_dynamic_opaque(&sealed);
                out.end_encoding();
                Ok(out.as_written().to_vec())
            }
        }
    }
}

/// `seq | payload` as one byte block.
fn sequenced_body(sequence: u32, payload: &[u8]) -> RpcResult<Vec<u8>> {
    let mut body = XdrBuffer::new();
    body.begin_encoding()?;
    body.encode_uint(sequence);
    body.append_encoded(payload);
    body.end_encoding();
    Ok(body.as_written().to_vec())
}

/// Client side of the sub-protocol: negotiates a context and wraps
/// outgoing calls the way the server's filter expects.
pub struct GssClientSession {
    context: Mutex<Box<dyn super::GssContext>>,
    handle: Vec<u8>,
    service: GssService,
    sequence: AtomicU32,
    seq_window: u32,
}

impl std::fmt::Debug for GssClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GssClientSession")
            .field("handle", &self.handle)
            .field("service", &self.service)
            .field("sequence", &self.sequence)
            .field("seq_window", &self.seq_window)
            .finish_non_exhaustive()
    }
}

impl GssClientSession {
    /// Run Init/Continue against the server until the context reports
    /// established.
    pub fn establish(
        client: &RpcClient,
        mechanism: &dyn GssMechanism,
        service: GssService,
        timeout: Option<Duration>,
    ) -> RpcResult<Arc<Self>> {
        let mut context = mechanism.new_context();
        let mut handle: Vec<u8> = Vec::new();
        let mut procedure = GssProcedure::Init;

        loop {
            let mut token = vec![0u8; 16];
            if SystemRandom::new().fill(&mut token).is_err() {
                token = b"gss-client-token".to_vec();
            }

            let xid = client.next_xid();
            let header = CallHeader::new(
                xid,
                client.program(),
                client.version(),
                0,
                Credential::Gss {
                    version: RPCSEC_GSS_VERSION,
                    procedure,
                    sequence: 0,
                    service,
                    handle: handle.clone(),
                },
                Verifier::none(),
            );
            let mut msg = XdrBuffer::new();
            msg.begin_encoding()?;
            header.encode(&mut msg)?;
            msg.encode_dynamic_opaque(&token);
            msg.end_encoding();

            let (reply, mut buf) = client.call_raw(xid, msg, timeout)?.wait()?;

            handle = buf.decode_dynamic_opaque()?;
            let major = buf.decode_uint()?;
            let _minor = buf.decode_uint()?;
            let seq_window = buf.decode_uint()?;
            let response = buf.decode_dynamic_opaque()?;

            // The server's token is its proof of the shared context;
            // checking it also advances our side of the negotiation.
            context
                .verify_mic(&token, &response)
                .map_err(RpcError::from)?;
            context.accept_token(&response).map_err(RpcError::from)?;

            match major {
                GSS_COMPLETE => {
                    verify_reply_window(&reply.body, &*context, seq_window)?;
                    log::debug!("GSS context established, window {}", seq_window);
                    return Ok(Arc::new(Self {
                        context: Mutex::new(context),
                        handle,
                        service,
                        sequence: AtomicU32::new(1),
                        seq_window,
                    }));
                }
                GSS_CONTINUE_NEEDED => {
                    procedure = GssProcedure::ContinueInit;
                }
                other => {
                    return Err(RpcError::Envelope(format!("gss_major {}", other)));
                }
            }
        }
    }

    pub fn service(&self) -> GssService {
        self.service
    }

    pub fn seq_window(&self) -> u32 {
        self.seq_window
    }

    /// Issue one wrapped Data call and unwrap its result.
    pub fn call<A, R>(
        &self,
        client: &RpcClient,
        procedure: u32,
        args: &A,
        timeout: Option<Duration>,
    ) -> RpcResult<R>
    where
        A: XdrEncode,
        R: XdrDecode + Send + 'static,
    {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let xid = client.next_xid();
        let header = CallHeader::new(
            xid,
            client.program(),
            client.version(),
            procedure,
            Credential::Gss {
                version: RPCSEC_GSS_VERSION,
                procedure: GssProcedure::Data,
                sequence,
                service: self.service,
                handle: self.handle.clone(),
            },
            Verifier::none(),
        );

        let mut msg = XdrBuffer::new();
        msg.begin_encoding()?;
        header.encode_through_credential(&mut msg)?;
        let verifier = {
            let context = self.context.lock();
            let mic = context.mic(msg.encoded_so_far()).map_err(RpcError::from)?;
            Verifier::new(RPCSEC_GSS, mic)
        };
        verifier.encode(&mut msg);

        // Wrap the arguments per the negotiated service level.
        let mut plain = XdrBuffer::new();
        plain.begin_encoding()?;
        args.encode_xdr(&mut plain)?;
        plain.end_encoding();
        match self.service {
            GssService::None => msg.append_encoded(plain.as_written()),
            GssService::Integrity => {
                let databody = sequenced_body(sequence, plain.as_written())?;
                let mic = self
                    .context
                    .lock()
                    .mic(&databody)
                    .map_err(RpcError::from)?;
                msg.encode_dynamic_opaque(&databody);
                msg.encode_dynamic_opaque(&mic);
            }
            GssService::Privacy => {
                let databody = sequenced_body(sequence, plain.as_written())?;
                let sealed = self
                    .context
                    .lock()
                    .wrap(&databody)
                    .map_err(RpcError::from)?;
                msg.encode_dynamic_opaque(&sealed);
            }
        }
        msg.end_encoding();

        let (reply, buf) = client.call_raw(xid, msg, timeout)?.wait()?;

        // The reply verifier must be the MIC of our sequence number.
        let ReplyBody::Accepted { verifier, .. } = &reply.body else {
            return Err(RpcError::Envelope("denied reply on success path".to_string()));
        };
        self.context
            .lock()
            .verify_mic(&sequence.to_be_bytes(), &verifier.body)
            .map_err(RpcError::from)?;

        let mut result_buf = self.unwrap_reply(sequence, buf)?;
        let result = R::decode_xdr(&mut result_buf)?;
        Ok(result)
    }

    /// Destroy the server-side context.
    pub fn destroy(&self, client: &RpcClient, timeout: Option<Duration>) -> RpcResult<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let xid = client.next_xid();
        let header = CallHeader::new(
            xid,
            client.program(),
            client.version(),
            0,
            Credential::Gss {
                version: RPCSEC_GSS_VERSION,
                procedure: GssProcedure::Destroy,
                sequence,
                service: self.service,
                handle: self.handle.clone(),
            },
            Verifier::none(),
        );
        let mut msg = XdrBuffer::new();
        msg.begin_encoding()?;
        header.encode_through_credential(&mut msg)?;
        let verifier = {
            let context = self.context.lock();
            let mic = context.mic(msg.encoded_so_far()).map_err(RpcError::from)?;
            Verifier::new(RPCSEC_GSS, mic)
        };
        verifier.encode(&mut msg);
        msg.end_encoding();

        client.call_raw(xid, msg, timeout)?.wait()?;
        self.context.lock().dispose();
        Ok(())
    }

    fn unwrap_reply(&self, sequence: u32, mut buf: XdrBuffer) -> RpcResult<XdrBuffer> {
        match self.service {
            GssService::None => Ok(buf),
            GssService::Integrity => {
                let databody = buf.decode_dynamic_opaque()?;
                let mic = buf.decode_dynamic_opaque()?;
                self.context
                    .lock()
                    .verify_mic(&databody, &mic)
                    .map_err(RpcError::from)?;
                split_sequenced_body(databody, sequence)
            }
            GssService::Privacy => {
                let sealed = buf.decode_dynamic_opaque()?;
                let plain = self
                    .context
                    .lock()
                    .unwrap(&sealed)
                    .map_err(RpcError::from)?;
                split_sequenced_body(plain, sequence)
            }
        }
    }
}

fn verify_reply_window(
    body: &ReplyBody,
    context: &dyn super::GssContext,
    seq_window: u32,
) -> RpcResult<()> {
    let ReplyBody::Accepted { verifier, .. } = body else {
        return Err(RpcError::Envelope("denied reply on success path".to_string()));
    };
    context
        .verify_mic(&seq_window.to_be_bytes(), &verifier.body)
        .map_err(RpcError::from)
}
