// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server dispatch engine.
//!
//! Dispatch lifecycle: `Received -> Resolved -> {Invoked -> Replied} |
//! Rejected`. The dispatcher decodes call headers, resolves the
//! `(program, version)` pair in its handler registry, and invokes the
//! handler through the injected execution strategy. The handler sends
//! exactly one reply through its [`CallContext`].

use super::executor::ExecutionStrategy;
use crate::config::EngineConfig;
use crate::error::{RpcError, RpcResult};
use crate::protocol::constants::{AUTH_NONE, AUTH_TLS_STARTTLS, RPC_VERSION};
use crate::protocol::message::{
    AcceptedStat, AuthStat, CallHeader, DeniedStat, ProgramId, ReplyHeader,
};
use crate::protocol::{Credential, Verifier};
use crate::transport::Transport;
use crate::xdr::{XdrBuffer, XdrDecode, XdrEncode};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handler contract: decode the arguments from the context and send
/// exactly one reply (result, explicit accept status, or rejection).
pub trait RpcService: Send + Sync {
    fn handle(&self, ctx: &mut CallContext) -> RpcResult<()>;
}

impl<F> RpcService for F
where
    F: Fn(&mut CallContext) -> RpcResult<()> + Send + Sync,
{
    fn handle(&self, ctx: &mut CallContext) -> RpcResult<()> {
        self(ctx)
    }
}

/// Security transform applied to outgoing replies of a wrapped call.
/// Installed by the RPCSEC_GSS filter for Data calls.
pub trait ReplyTransform: Send + Sync {
    /// Verifier for the accepted reply header.
    fn reply_verifier(&self) -> RpcResult<Verifier>;

    /// Turn the plainly encoded result bytes into their on-wire form.
    fn wrap_reply_body(&self, plain: &[u8]) -> RpcResult<Vec<u8>>;
}

/// One decoded call, handed to a handler for reply.
///
/// The context owns the message buffer (read cursor at the argument
/// bytes) and the transport handle, so the handler may run on any thread
/// and still send the reply.
pub struct CallContext {
    header: CallHeader,
    buf: XdrBuffer,
    transport: Arc<dyn Transport>,
    reply_to: SocketAddr,
    replied: bool,
    reply_transform: Option<Arc<dyn ReplyTransform>>,
}

impl CallContext {
    fn new(
        header: CallHeader,
        buf: XdrBuffer,
        transport: Arc<dyn Transport>,
        reply_to: SocketAddr,
        reply_transform: Option<Arc<dyn ReplyTransform>>,
    ) -> Self {
        Self {
            header,
            buf,
            transport,
            reply_to,
            replied: false,
            reply_transform,
        }
    }

    pub fn xid(&self) -> u32 {
        self.header.xid
    }

    pub fn program(&self) -> u32 {
        self.header.program
    }

    pub fn version(&self) -> u32 {
        self.header.version
    }

    pub fn procedure(&self) -> u32 {
        self.header.procedure
    }

    pub fn credential(&self) -> &Credential {
        &self.header.credential
    }

    /// The AUTH_SYS identity of the caller, when one was presented.
    pub fn caller_identity(&self) -> Option<(u32, u32)> {
        match &self.header.credential {
            Credential::Unix { uid, gid, .. } => Some((*uid, *gid)),
            _ => None,
        }
    }

    /// The connection the call arrived on; a handler may issue its own
    /// calls back to the peer through it.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn has_replied(&self) -> bool {
        self.replied
    }

    /// Decode the call arguments.
    pub fn decode_args<A: XdrDecode>(&mut self) -> RpcResult<A> {
        Ok(A::decode_xdr(&mut self.buf)?)
    }

    /// Reply with a successful result.
    pub fn reply<R: XdrEncode>(&mut self, result: &R) -> RpcResult<()> {
        let verifier = match &self.reply_transform {
            Some(t) => t.reply_verifier()?,
            None => Verifier::none(),
        };
        let header = ReplyHeader::accepted(self.header.xid, verifier, AcceptedStat::Success);

        let mut out = XdrBuffer::new();
        out.begin_encoding()?;
        header.encode(&mut out);
        match &self.reply_transform {
            Some(transform) => {
                let mut plain = XdrBuffer::new();
                plain.begin_encoding()?;
                result.encode_xdr(&mut plain)?;
                plain.end_encoding();
                let wrapped = transform.wrap_reply_body(plain.as_written())?;
                out.append_encoded(&wrapped);
            }
            None => result.encode_xdr(&mut out)?,
        }
        out.end_encoding();
        self.send(out)
    }

    /// Reply with an explicit non-success accept status.
    pub fn reply_accept_stat(&mut self, stat: AcceptedStat) -> RpcResult<()> {
        let header = ReplyHeader::accepted(self.header.xid, Verifier::none(), stat);
        let mut out = XdrBuffer::new();
        out.begin_encoding()?;
        header.encode(&mut out);
        out.end_encoding();
        self.send(out)
    }

    /// Reject the call.
    pub fn reject(&mut self, stat: DeniedStat) -> RpcResult<()> {
        let header = ReplyHeader::denied(self.header.xid, stat);
        let mut out = XdrBuffer::new();
        out.begin_encoding()?;
        header.encode(&mut out);
        out.end_encoding();
        self.send(out)
    }

    fn send(&mut self, message: XdrBuffer) -> RpcResult<()> {
        if self.replied {
            return Err(RpcError::Envelope("reply already sent".to_string()));
        }
        self.replied = true;
        let xid = self.header.xid;
        self.transport.send(
            message,
            self.reply_to,
            Some(Box::new(move |result| {
                if let Err(e) = result {
                    log::warn!("reply for xid {:#x} failed to send: {}", xid, e);
                }
            })),
        );
        Ok(())
    }
}

/// Outcome of the security filter for an inbound call.
pub enum FilterOutcome {
    /// The filter handled the call (control procedure) and has replied.
    Consumed,
    /// Hand the call on: argument buffer (possibly unwrapped) plus the
    /// transform for the eventual reply.
    Proceed {
        args: XdrBuffer,
        reply_transform: Option<Arc<dyn ReplyTransform>>,
    },
}

/// Security filter seam in front of dispatch; the RPCSEC_GSS layer
/// implements it for calls carrying a GSS credential.
pub trait SecurityFilter: Send + Sync {
    fn intercept(
        &self,
        transport: &Arc<dyn Transport>,
        reply_to: SocketAddr,
        decoded: &crate::protocol::message::DecodedCall,
        buf: XdrBuffer,
    ) -> RpcResult<FilterOutcome>;
}

/// The server dispatch engine.
pub struct RpcDispatcher {
    services: DashMap<ProgramId, Arc<dyn RpcService>>,
    executor: Arc<dyn ExecutionStrategy>,
    security: Option<Arc<dyn SecurityFilter>>,
    propagate_identity: bool,
    requests_processed: AtomicU64,
}

impl RpcDispatcher {
    pub fn new(config: &EngineConfig) -> Arc<Self> {
        Self::with_executor(config, super::executor::from_config(config))
    }

    pub fn with_executor(config: &EngineConfig, executor: Arc<dyn ExecutionStrategy>) -> Arc<Self> {
        Arc::new(Self {
            services: DashMap::new(),
            executor,
            security: None,
            propagate_identity: config.propagate_identity,
            requests_processed: AtomicU64::new(0),
        })
    }

    /// Install the security filter (RPCSEC_GSS). Construction-time only.
    pub fn with_security(self: Arc<Self>, filter: Arc<dyn SecurityFilter>) -> Arc<Self> {
        // Registry and counters carry over; the filter slot is the only
        // change, so rebuild around the same maps.
        Arc::new(Self {
            services: self.services.clone(),
            executor: Arc::clone(&self.executor),
            security: Some(filter),
            propagate_identity: self.propagate_identity,
            requests_processed: AtomicU64::new(self.requests_processed.load(Ordering::Relaxed)),
        })
    }

    /// Register a handler for one `(program, version)` pair.
    pub fn register(&self, program: u32, version: u32, service: Arc<dyn RpcService>) {
        log::info!("registered program {} version {}", program, version);
        self.services
            .insert(ProgramId::new(program, version), service);
    }

    pub fn unregister(&self, program: u32, version: u32) {
        if self
            .services
            .remove(&ProgramId::new(program, version))
            .is_some()
        {
            log::info!("unregistered program {} version {}", program, version);
        }
    }

    /// Registered `(program, version)` pairs, for registry publication.
    pub fn registered_programs(&self) -> Vec<ProgramId> {
        self.services.iter().map(|e| *e.key()).collect()
    }

    pub fn requests_processed(&self) -> u64 {
        self.requests_processed.load(Ordering::Relaxed)
    }

    /// Process one call message, positioned just past the preamble.
    pub fn dispatch_call(
        &self,
        transport: Arc<dyn Transport>,
        reply_to: SocketAddr,
        xid: u32,
        mut buf: XdrBuffer,
    ) {
        // RPC version gate comes before any further decoding.
        let rpc_version = match buf.decode_uint() {
            Ok(v) => v,
            Err(e) => {
                log::warn!("{}: truncated call header: {}", reply_to, e);
                return;
            }
        };
        if rpc_version != RPC_VERSION {
            log::warn!("{}: RPC version {} not supported", reply_to, rpc_version);
            let reply = ReplyHeader::denied(
                xid,
                DeniedStat::RpcMismatch {
                    low: RPC_VERSION,
                    high: RPC_VERSION,
                },
            );
            send_reply(&transport, reply_to, &reply);
            return;
        }

        let decoded = match CallHeader::decode_after_version(xid, rpc_version, &mut buf) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("{}: bad call header: {}", reply_to, e);
                send_reply(&transport, reply_to, &error_to_reply(xid, &e));
                return;
            }
        };

        self.requests_processed.fetch_add(1, Ordering::Relaxed);

        // AUTH_TLS probe: answer STARTTLS and hand the connection to the
        // protection hook; no handler is involved (RFC 9289).
        if decoded.header.credential == Credential::TlsStart {
            self.answer_tls_probe(&transport, reply_to, &decoded.header);
            return;
        }

        // Security filter (RPCSEC_GSS) sits between decode and dispatch.
        let (args, reply_transform) = if matches!(decoded.header.credential, Credential::Gss { .. })
        {
            let Some(filter) = &self.security else {
                send_reply(
                    &transport,
                    reply_to,
                    &ReplyHeader::denied(xid, DeniedStat::AuthError(AuthStat::BadCred)),
                );
                return;
            };
            match filter.intercept(&transport, reply_to, &decoded, buf) {
                Ok(FilterOutcome::Consumed) => return,
                Ok(FilterOutcome::Proceed {
                    args,
                    reply_transform,
                }) => (args, reply_transform),
                Err(e) => {
                    log::warn!("{}: security filter rejected xid {:#x}: {}", reply_to, xid, e);
                    send_reply(&transport, reply_to, &error_to_reply(xid, &e));
                    return;
                }
            }
        } else {
            (buf, None)
        };

        // Resolve (program, version) in the registry.
        let program_id = decoded.header.program_id();
        let Some(service) = self.services.get(&program_id).map(|e| Arc::clone(e.value())) else {
            let reply = match self.version_range(decoded.header.program) {
                Some((low, high)) => ReplyHeader::accepted(
                    xid,
                    Verifier::none(),
                    AcceptedStat::ProgMismatch { low, high },
                ),
                None => {
                    ReplyHeader::accepted(xid, Verifier::none(), AcceptedStat::ProgUnavail)
                }
            };
            log::debug!(
                "{}: no handler for program {} version {}",
                reply_to,
                decoded.header.program,
                decoded.header.version
            );
            send_reply(&transport, reply_to, &reply);
            return;
        };

        if self.propagate_identity {
            if let Some((uid, gid)) = ctx_identity(&decoded.header.credential) {
                log::debug!("xid {:#x} invoked as uid={} gid={}", xid, uid, gid);
            }
        }

        let mut ctx = CallContext::new(
            decoded.header,
            args,
            Arc::clone(&transport),
            reply_to,
            reply_transform,
        );
        self.executor.execute(Box::new(move || invoke(service, &mut ctx)));
    }

    fn answer_tls_probe(
        &self,
        transport: &Arc<dyn Transport>,
        reply_to: SocketAddr,
        header: &CallHeader,
    ) {
        if header.procedure != 0 {
            send_reply(
                transport,
                reply_to,
                &ReplyHeader::denied(header.xid, DeniedStat::AuthError(AuthStat::BadCred)),
            );
            return;
        }
        let reply = ReplyHeader::accepted(
            header.xid,
            Verifier::new(AUTH_NONE, AUTH_TLS_STARTTLS.to_vec()),
            AcceptedStat::Success,
        );
        send_reply(transport, reply_to, &reply);
        if let Err(e) = transport.start_protection() {
            log::warn!("{}: TLS upgrade failed: {}", reply_to, e);
        }
    }

    fn version_range(&self, program: u32) -> Option<(u32, u32)> {
        let mut range: Option<(u32, u32)> = None;
        for entry in self.services.iter() {
            if entry.key().program == program {
                let v = entry.key().version;
                range = Some(match range {
                    Some((low, high)) => (low.min(v), high.max(v)),
                    None => (v, v),
                });
            }
        }
        range
    }
}

fn ctx_identity(credential: &Credential) -> Option<(u32, u32)> {
    match credential {
        Credential::Unix { uid, gid, .. } => Some((*uid, *gid)),
        _ => None,
    }
}

/// Invoke a handler and enforce the reply contract.
fn invoke(service: Arc<dyn RpcService>, ctx: &mut CallContext) {
    let xid = ctx.xid();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| service.handle(ctx)));
    match outcome {
        Ok(Ok(())) => {
            if !ctx.has_replied() {
                log::warn!("handler for xid {:#x} finished without replying", xid);
            }
        }
        Ok(Err(e)) => {
            if !ctx.has_replied() {
                let reply = error_to_reply(xid, &e);
                log::debug!("handler for xid {:#x} failed: {}", xid, e);
                send_reply(ctx.transport(), ctx.reply_to, &reply);
            } else {
                log::warn!("handler for xid {:#x} failed after replying: {}", xid, e);
            }
        }
        Err(panic) => {
            // A panicking handler is a server bug: tell the caller
            // SYSTEM_ERR, then re-raise so the hosting executor sees it.
            if !ctx.has_replied() {
                let reply =
                    ReplyHeader::accepted(xid, Verifier::none(), AcceptedStat::SystemErr);
                send_reply(ctx.transport(), ctx.reply_to, &reply);
            }
            log::error!("handler for xid {:#x} panicked", xid);
            std::panic::resume_unwind(panic);
        }
    }
}

/// Map a handler/decode error to the reply the caller should see.
fn error_to_reply(xid: u32, err: &RpcError) -> ReplyHeader {
    match err {
        RpcError::Codec(_) | RpcError::Envelope(_) | RpcError::GarbageArgs => {
            ReplyHeader::accepted(xid, Verifier::none(), AcceptedStat::GarbageArgs)
        }
        RpcError::ProgUnavailable => {
            ReplyHeader::accepted(xid, Verifier::none(), AcceptedStat::ProgUnavail)
        }
        RpcError::ProgMismatch { low, high } => ReplyHeader::accepted(
            xid,
            Verifier::none(),
            AcceptedStat::ProgMismatch {
                low: *low,
                high: *high,
            },
        ),
        RpcError::ProcUnavailable => {
            ReplyHeader::accepted(xid, Verifier::none(), AcceptedStat::ProcUnavail)
        }
        RpcError::RpcMismatch { low, high } => ReplyHeader::denied(
            xid,
            DeniedStat::RpcMismatch {
                low: *low,
                high: *high,
            },
        ),
        RpcError::Auth(stat) => ReplyHeader::denied(xid, DeniedStat::AuthError(*stat)),
        RpcError::SystemError
        | RpcError::Disconnected
        | RpcError::SendFailed(_)
        | RpcError::Timeout
        | RpcError::Cancelled => {
            ReplyHeader::accepted(xid, Verifier::none(), AcceptedStat::SystemErr)
        }
    }
}

fn send_reply(transport: &Arc<dyn Transport>, reply_to: SocketAddr, reply: &ReplyHeader) {
    let mut out = XdrBuffer::new();
    if let Err(e) = out.begin_encoding() {
        log::error!("reply buffer unusable: {}", e);
        return;
    }
    reply.encode(&mut out);
    out.end_encoding();
    let xid = reply.xid;
    transport.send(
        out,
        reply_to,
        Some(Box::new(move |result| {
            if let Err(e) = result {
                log::warn!("status reply for xid {:#x} failed to send: {}", xid, e);
            }
        })),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionMode;
    use crate::protocol::message::decode_preamble;
    use crate::transport::{LoopbackTransport, MessageSink};
    use parking_lot::Mutex;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().expect("test addr")
    }

    fn inline_config() -> EngineConfig {
        EngineConfig {
            execution: ExecutionMode::Inline,
            ..Default::default()
        }
    }

    /// Collects raw reply buffers arriving back at the client side.
    fn capture_sink() -> (MessageSink, Arc<Mutex<Vec<XdrBuffer>>>) {
        let replies = Arc::new(Mutex::new(Vec::new()));
        let r = Arc::clone(&replies);
        let sink: MessageSink = Arc::new(move |buf| {
            r.lock().push(buf);
        });
        (sink, replies)
    }

    fn encode_call(header: &CallHeader, arg: Option<u32>) -> XdrBuffer {
        let mut buf = XdrBuffer::new();
        buf.begin_encoding().expect("begin");
        header.encode(&mut buf).expect("encode");
        if let Some(v) = arg {
            buf.encode_uint(v);
        }
        buf.end_encoding();
        buf
    }

    fn run_call(dispatcher: &Arc<RpcDispatcher>, message: XdrBuffer) -> ReplyHeader {
        let (client_side, server_side) = LoopbackTransport::pair(addr(9100), addr(9200));
        let (sink, replies) = capture_sink();
        client_side.set_sink(sink);

        let server: Arc<dyn Transport> = server_side;
        let mut buf = message;
        buf.begin_decoding().expect("begin");
        let (xid, _) = decode_preamble(&mut buf).expect("preamble");
        dispatcher.dispatch_call(Arc::clone(&server), addr(9100), xid, buf);

        let mut replies = replies.lock();
        assert_eq!(replies.len(), 1, "exactly one reply expected");
        let mut reply = replies.remove(0);
        reply.begin_decoding().expect("begin");
        let (rxid, _) = decode_preamble(&mut reply).expect("reply preamble");
        ReplyHeader::decode_after_preamble(rxid, &mut reply).expect("reply header")
    }

    #[test]
    fn test_prog_unavail_without_invoking() {
        let dispatcher = RpcDispatcher::new(&inline_config());
        let header = CallHeader::new(1, 300_700, 1, 0, Credential::None, Verifier::none());
        let reply = run_call(&dispatcher, encode_call(&header, None));
        assert!(matches!(
            reply.body,
            crate::protocol::message::ReplyBody::Accepted {
                stat: AcceptedStat::ProgUnavail,
                ..
            }
        ));
    }

    #[test]
    fn test_prog_mismatch_reports_version_range() {
        let dispatcher = RpcDispatcher::new(&inline_config());
        dispatcher.register(300_700, 2, Arc::new(|_: &mut CallContext| -> RpcResult<()> { Ok(()) }));
        dispatcher.register(300_700, 4, Arc::new(|_: &mut CallContext| -> RpcResult<()> { Ok(()) }));

        let header = CallHeader::new(2, 300_700, 9, 0, Credential::None, Verifier::none());
        let reply = run_call(&dispatcher, encode_call(&header, None));
        assert!(matches!(
            reply.body,
            crate::protocol::message::ReplyBody::Accepted {
                stat: AcceptedStat::ProgMismatch { low: 2, high: 4 },
                ..
            }
        ));
    }

    #[test]
    fn test_rpc_version_mismatch_denied() {
        let dispatcher = RpcDispatcher::new(&inline_config());
        let mut header = CallHeader::new(3, 300_700, 1, 0, Credential::None, Verifier::none());
        header.rpc_version = 3;
        let reply = run_call(&dispatcher, encode_call(&header, None));
        assert!(matches!(
            reply.body,
            crate::protocol::message::ReplyBody::Denied(DeniedStat::RpcMismatch {
                low: 2,
                high: 2
            })
        ));
    }

    #[test]
    fn test_echo_handler_replies() {
        let dispatcher = RpcDispatcher::new(&inline_config());
        dispatcher.register(
            300_700,
            1,
            Arc::new(|ctx: &mut CallContext| {
                let value: u32 = ctx.decode_args()?;
                ctx.reply(&value)
            }),
        );

        let header = CallHeader::new(4, 300_700, 1, 1, Credential::None, Verifier::none());
        let reply = run_call(&dispatcher, encode_call(&header, Some(0xABCD)));
        assert!(matches!(
            reply.body,
            crate::protocol::message::ReplyBody::Accepted {
                stat: AcceptedStat::Success,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_error_maps_to_garbage_args() {
        let dispatcher = RpcDispatcher::new(&inline_config());
        dispatcher.register(
            300_700,
            1,
            Arc::new(|ctx: &mut CallContext| {
                let _: String = ctx.decode_args()?; // no argument bytes present
                ctx.reply(&())
            }),
        );

        let header = CallHeader::new(5, 300_700, 1, 1, Credential::None, Verifier::none());
        let reply = run_call(&dispatcher, encode_call(&header, None));
        assert!(matches!(
            reply.body,
            crate::protocol::message::ReplyBody::Accepted {
                stat: AcceptedStat::GarbageArgs,
                ..
            }
        ));
    }

    #[test]
    fn test_gss_credential_without_filter_is_rejected() {
        let dispatcher = RpcDispatcher::new(&inline_config());
        let header = CallHeader::new(
            6,
            300_700,
            1,
            0,
            Credential::Gss {
                version: 1,
                procedure: crate::protocol::GssProcedure::Data,
                sequence: 1,
                service: crate::protocol::GssService::None,
                handle: vec![1],
            },
            Verifier::none(),
        );
        let reply = run_call(&dispatcher, encode_call(&header, None));
        assert!(matches!(
            reply.body,
            crate::protocol::message::ReplyBody::Denied(DeniedStat::AuthError(AuthStat::BadCred))
        ));
    }

    #[test]
    fn test_tls_probe_starts_protection() {
        let dispatcher = RpcDispatcher::new(&inline_config());
        let (client_side, server_side) = LoopbackTransport::pair(addr(9101), addr(9201));
        let (sink, replies) = capture_sink();
        client_side.set_sink(sink);

        let header = CallHeader::new(7, 100_000, 2, 0, Credential::TlsStart, Verifier::none());
        let mut buf = encode_call(&header, None);
        buf.begin_decoding().expect("begin");
        let (xid, _) = decode_preamble(&mut buf).expect("preamble");
        let server: Arc<dyn Transport> = server_side.clone();
        dispatcher.dispatch_call(server, addr(9101), xid, buf);

        assert!(server_side.is_protected());
        let mut replies = replies.lock();
        let mut reply = replies.remove(0);
        reply.begin_decoding().expect("begin");
        let (rxid, _) = decode_preamble(&mut reply).expect("preamble");
        let decoded = ReplyHeader::decode_after_preamble(rxid, &mut reply).expect("header");
        match decoded.body {
            crate::protocol::message::ReplyBody::Accepted { verifier, stat } => {
                assert_eq!(stat, AcceptedStat::Success);
                assert_eq!(verifier.body, AUTH_TLS_STARTTLS.to_vec());
            }
            other => panic!("unexpected reply body: {:?}", other),
        }
    }

    #[test]
    fn test_double_reply_is_an_error() {
        let dispatcher = RpcDispatcher::new(&inline_config());
        let saw_error = Arc::new(Mutex::new(false));
        let s = Arc::clone(&saw_error);
        dispatcher.register(
            300_700,
            1,
            Arc::new(move |ctx: &mut CallContext| {
                ctx.reply(&1u32)?;
                if ctx.reply(&2u32).is_err() {
                    *s.lock() = true;
                }
                Ok(())
            }),
        );

        let header = CallHeader::new(8, 300_700, 1, 1, Credential::None, Verifier::none());
        let _ = run_call(&dispatcher, encode_call(&header, None));
        assert!(*saw_error.lock());
    }
}
