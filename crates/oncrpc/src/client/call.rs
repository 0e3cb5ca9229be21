// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client call engine.
//!
//! Builds call messages, drives the asynchronous send, and completes the
//! caller's future when the correlation engine routes the reply back.
//!
//! Call lifecycle: `Building -> Sent -> {Completed | Failed | TimedOut}`.

use super::correlation::{CompletionHandler, ReplyQueue};
use crate::config::EngineConfig;
use crate::error::{RpcError, RpcResult};
use crate::protocol::auth::{Credential, Verifier};
use crate::protocol::message::{CallHeader, ReplyHeader};
use crate::transport::Transport;
use crate::xdr::{XdrBuffer, XdrDecode, XdrEncode};
use parking_lot::{Condvar, Mutex};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Transaction id source for one engine instance.
///
/// Seeded randomly once, then monotonically incremented (wrapping).
/// There is no collision check against still-pending xids; within a
/// connection's practical lifetime the 2^32 space does not wrap.
pub struct XidGenerator {
    next: AtomicU32,
}

impl XidGenerator {
    pub fn new() -> Self {
        let mut seed = [0u8; 4];
        let seed = if SystemRandom::new().fill(&mut seed).is_ok() {
            u32::from_be_bytes(seed)
        } else {
            // Clock-derived fallback when the system RNG is unavailable.
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.subsec_nanos())
                .unwrap_or(0)
        };
        Self {
            next: AtomicU32::new(seed),
        }
    }

    pub fn next_xid(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for XidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

struct FutureShared<R> {
    slot: Mutex<Option<RpcResult<R>>>,
    condvar: Condvar,
}

fn complete<R>(shared: &FutureShared<R>, result: RpcResult<R>) {
    let mut slot = shared.slot.lock();
    if slot.is_none() {
        *slot = Some(result);
        shared.condvar.notify_all();
    }
}

/// Future for one in-flight call.
///
/// Completion, failure, and cancellation all remove the xid from the
/// correlation engine, so an abandoned future does not leak a
/// pending-request entry.
pub struct CallFuture<R> {
    xid: u32,
    queue: Arc<ReplyQueue>,
    shared: Arc<FutureShared<R>>,
}

impl<R: Send + 'static> CallFuture<R> {
    fn new(xid: u32, queue: Arc<ReplyQueue>) -> (Self, Arc<FutureShared<R>>) {
        let shared = Arc::new(FutureShared {
            slot: Mutex::new(None),
            condvar: Condvar::new(),
        });
        (
            Self {
                xid,
                queue,
                shared: Arc::clone(&shared),
            },
            shared,
        )
    }

    pub fn xid(&self) -> u32 {
        self.xid
    }

    pub fn is_done(&self) -> bool {
        self.shared.slot.lock().is_some()
    }

    /// Cancel the local wait. The request is deregistered; a message
    /// already on the wire is not retracted.
    pub fn cancel(&self) {
        if self.queue.take(self.xid).is_some() {
            complete(&self.shared, Err(RpcError::Cancelled));
        }
    }

    /// Block until the call completes.
    pub fn wait(self) -> RpcResult<R> {
        let mut slot = self.shared.slot.lock();
        while slot.is_none() {
            self.shared.condvar.wait(&mut slot);
        }
        slot.take().expect("slot filled above")
    }

    /// Block until completion or until `timeout` elapses locally, in
    /// which case the call is deregistered and fails with `Timeout`.
    pub fn wait_for(self, timeout: Duration) -> RpcResult<R> {
        let deadline = std::time::Instant::now() + timeout;
        {
            let mut slot = self.shared.slot.lock();
            while slot.is_none() {
                if self.shared.condvar.wait_until(&mut slot, deadline).timed_out() {
                    break;
                }
            }
            if let Some(result) = slot.take() {
                return result;
            }
        }
        self.queue.take(self.xid);
        Err(RpcError::Timeout)
    }
}

/// RPC client bound to one transport and one (program, version).
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    program: u32,
    version: u32,
    queue: Arc<ReplyQueue>,
    xids: XidGenerator,
    default_timeout: Option<Duration>,
    calls_sent: AtomicU64,
    calls_completed: Arc<AtomicU64>,
    calls_failed: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        program: u32,
        version: u32,
        config: &EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            program,
            version,
            queue: Arc::new(ReplyQueue::new()),
            xids: XidGenerator::new(),
            default_timeout: config.default_call_timeout,
            calls_sent: AtomicU64::new(0),
            calls_completed: Arc::new(AtomicU64::new(0)),
            calls_failed: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn program(&self) -> u32 {
        self.program
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// The correlation engine, for demux wiring and introspection.
    pub fn reply_queue(&self) -> &Arc<ReplyQueue> {
        &self.queue
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn next_xid(&self) -> u32 {
        self.xids.next_xid()
    }

    pub fn calls_sent(&self) -> u64 {
        self.calls_sent.load(Ordering::Relaxed)
    }

    pub fn calls_completed(&self) -> u64 {
        self.calls_completed.load(Ordering::Relaxed)
    }

    pub fn calls_failed(&self) -> u64 {
        self.calls_failed.load(Ordering::Relaxed)
    }

    /// Issue a call and return a typed future for its result.
    pub fn call<A, R>(
        &self,
        procedure: u32,
        args: &A,
        credential: Credential,
        timeout: Option<Duration>,
    ) -> RpcResult<CallFuture<R>>
    where
        A: XdrEncode,
        R: XdrDecode + Send + 'static,
    {
        let xid = self.xids.next_xid();
        let message = self.encode_call(xid, procedure, &credential, args)?;
        self.start_call(
            xid,
            message,
            timeout,
            Box::new(move |mut buf: XdrBuffer| {
                let reply = ReplyHeader::decode_after_preamble(xid, &mut buf)?;
                if let Some(err) = reply.body.to_error() {
                    return Err(err);
                }
                let result = R::decode_xdr(&mut buf)?;
                buf.end_decoding();
                Ok(result)
            }),
        )
    }

    /// Issue a pre-encoded call message; the future yields the decoded
    /// reply envelope plus the buffer positioned at the result bytes.
    /// Security layers use this to apply their own body transforms.
    pub fn call_raw(
        &self,
        xid: u32,
        message: XdrBuffer,
        timeout: Option<Duration>,
    ) -> RpcResult<CallFuture<(ReplyHeader, XdrBuffer)>> {
        self.start_call(
            xid,
            message,
            timeout,
            Box::new(move |mut buf: XdrBuffer| {
                let reply = ReplyHeader::decode_after_preamble(xid, &mut buf)?;
                if let Some(err) = reply.body.to_error() {
                    return Err(err);
                }
                Ok((reply, buf))
            }),
        )
    }

    /// Issue a call with no completion. The transport is checked first
    /// so a known-dead connection surfaces synchronously instead of the
    /// failure vanishing.
    pub fn call_oneway<A: XdrEncode>(
        &self,
        procedure: u32,
        args: &A,
        credential: Credential,
    ) -> RpcResult<()> {
        if !self.transport.is_open() {
            return Err(RpcError::Disconnected);
        }
        let xid = self.xids.next_xid();
        let message = self.encode_call(xid, procedure, &credential, args)?;
        self.calls_sent.fetch_add(1, Ordering::Relaxed);
        self.transport.send(
            message,
            self.transport.remote_address(),
            Some(Box::new(move |result| {
                if let Err(e) = result {
                    log::warn!("one-way call xid {:#x} failed to send: {}", xid, e);
                }
            })),
        );
        Ok(())
    }

    /// Route a reply message (positioned past the preamble) to the
    /// request that is waiting for it.
    pub fn process_reply(&self, xid: u32, buf: XdrBuffer) {
        match self.queue.take(xid) {
            Some(handler) => handler(Ok(buf)),
            // Late reply after a timeout, disconnect, or cancellation.
            None => log::debug!("reply for unknown xid {:#x} dropped", xid),
        }
    }

    fn encode_call<A: XdrEncode>(
        &self,
        xid: u32,
        procedure: u32,
        credential: &Credential,
        args: &A,
    ) -> RpcResult<XdrBuffer> {
        let header = CallHeader::new(
            xid,
            self.program,
            self.version,
            procedure,
            credential.clone(),
            Verifier::none(),
        );
        let mut buf = XdrBuffer::new();
        buf.begin_encoding()?;
        header.encode(&mut buf)?;
        args.encode_xdr(&mut buf)?;
        buf.end_encoding();
        Ok(buf)
    }

    fn start_call<R: Send + 'static>(
        &self,
        xid: u32,
        message: XdrBuffer,
        timeout: Option<Duration>,
        decode: Box<dyn FnOnce(XdrBuffer) -> RpcResult<R> + Send + Sync>,
    ) -> RpcResult<CallFuture<R>> {
        let (future, shared) = CallFuture::new(xid, Arc::clone(&self.queue));

        let completed_count = Arc::clone(&self.calls_completed);
        let failed_count = Arc::clone(&self.calls_failed);
        let handler: CompletionHandler = Box::new(move |result| {
            let outcome = result.and_then(decode);
            match &outcome {
                Ok(_) => completed_count.fetch_add(1, Ordering::Relaxed),
                Err(_) => failed_count.fetch_add(1, Ordering::Relaxed),
            };
            complete(&shared, outcome);
        });

        let remote = self.transport.remote_address();
        self.queue
            .register(xid, remote, handler, timeout.or(self.default_timeout))?;
        self.calls_sent.fetch_add(1, Ordering::Relaxed);

        let queue = Arc::clone(&self.queue);
        self.transport.send(
            message,
            remote,
            Some(Box::new(move |result| {
                // A send failure is surfaced to this call only; the
                // pending entry is reclaimed through the usual
                // arbitration point.
                if let Err(e) = result {
                    if let Some(handler) = queue.take(xid) {
                        handler(Err(e));
                    }
                }
            })),
        );

        Ok(future)
    }
}
