// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Call/reply correlation: the registry of in-flight client requests.
//!
//! Every outstanding call is keyed by its xid. Three events compete to
//! finish a request -- the matching reply, its timeout, and a connection
//! loss -- and `take()` is the single arbitration point: whichever caller
//! removes the entry delivers the outcome, everyone else sees `None` and
//! does nothing. No further callback can fire for an xid once it has been
//! taken.

use super::timer::{TimeoutHandle, TimerThread};
use crate::error::{RpcError, RpcResult};
use crate::xdr::XdrBuffer;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Completion callback for one call. On success it receives the reply
/// message buffer positioned just past the preamble (xid and msg type).
pub type CompletionHandler = Box<dyn FnOnce(RpcResult<XdrBuffer>) + Send + Sync>;

struct PendingRequest {
    remote: SocketAddr,
    handler: CompletionHandler,
    timeout: Option<TimeoutHandle>,
}

/// Registry of in-flight requests for one engine instance.
pub struct ReplyQueue {
    pending: Arc<DashMap<u32, PendingRequest>>,
    /// Remotes that have seen a disconnect sweep; registration against
    /// them fails immediately.
    torn_down: Mutex<HashSet<SocketAddr>>,
    timer: TimerThread,
}

impl ReplyQueue {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            torn_down: Mutex::new(HashSet::new()),
            timer: TimerThread::spawn("oncrpc-timeout"),
        }
    }

    /// Record a pending request. With a timeout, a background failure of
    /// the same handler is scheduled, to fire only if no reply wins
    /// first. Fails if the remote has already been torn down.
    pub fn register(
        self: &Arc<Self>,
        xid: u32,
        remote: SocketAddr,
        handler: CompletionHandler,
        timeout: Option<Duration>,
    ) -> RpcResult<()> {
        if self.torn_down.lock().contains(&remote) {
            return Err(RpcError::Disconnected);
        }
        self.pending.insert(
            xid,
            PendingRequest {
                remote,
                handler,
                timeout: None,
            },
        );

        if let Some(delay) = timeout {
            let queue = Arc::clone(self);
            let handle = self.timer.schedule(
                delay,
                Box::new(move || {
                    if let Some(handler) = queue.take(xid) {
                        log::debug!("xid {:#x} timed out after {:?}", xid, delay);
                        handler(Err(RpcError::Timeout));
                    }
                }),
            );
            // The timeout may already have fired and taken the entry; in
            // that rare race the handle has nothing left to guard.
            match self.pending.get_mut(&xid) {
                Some(mut entry) => entry.timeout = Some(handle),
                None => handle.cancel(),
            }
        }
        Ok(())
    }

    /// Atomically remove and return the handler for `xid`, cancelling its
    /// scheduled timeout. Returns `None` if a reply, timeout, or
    /// disconnect already claimed it.
    pub fn take(&self, xid: u32) -> Option<CompletionHandler> {
        let (_, entry) = self.pending.remove(&xid)?;
        if let Some(handle) = entry.timeout {
            handle.cancel();
        }
        Some(entry.handler)
    }

    /// Deliver a disconnect failure to every request still pending
    /// against `remote`, and refuse future registrations for it.
    pub fn on_disconnect(&self, remote: SocketAddr) {
        self.torn_down.lock().insert(remote);
        let victims: Vec<u32> = self
            .pending
            .iter()
            .filter(|e| e.value().remote == remote)
            .map(|e| *e.key())
            .collect();
        if !victims.is_empty() {
            log::info!("{}: failing {} pending call(s) on disconnect", remote, victims.len());
        }
        for xid in victims {
            if let Some(handler) = self.take(xid) {
                handler(Err(RpcError::Disconnected));
            }
        }
    }

    /// Xids still pending against `remote` (introspection/testing).
    pub fn pending_for(&self, remote: SocketAddr) -> Vec<u32> {
        self.pending
            .iter()
            .filter(|e| e.value().remote == remote)
            .map(|e| *e.key())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for ReplyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().expect("test addr")
    }

    fn counting_handler(counter: &Arc<AtomicUsize>) -> CompletionHandler {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_take_is_exactly_once() {
        let queue = Arc::new(ReplyQueue::new());
        let fired = Arc::new(AtomicUsize::new(0));
        queue
            .register(1, addr(111), counting_handler(&fired), None)
            .expect("register");

        assert!(queue.take(1).is_some());
        assert!(queue.take(1).is_none());
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_concurrent_takers_single_winner() {
        // Reply delivery, timeout firing, and a disconnect sweep may race
        // from different threads; exactly one must win.
        for _ in 0..50 {
            let queue = Arc::new(ReplyQueue::new());
            let delivered = Arc::new(AtomicUsize::new(0));
            let d = Arc::clone(&delivered);
            queue
                .register(
                    7,
                    addr(222),
                    Box::new(move |_| {
                        d.fetch_add(1, Ordering::SeqCst);
                    }),
                    None,
                )
                .expect("register");

            let mut threads = Vec::new();
            for _ in 0..4 {
                let q = Arc::clone(&queue);
                threads.push(std::thread::spawn(move || {
                    if let Some(handler) = q.take(7) {
                        handler(Ok(XdrBuffer::new()));
                        1
                    } else {
                        0
                    }
                }));
            }
            let winners: usize = threads.into_iter().map(|t| t.join().expect("join")).sum();
            assert_eq!(winners, 1);
            assert_eq!(delivered.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_timeout_fires_and_clears_entry() {
        let queue = Arc::new(ReplyQueue::new());
        let outcome = Arc::new(Mutex::new(None));
        let o = Arc::clone(&outcome);
        queue
            .register(
                9,
                addr(333),
                Box::new(move |result| {
                    *o.lock() = Some(result.map(|_| ()));
                }),
                Some(Duration::from_millis(20)),
            )
            .expect("register");

        std::thread::sleep(Duration::from_millis(100));
        assert!(matches!(*outcome.lock(), Some(Err(RpcError::Timeout))));
        assert_eq!(queue.pending_count(), 0, "pending table must be empty");
    }

    #[test]
    fn test_reply_beats_timeout() {
        let queue = Arc::new(ReplyQueue::new());
        let fired = Arc::new(AtomicUsize::new(0));
        queue
            .register(
                5,
                addr(444),
                counting_handler(&fired),
                Some(Duration::from_millis(40)),
            )
            .expect("register");

        let handler = queue.take(5).expect("reply wins");
        handler(Ok(XdrBuffer::new()));
        std::thread::sleep(Duration::from_millis(100));
        // The cancelled timeout must not have fired the handler again.
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_sweep_delivers_eof() {
        let queue = Arc::new(ReplyQueue::new());
        let results = Arc::new(Mutex::new(Vec::new()));
        for xid in 1..=3 {
            let r = Arc::clone(&results);
            queue
                .register(
                    xid,
                    addr(555),
                    Box::new(move |result| {
                        r.lock().push(result.map(|_| ()));
                    }),
                    None,
                )
                .expect("register");
        }
        // A request to a different remote survives the sweep.
        queue
            .register(99, addr(556), Box::new(|_| {}), None)
            .expect("register other remote");

        queue.on_disconnect(addr(555));

        let results = results.lock();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| matches!(r, Err(RpcError::Disconnected))));
        assert_eq!(queue.pending_for(addr(556)), vec![99]);
    }

    #[test]
    fn test_register_after_teardown_fails() {
        let queue = Arc::new(ReplyQueue::new());
        queue.on_disconnect(addr(666));
        let err = queue
            .register(1, addr(666), Box::new(|_| {}), None)
            .unwrap_err();
        assert!(matches!(err, RpcError::Disconnected));
    }
}
