// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport seam between the protocol engine and the I/O substrate.
//!
//! Socket binding, readiness polling, and TLS session establishment live
//! outside this crate; the engine consumes only the [`Transport`] trait.
//! TLS in particular is reduced to two hooks: "is this connection
//! currently protected" and "start protecting now".
//!
//! [`LoopbackTransport`] is an in-process stream pair used by tests and
//! by services that talk to themselves; it runs real record framing over
//! an in-memory wire.

use crate::error::{RpcError, RpcResult};
use crate::framing::{write_record_locked, RecordFramer};
use crate::xdr::XdrBuffer;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Framing policy implied by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Reliable byte stream; messages are record-marked.
    Stream,
    /// Datagrams; one datagram is one message.
    Datagram,
}

/// Callback invoked when an asynchronous send completes.
pub type SendCompletion = Option<Box<dyn FnOnce(RpcResult<()>) + Send>>;

/// One connection (or datagram flow) as seen by the engine.
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    fn is_open(&self) -> bool;

    fn local_address(&self) -> SocketAddr;

    fn remote_address(&self) -> SocketAddr;

    /// Frame one complete message and place it on the wire.
    ///
    /// Stream implementations must serialize whole records against other
    /// concurrent sends on the same connection; sends on different
    /// connections are independent.
    fn send(&self, message: XdrBuffer, destination: SocketAddr, on_complete: SendCompletion);

    /// Ask the substrate to upgrade this connection to TLS.
    fn start_protection(&self) -> RpcResult<()>;

    fn is_protected(&self) -> bool;
}

/// Inbound message sink registered by the connection's demultiplexer.
pub type MessageSink = Arc<dyn Fn(XdrBuffer) + Send + Sync>;

struct Endpoint {
    local: SocketAddr,
    remote: SocketAddr,
    sink: Mutex<Option<MessageSink>>,
    framer: Mutex<RecordFramer>,
    disconnect_hooks: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
}

/// In-memory stream transport: two connected endpoints, real framing.
pub struct LoopbackTransport {
    me: Arc<Endpoint>,
    peer: Arc<Endpoint>,
    open: Arc<AtomicBool>,
    protected: Arc<AtomicBool>,
    send_lock: Mutex<()>,
}

impl LoopbackTransport {
    /// Create a connected pair. Messages sent on one side arrive at the
    /// sink registered on the other.
    pub fn pair(a: SocketAddr, b: SocketAddr) -> (Arc<Self>, Arc<Self>) {
        let end_a = Arc::new(Endpoint {
            local: a,
            remote: b,
            sink: Mutex::new(None),
            framer: Mutex::new(RecordFramer::with_default_max()),
            disconnect_hooks: Mutex::new(Vec::new()),
        });
        let end_b = Arc::new(Endpoint {
            local: b,
            remote: a,
            sink: Mutex::new(None),
            framer: Mutex::new(RecordFramer::with_default_max()),
            disconnect_hooks: Mutex::new(Vec::new()),
        });
        let open = Arc::new(AtomicBool::new(true));
        let protected = Arc::new(AtomicBool::new(false));

        let side_a = Arc::new(Self {
            me: Arc::clone(&end_a),
            peer: Arc::clone(&end_b),
            open: Arc::clone(&open),
            protected: Arc::clone(&protected),
            send_lock: Mutex::new(()),
        });
        let side_b = Arc::new(Self {
            me: end_b,
            peer: end_a,
            open,
            protected,
            send_lock: Mutex::new(()),
        });
        (side_a, side_b)
    }

    /// Register the sink that receives complete inbound messages.
    pub fn set_sink(&self, sink: MessageSink) {
        *self.me.sink.lock() = Some(sink);
    }

    /// Register a hook run once when the connection is torn down.
    pub fn on_disconnect(&self, hook: Box<dyn Fn() + Send + Sync>) {
        self.me.disconnect_hooks.lock().push(hook);
    }

    /// Tear the connection down: both sides go closed, and every
    /// registered disconnect hook runs exactly once.
    pub fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        log::info!("loopback {} <-> {} closed", self.me.local, self.me.remote);
        for endpoint in [&self.me, &self.peer] {
            for hook in endpoint.disconnect_hooks.lock().iter() {
                hook();
            }
        }
    }

    fn deliver_to_peer(&self, wire: &[u8]) {
        // Reassemble under the framer lock, but never invoke the sink
        // while holding it: handlers may send on this connection again.
        let mut records = Vec::new();
        {
            let mut framer = self.peer.framer.lock();
            framer.feed(wire);
            loop {
                match framer.next_record() {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("loopback framing error: {}", e);
                        break;
                    }
                }
            }
        }
        let sink = self.peer.sink.lock().clone();
        match sink {
            Some(sink) => {
                for record in records {
                    sink(record);
                }
            }
            None => log::warn!("loopback {}: no sink registered, dropping", self.peer.local),
        }
    }
}

impl Transport for LoopbackTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn local_address(&self) -> SocketAddr {
        self.me.local
    }

    fn remote_address(&self) -> SocketAddr {
        self.me.remote
    }

    fn send(&self, message: XdrBuffer, _destination: SocketAddr, on_complete: SendCompletion) {
        if !self.is_open() {
            if let Some(f) = on_complete {
                f(Err(RpcError::Disconnected));
            }
            return;
        }

        let mut wire = Vec::with_capacity(message.wire_len() + 4);
        let result = write_record_locked(&mut wire, &message, &self.send_lock);
        match result {
            Ok(()) => {
                self.deliver_to_peer(&wire);
                if let Some(f) = on_complete {
                    f(Ok(()));
                }
            }
            Err(e) => {
                if let Some(f) = on_complete {
                    f(Err(e));
                }
            }
        }
    }

    fn start_protection(&self) -> RpcResult<()> {
        self.protected.store(true, Ordering::SeqCst);
        log::debug!("loopback {}: protection enabled", self.me.local);
        Ok(())
    }

    fn is_protected(&self) -> bool {
        self.protected.load(Ordering::SeqCst)
    }
}
