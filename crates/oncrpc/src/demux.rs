// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-connection message demultiplexer.
//!
//! One connection can carry calls and replies in both directions (a
//! server handler may call back to its peer over the same transport), so
//! each inbound message is routed by its type: calls to the dispatcher,
//! replies to the correlation engine.

use crate::client::RpcClient;
use crate::protocol::message::{decode_preamble, MsgType};
use crate::server::RpcDispatcher;
use crate::transport::{MessageSink, Transport};
use crate::xdr::XdrBuffer;
use std::sync::Arc;

/// Routes inbound messages on one connection.
pub struct ConnectionDemux {
    dispatcher: Option<Arc<RpcDispatcher>>,
    client: Option<Arc<RpcClient>>,
}

impl ConnectionDemux {
    /// Server-only endpoint: inbound replies are unexpected.
    pub fn server(dispatcher: Arc<RpcDispatcher>) -> Arc<Self> {
        Arc::new(Self {
            dispatcher: Some(dispatcher),
            client: None,
        })
    }

    /// Client-only endpoint: inbound calls are unexpected.
    pub fn client(client: Arc<RpcClient>) -> Arc<Self> {
        Arc::new(Self {
            dispatcher: None,
            client: Some(client),
        })
    }

    /// Full duplex endpoint: both roles on one connection.
    pub fn duplex(dispatcher: Arc<RpcDispatcher>, client: Arc<RpcClient>) -> Arc<Self> {
        Arc::new(Self {
            dispatcher: Some(dispatcher),
            client: Some(client),
        })
    }

    /// Build the message sink to register with the transport.
    pub fn sink(self: &Arc<Self>, transport: Arc<dyn Transport>) -> MessageSink {
        let demux = Arc::clone(self);
        Arc::new(move |buf| demux.on_message(&transport, buf))
    }

    fn on_message(&self, transport: &Arc<dyn Transport>, mut buf: XdrBuffer) {
        if let Err(e) = buf.begin_decoding() {
            log::warn!("inbound message unusable: {}", e);
            return;
        }
        let (xid, kind) = match decode_preamble(&mut buf) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("dropping malformed message: {}", e);
                return;
            }
        };
        match kind {
            MsgType::Call => match &self.dispatcher {
                Some(dispatcher) => dispatcher.dispatch_call(
                    Arc::clone(transport),
                    transport.remote_address(),
                    xid,
                    buf,
                ),
                None => log::warn!("call xid {:#x} on client-only connection", xid),
            },
            MsgType::Reply => match &self.client {
                Some(client) => client.process_reply(xid, buf),
                None => log::warn!("reply xid {:#x} on server-only connection", xid),
            },
        }
    }
}
