// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # oncrpc - ONC/Sun RPC protocol engine
//!
//! A pure Rust implementation of the ONC RPC protocol (RFC 1831) with
//! its XDR encoding (RFC 1832/4506), stream record marking, and the
//! RPCSEC_GSS security extension (RFC 2203), for building RPC clients
//! and services over stream or datagram transports.
//!
//! ## Quick Start
//!
//! ```rust
//! use oncrpc::config::{EngineConfig, ExecutionMode};
//! use oncrpc::client::RpcClient;
//! use oncrpc::demux::ConnectionDemux;
//! use oncrpc::protocol::Credential;
//! use oncrpc::server::{CallContext, RpcDispatcher};
//! use oncrpc::transport::{LoopbackTransport, Transport};
//! use std::sync::Arc;
//!
//! # fn main() -> oncrpc::RpcResult<()> {
//! let config = EngineConfig { execution: ExecutionMode::Inline, ..Default::default() };
//!
//! // A server answering program 100017, version 1.
//! let dispatcher = RpcDispatcher::new(&config);
//! dispatcher.register(100017, 1, Arc::new(|ctx: &mut CallContext| {
//!     let n: u32 = ctx.decode_args()?;
//!     ctx.reply(&(n + 1))
//! }));
//!
//! // Wire both ends over an in-process connection.
//! let (client_end, server_end) = LoopbackTransport::pair(
//!     "127.0.0.1:1049".parse().unwrap(),
//!     "127.0.0.1:111".parse().unwrap(),
//! );
//! server_end.set_sink(ConnectionDemux::server(dispatcher).sink(server_end.clone()));
//!
//! let client = RpcClient::new(client_end.clone(), 100017, 1, &config);
//! client_end.set_sink(ConnectionDemux::client(client.clone()).sink(client_end.clone()));
//!
//! let reply: u32 = client.call(1, &41u32, Credential::None, None)?.wait()?;
//! assert_eq!(reply, 42);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Application Layer                           |
//! |      RpcClient / CallFuture          RpcService handlers           |
//! +--------------------------------------------------------------------+
//! |                          Engine Layer                              |
//! |  Correlation (ReplyQueue, timeouts) | Dispatch (registry, exec)    |
//! |                 RPCSEC_GSS filter (optional)                       |
//! +--------------------------------------------------------------------+
//! |                         Protocol Layer                             |
//! |    Call/Reply headers | Credentials | XDR codec | Record marking   |
//! +--------------------------------------------------------------------+
//! |                     Transport Layer (external)                     |
//! |        Stream / datagram substrate behind the Transport trait      |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`xdr::XdrBuffer`] | Growable big-endian buffer with read/write cursors |
//! | [`framing::RecordFramer`] | Stream defragmenter (RFC 1831 record marking) |
//! | [`client::RpcClient`] | Builds calls, correlates replies, exposes futures |
//! | [`server::RpcDispatcher`] | Resolves `(program, version)` and invokes handlers |
//! | [`gss::GssFilter`] | RPCSEC_GSS negotiation and per-message transforms |
//!
//! ## See Also
//!
//! - [RFC 1831](https://www.rfc-editor.org/rfc/rfc1831) -- RPC protocol v2
//! - [RFC 4506](https://www.rfc-editor.org/rfc/rfc4506) -- XDR
//! - [RFC 2203](https://www.rfc-editor.org/rfc/rfc2203) -- RPCSEC_GSS
//! - [RFC 9289](https://www.rfc-editor.org/rfc/rfc9289) -- RPC over TLS

/// Client side: call construction, correlation, timeouts, futures.
pub mod client;
/// Engine configuration injected at construction time.
pub mod config;
/// Per-connection routing of calls vs. replies.
pub mod demux;
/// Error taxonomy (codec, accept/reject, transport conditions).
pub mod error;
/// Record-marking framer for stream transports; datagram passthrough.
pub mod framing;
/// RPCSEC_GSS security layer (RFC 2203).
pub mod gss;
/// Wire protocol: constants, credentials, message headers.
pub mod protocol;
/// Portmap/rpcbind collaborator interface.
pub mod registry;
/// Server side: handler registry, dispatch, execution strategies.
pub mod server;
/// Transport seam and the in-process loopback pair.
pub mod transport;
/// XDR codec (RFC 4506).
pub mod xdr;

pub use client::{CallFuture, RpcClient};
pub use config::{EngineConfig, ExecutionMode};
pub use error::{RpcError, RpcResult};
pub use protocol::{Credential, ProgramId};
pub use server::{CallContext, RpcDispatcher, RpcService};
pub use xdr::{XdrBuffer, XdrDecode, XdrEncode};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
