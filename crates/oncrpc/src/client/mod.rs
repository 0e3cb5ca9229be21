// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client side of the engine: call construction, asynchronous send,
//! reply correlation, and per-call timeouts.

pub mod call;
pub mod correlation;
pub mod timer;

pub use call::{CallFuture, RpcClient, XidGenerator};
pub use correlation::{CompletionHandler, ReplyQueue};
pub use timer::{TimeoutHandle, TimerThread};
