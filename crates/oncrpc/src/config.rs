// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine configuration.
//!
//! One [`EngineConfig`] is injected at client/server construction and
//! never consulted globally; independent engine instances (e.g. in
//! tests) do not interfere.
//!
//! # Example
//!
//! ```
//! use oncrpc::config::{EngineConfig, ExecutionMode};
//! use std::time::Duration;
//!
//! let config = EngineConfig {
//!     default_call_timeout: Some(Duration::from_secs(5)),
//!     execution: ExecutionMode::Inline,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

/// How server handlers are invoked relative to the I/O context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Invoke on the thread that decoded the call.
    Inline,
    /// Hand invocations to a bounded worker pool.
    WorkerPool,
}

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    // === Framing ===
    /// Maximum reassembled record size in bytes (anti-OOM protection).
    pub max_record_size: usize,

    // === Client ===
    /// Timeout applied to calls that do not specify their own.
    /// `None` means wait indefinitely (until reply or disconnect).
    pub default_call_timeout: Option<Duration>,

    // === Server ===
    /// Handler invocation strategy.
    pub execution: ExecutionMode,

    /// Worker threads when `execution` is `WorkerPool`.
    pub worker_threads: usize,

    /// Expose the caller's AUTH_SYS identity to handlers for
    /// identity-sensitive services.
    pub propagate_identity: bool,

    /// Name used for spawned threads and registry ownership.
    pub service_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_record_size: crate::framing::DEFAULT_MAX_RECORD_SIZE,
            default_call_timeout: None,
            execution: ExecutionMode::WorkerPool,
            worker_threads: 4,
            propagate_identity: false,
            service_name: "oncrpc".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.execution, ExecutionMode::WorkerPool);
        assert_eq!(config.worker_threads, 4);
        assert!(config.default_call_timeout.is_none());
        assert!(!config.propagate_identity);
    }
}
