// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handler invocation strategies.
//!
//! Whether a handler runs on the thread that decoded the call or on a
//! worker pool is a per-instance construction choice, injected as a
//! capability rather than checked ad hoc in the dispatch path.

use crate::config::{EngineConfig, ExecutionMode};
use crossbeam::channel::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

type Task = Box<dyn FnOnce() + Send>;

/// Queue capacity for the worker pool (bounded to prevent memory
/// explosion under overload; senders block when full).
const WORK_QUEUE_CAPACITY: usize = 1024;

/// Where and when dispatch tasks run.
pub trait ExecutionStrategy: Send + Sync {
    fn execute(&self, task: Task);
}

/// Run tasks synchronously on the calling thread.
pub struct InlineExecutor;

impl ExecutionStrategy for InlineExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// Bounded worker pool. A task that panics is logged and the worker
/// keeps serving; the panic signals a handler bug, not a pool problem.
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: usize, name: &str) -> Self {
        let (sender, receiver) = channel::bounded::<Task>(WORK_QUEUE_CAPACITY);
        let mut workers = Vec::with_capacity(threads.max(1));
        for i in 0..threads.max(1) {
            let receiver = receiver.clone();
            #[allow(clippy::expect_used)] // thread spawn failure is unrecoverable
            let handle = std::thread::Builder::new()
                .name(format!("{}-worker-{}", name, i))
                .spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        if let Err(panic) = std::panic::catch_unwind(
                            std::panic::AssertUnwindSafe(task),
                        ) {
                            log::error!("handler panicked in worker: {}", panic_message(&*panic));
                        }
                    }
                })
                .expect("Failed to spawn worker thread");
            workers.push(handle);
        }
        Self {
            sender: Some(sender),
            workers,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

impl ExecutionStrategy for WorkerPool {
    fn execute(&self, task: Task) {
        if let Some(sender) = &self.sender {
            if sender.send(task).is_err() {
                log::error!("worker pool is shut down, dropping task");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping the sender disconnects the channel; workers drain the
        // queue and exit.
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Build the strategy an `EngineConfig` asks for.
pub fn from_config(config: &EngineConfig) -> Arc<dyn ExecutionStrategy> {
    match config.execution {
        ExecutionMode::Inline => Arc::new(InlineExecutor),
        ExecutionMode::WorkerPool => {
            Arc::new(WorkerPool::new(config.worker_threads, &config.service_name))
        }
    }
}
