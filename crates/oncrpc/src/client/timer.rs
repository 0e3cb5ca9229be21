// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared background timer for per-call timeouts.
//!
//! One named thread serves every scheduled timeout of an engine instance.
//! Tasks are kept in a deadline-ordered heap; cancellation is lazy (a
//! cancelled id is skipped when it surfaces at the top of the heap), so
//! `TimeoutHandle::cancel` never has to dig through the queue.

use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

type TimerTask = Box<dyn FnOnce() + Send>;

struct Entry {
    deadline: Instant,
    id: u64,
    task: TimerTask,
}

// Heap order: earliest deadline first (BinaryHeap is a max-heap).
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entry {}

struct TimerState {
    queue: BinaryHeap<Entry>,
    cancelled: HashSet<u64>,
    next_id: u64,
    running: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    condvar: Condvar,
}

/// Handle to one scheduled timeout. Cancelling is idempotent and safe to
/// race with the timeout firing; at most one of the two takes effect.
pub struct TimeoutHandle {
    id: u64,
    shared: Arc<TimerShared>,
}

impl TimeoutHandle {
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        state.cancelled.insert(self.id);
    }
}

/// The shared timer thread. Dropping it stops the thread after draining
/// nothing further (pending tasks are discarded).
pub struct TimerThread {
    shared: Arc<TimerShared>,
    handle: Option<JoinHandle<()>>,
}

impl TimerThread {
    pub fn spawn(name: &str) -> Self {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                queue: BinaryHeap::new(),
                cancelled: HashSet::new(),
                next_id: 0,
                running: true,
            }),
            condvar: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        #[allow(clippy::expect_used)] // thread spawn failure is unrecoverable
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || Self::run_loop(&thread_shared))
            .expect("Failed to spawn timer thread");

        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Schedule `task` to run after `delay` unless cancelled first.
    pub fn schedule(&self, delay: Duration, task: TimerTask) -> TimeoutHandle {
        let deadline = Instant::now() + delay;
        let id;
        {
            let mut state = self.shared.state.lock();
            id = state.next_id;
            state.next_id += 1;
            state.queue.push(Entry { deadline, id, task });
        }
        self.condvar_notify();
        TimeoutHandle {
            id,
            shared: Arc::clone(&self.shared),
        }
    }

    fn condvar_notify(&self) {
        self.shared.condvar.notify_one();
    }

    fn run_loop(shared: &Arc<TimerShared>) {
        let mut state = shared.state.lock();
        loop {
            if !state.running {
                return;
            }
            let now = Instant::now();
            match state.queue.peek() {
                None => {
                    shared.condvar.wait(&mut state);
                }
                Some(entry) if entry.deadline > now => {
                    let deadline = entry.deadline;
                    shared.condvar.wait_until(&mut state, deadline);
                }
                Some(_) => {
                    let entry = state.queue.pop().expect("peeked entry present");
                    if state.cancelled.remove(&entry.id) {
                        continue;
                    }
                    // Run the task without the lock; it must stay cheap
                    // (the correlation engine only attempts a take()).
                    drop(state);
                    (entry.task)();
                    state = shared.state.lock();
                }
            }
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.running = false;
        }
        self.shared.condvar.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
