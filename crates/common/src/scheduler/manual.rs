//! Deterministic scheduler for tests

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{ScheduledTask, Scheduler, TaskHandle};
use crate::time::{Clock, MockClock};

/// Scheduler that only runs tasks when the test moves time forward.
///
/// Tasks run on the thread that calls [`ManualScheduler::advance`], in
/// deadline order (ties in submission order). The internal queue lock is
/// released while a task runs, so tasks may schedule further work.
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "test-utils")]
/// # {
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use omnicache_common::scheduler::{ManualScheduler, Scheduler};
///
/// let scheduler = ManualScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
/// scheduler.schedule(Duration::from_secs(5), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// scheduler.advance(Duration::from_secs(4));
/// assert!(!fired.load(Ordering::SeqCst));
/// scheduler.advance(Duration::from_secs(1));
/// assert!(fired.load(Ordering::SeqCst));
/// # }
/// ```
pub struct ManualScheduler {
    clock: MockClock,
    queue: Mutex<Queue>,
    shutdown: AtomicBool,
}

#[derive(Default)]
struct Queue {
    next_seq: u64,
    pending: BinaryHeap<Pending>,
}

struct Pending {
    due: Instant,
    seq: u64,
    handle: TaskHandle,
    task: ScheduledTask,
}

// Min-heap on (due, seq).
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl ManualScheduler {
    /// Create a scheduler with its own clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(MockClock::new())
    }

    /// Create a scheduler driven by an existing clock.
    #[must_use]
    pub fn with_clock(clock: MockClock) -> Self {
        Self { clock, queue: Mutex::new(Queue::default()), shutdown: AtomicBool::new(false) }
    }

    /// The clock backing this scheduler.
    #[must_use]
    pub fn clock(&self) -> &MockClock {
        &self.clock
    }

    /// Move time forward by `duration`, running every task that becomes due.
    ///
    /// Returns the number of tasks executed.
    ///
    /// A `duration` that moves past the representable range runs every queued
    /// task and leaves the clock at the last deadline.
    pub fn advance(&self, duration: Duration) -> usize {
        let target = self.clock.now().checked_add(duration);
        let mut executed = 0;
        while let Some(next) = self.pop_due(target) {
            self.clock.advance_to(next.due);
            if !next.handle.is_cancelled() {
                (next.task)();
                executed += 1;
            }
        }
        if let Some(target) = target {
            self.clock.advance_to(target);
        }
        executed
    }

    /// Run every task already due at the current instant.
    pub fn run_pending(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// Number of queued tasks, cancelled ones included.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().pending.len()
    }

    fn pop_due(&self, target: Option<Instant>) -> Option<Pending> {
        if self.is_shutdown() {
            return None;
        }
        let mut queue = self.queue.lock();
        if queue.pending.peek().is_some_and(|next| target.map_or(true, |target| next.due <= target)) {
            queue.pending.pop()
        } else {
            None
        }
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("elapsed", &self.clock.elapsed())
            .field("pending", &self.pending())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.clock.now()
    }

    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TaskHandle {
        if self.is_shutdown() {
            return TaskHandle::cancelled();
        }
        let handle = TaskHandle::new();
        // Unrepresentable deadlines never come due.
        let Some(due) = self.clock.now().checked_add(delay) else {
            return handle;
        };
        let mut queue = self.queue.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.pending.push(Pending { due, seq, handle: handle.clone(), task });
        handle
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let drained = std::mem::take(&mut self.queue.lock().pending);
        drop(drained);
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
