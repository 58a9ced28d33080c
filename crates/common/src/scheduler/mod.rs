//! Deferred task execution
//!
//! Adapters that emulate time-driven eviction hand closures to a
//! [`Scheduler`]. Two implementations ship with the crate:
//!
//! - [`RuntimeScheduler`]: tokio-backed, either owning a dedicated runtime or
//!   borrowing a caller's runtime handle.
//! - `ManualScheduler` (feature `test-utils`): runs tasks only when a test
//!   advances its [`MockClock`](crate::time::MockClock).
//!
//! A process-wide default is available through [`shared`].
//!
//! # Examples
//!
//! ```
//! # #[cfg(feature = "runtime")]
//! # {
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use omnicache_common::scheduler::{RuntimeScheduler, Scheduler};
//!
//! let scheduler = RuntimeScheduler::new("doc-scheduler").unwrap();
//! let fired = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&fired);
//! let handle = scheduler.schedule(
//!     Duration::from_secs(60),
//!     Box::new(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     }),
//! );
//! handle.cancel();
//! scheduler.shutdown();
//! assert_eq!(fired.load(Ordering::SeqCst), 0);
//! # }
//! ```

#[cfg(any(feature = "test-utils", test))]
mod manual;
#[cfg(feature = "runtime")]
mod runtime;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(any(feature = "test-utils", test))]
pub use manual::ManualScheduler;
#[cfg(feature = "runtime")]
pub use runtime::{shared, RuntimeScheduler};

/// Work item accepted by a [`Scheduler`].
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Executes tasks after a delay.
///
/// Implementations must never run a task whose [`TaskHandle`] was cancelled
/// before the task started, and must stop accepting work after
/// [`Scheduler::shutdown`].
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Clock used to compute deadlines for tasks handed to this scheduler.
    fn now(&self) -> Instant;

    /// Run `task` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TaskHandle;

    /// Stop the scheduler. Pending tasks are dropped without running.
    fn shutdown(&self);

    /// Whether [`Scheduler::shutdown`] has been called.
    fn is_shutdown(&self) -> bool;
}

/// Cancellation handle for a scheduled task.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Create a live handle.
    #[must_use]
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Create a handle that is already cancelled.
    ///
    /// Returned by schedulers that refuse work after shutdown.
    #[must_use]
    pub fn cancelled() -> Self {
        let handle = Self::new();
        handle.cancel();
        handle
    }

    /// Cancel the task. Has no effect once the task has started.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if the task has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Run `task` every `period` until it returns `false` or the returned handle
/// is cancelled.
///
/// Each run is scheduled only after the previous one finishes, so runs never
/// overlap.
pub fn schedule_repeating<F>(scheduler: Arc<dyn Scheduler>, period: Duration, task: F) -> TaskHandle
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let handle = TaskHandle::new();
    arm(scheduler, period, Arc::new(task), handle.clone());
    handle
}

fn arm(
    scheduler: Arc<dyn Scheduler>,
    period: Duration,
    task: Arc<dyn Fn() -> bool + Send + Sync>,
    chain: TaskHandle,
) {
    if chain.is_cancelled() || scheduler.is_shutdown() {
        return;
    }
    let next = Arc::clone(&scheduler);
    let _ = scheduler.schedule(
        period,
        Box::new(move || {
            if chain.is_cancelled() {
                return;
            }
            if task() {
                arm(next, period, task, chain);
            }
        }),
    );
}

#[cfg(test)]
mod tests {
    //! Unit tests for scheduler.
    use std::sync::atomic::AtomicUsize;

    use super::*;

    /// Validates `TaskHandle::cancel` behavior across clones.
    ///
    /// Assertions:
    /// - Ensures a clone observes cancellation made through the original.
    #[test]
    fn test_task_handle_clones_share_cancellation() {
        let handle = TaskHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());

        handle.cancel();
        assert!(clone.is_cancelled());
        assert!(TaskHandle::cancelled().is_cancelled());
    }

    /// Validates `schedule_repeating` behavior for the stop-by-return
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the task runs once per period until it returns `false`.
    #[test]
    fn test_schedule_repeating_stops_when_task_returns_false() {
        let scheduler = Arc::new(ManualScheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let _handle =
            schedule_repeating(scheduler.clone(), Duration::from_secs(1), move || {
                counter.fetch_add(1, Ordering::SeqCst) < 2
            });

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    /// Validates `schedule_repeating` behavior for the cancel scenario.
    ///
    /// Assertions:
    /// - Confirms no run happens after the chain handle is cancelled.
    #[test]
    fn test_schedule_repeating_cancel_stops_chain() {
        let scheduler = Arc::new(ManualScheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let handle = schedule_repeating(scheduler.clone(), Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        scheduler.advance(Duration::from_secs(2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        handle.cancel();
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
