//! Tokio-backed scheduler

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, warn};

use super::{ScheduledTask, Scheduler, TaskHandle};

/// Upper bound on how long an owned runtime is given to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

static SHARED: OnceCell<Arc<RuntimeScheduler>> = OnceCell::new();

/// Process-wide default scheduler.
///
/// Created on first call with a single dedicated worker thread. It is never
/// shut down by cache adapters ([`Scheduler::shutdown`] is ignored) and is
/// torn down when the process exits.
///
/// # Errors
///
/// Returns the I/O error raised by tokio if the runtime cannot be built on
/// the first call. Later calls retry.
pub fn shared() -> io::Result<Arc<RuntimeScheduler>> {
    SHARED
        .get_or_try_init(|| {
            let mut scheduler = RuntimeScheduler::new("omnicache-shared")?;
            scheduler.process_wide = true;
            Ok(Arc::new(scheduler))
        })
        .cloned()
}

/// Scheduler that runs tasks on a tokio runtime.
///
/// A scheduler built with [`RuntimeScheduler::new`] owns its runtime and
/// stops it on [`Scheduler::shutdown`] or drop. One built with
/// [`RuntimeScheduler::from_handle`] borrows the caller's runtime: shutting it
/// down only stops it from running further tasks, the runtime keeps going.
pub struct RuntimeScheduler {
    name: String,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    shutdown: Arc<AtomicBool>,
    process_wide: bool,
}

impl RuntimeScheduler {
    /// Start a dedicated single-worker runtime.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised by tokio when the runtime cannot start.
    pub fn new(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(name.clone())
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();
        debug!(scheduler = %name, "started dedicated scheduler runtime");

        Ok(Self {
            name,
            handle,
            runtime: Mutex::new(Some(runtime)),
            shutdown: Arc::new(AtomicBool::new(false)),
            process_wide: false,
        })
    }

    /// Schedule onto an existing runtime owned by the caller.
    ///
    /// The runtime must have its time driver enabled.
    pub fn from_handle(name: impl Into<String>, handle: Handle) -> Self {
        Self {
            name: name.into(),
            handle,
            runtime: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
            process_wide: false,
        }
    }

    /// Scheduler name, used as the worker thread name for owned runtimes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this scheduler owns the runtime it runs on.
    #[must_use]
    pub fn owns_runtime(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// Whether this is the instance returned by [`shared`].
    #[must_use]
    pub fn is_process_wide(&self) -> bool {
        self.process_wide
    }

    fn stop_runtime(&self) {
        let Some(runtime) = self.runtime.lock().take() else {
            return;
        };
        // Blocking shutdown panics inside an async context.
        if Handle::try_current().is_ok() {
            runtime.shutdown_background();
        } else {
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }
        debug!(scheduler = %self.name, "stopped dedicated scheduler runtime");
    }
}

impl fmt::Debug for RuntimeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeScheduler")
            .field("name", &self.name)
            .field("owns_runtime", &self.owns_runtime())
            .field("process_wide", &self.process_wide)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Scheduler for RuntimeScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule(&self, delay: Duration, task: ScheduledTask) -> TaskHandle {
        if self.is_shutdown() {
            return TaskHandle::cancelled();
        }
        let handle = TaskHandle::new();
        let guard = handle.clone();
        let stopped = Arc::clone(&self.shutdown);
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if guard.is_cancelled() || stopped.load(Ordering::SeqCst) {
                return;
            }
            task();
        });
        handle
    }

    fn shutdown(&self) {
        if self.process_wide {
            warn!(scheduler = %self.name, "ignoring shutdown request for process-wide scheduler");
            return;
        }
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_runtime();
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Drop for RuntimeScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.stop_runtime();
    }
}
