//! Adapter state machine and listener dispatch gate
//!
//! Every adapter owns one [`Lifecycle`]. Operations check it before touching
//! the engine, and every removal listener invocation is bracketed by
//! [`Lifecycle::begin_dispatch`] / [`Lifecycle::end_dispatch`] so that
//! [`Lifecycle::close`] can wait for running invocations and refuse new ones.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use omnicache_domain::{CacheError, CacheResult, ProviderId};
use parking_lot::{Condvar, Mutex};

use crate::cache_ports::AdapterState;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const UNINITIALIZED: u8 = 0;
const ACTIVE: u8 = 1;
const CLOSED: u8 = 2;

thread_local! {
    // Lifecycles with a listener invocation running on this thread, innermost last.
    static DISPATCHING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

const fn decode(state: u8) -> AdapterState {
    match state {
        UNINITIALIZED => AdapterState::Uninitialized,
        ACTIVE => AdapterState::Active,
        _ => AdapterState::Closed,
    }
}

/// Lifecycle shared by an adapter and the callbacks it hands to its engine.
///
/// Operations read the state without locking. State changes and the
/// in-flight count are serialized by the `in_flight` mutex.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    id: u64,
    provider: ProviderId,
    state: AtomicU8,
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl Lifecycle {
    pub(crate) fn new(provider: ProviderId) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            provider,
            state: AtomicU8::new(UNINITIALIZED),
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    pub(crate) const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub(crate) fn state(&self) -> AdapterState {
        decode(self.state.load(Ordering::Acquire))
    }

    /// `Uninitialized -> Active`. No effect in any other state.
    pub(crate) fn activate(&self) {
        let _guard = self.in_flight.lock();
        let _ = self.state.compare_exchange(UNINITIALIZED, ACTIVE, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn ensure_active(&self) -> CacheResult<()> {
        match self.state() {
            AdapterState::Active => Ok(()),
            AdapterState::Uninitialized | AdapterState::Closed => {
                Err(CacheError::ClosedCache(self.provider))
            }
        }
    }

    /// Whether a listener invocation for this lifecycle is running on the
    /// calling thread.
    pub(crate) fn is_dispatching_here(&self) -> bool {
        DISPATCHING.with(|stack| stack.borrow().contains(&self.id))
    }

    /// Register a listener invocation. Returns `false` once closed.
    pub(crate) fn begin_dispatch(&self) -> bool {
        {
            let mut in_flight = self.in_flight.lock();
            if self.state.load(Ordering::Acquire) == CLOSED {
                return false;
            }
            *in_flight += 1;
        }
        DISPATCHING.with(|stack| stack.borrow_mut().push(self.id));
        true
    }

    pub(crate) fn end_dispatch(&self) {
        DISPATCHING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|id| *id == self.id) {
                stack.remove(pos);
            }
        });
        let mut in_flight = self.in_flight.lock();
        *in_flight = in_flight.saturating_sub(1);
        self.idle.notify_all();
    }

    /// Move to `Closed` and wait for listener invocations on other threads to
    /// finish.
    ///
    /// Invocations running on the calling thread (a listener closing its own
    /// cache) are not waited for. Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        let own = DISPATCHING.with(|stack| stack.borrow().iter().filter(|id| **id == self.id).count());
        let mut in_flight = self.in_flight.lock();
        if self.state.swap(CLOSED, Ordering::AcqRel) == CLOSED {
            return false;
        }
        while *in_flight > own {
            self.idle.wait(&mut in_flight);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn active() -> Lifecycle {
        let lifecycle = Lifecycle::new(ProviderId::Lru);
        lifecycle.activate();
        lifecycle
    }

    #[test]
    fn test_state_transitions() {
        let lifecycle = Lifecycle::new(ProviderId::Moka);
        assert_eq!(lifecycle.state(), AdapterState::Uninitialized);
        assert!(lifecycle.ensure_active().is_err());

        lifecycle.activate();
        assert_eq!(lifecycle.state(), AdapterState::Active);
        assert!(lifecycle.ensure_active().is_ok());

        assert!(lifecycle.close());
        assert!(!lifecycle.close());
        lifecycle.activate();
        assert_eq!(lifecycle.state(), AdapterState::Closed);
        assert_eq!(lifecycle.ensure_active(), Err(CacheError::ClosedCache(ProviderId::Moka)));
    }

    #[test]
    fn test_dispatch_refused_after_close() {
        let lifecycle = active();
        assert!(lifecycle.begin_dispatch());
        lifecycle.end_dispatch();

        lifecycle.close();
        assert!(!lifecycle.begin_dispatch());
    }

    #[test]
    fn test_close_waits_for_dispatch_on_other_thread() {
        let lifecycle = Arc::new(active());
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (closed_tx, closed_rx) = mpsc::channel();

        let dispatcher = Arc::clone(&lifecycle);
        let worker = thread::spawn(move || {
            assert!(dispatcher.begin_dispatch());
            entered_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            dispatcher.end_dispatch();
        });
        entered_rx.recv().unwrap();

        let closer = Arc::clone(&lifecycle);
        let closing = thread::spawn(move || {
            closer.close();
            closed_tx.send(()).unwrap();
        });

        assert!(closed_rx.recv_timeout(Duration::from_millis(100)).is_err());
        release_tx.send(()).unwrap();
        closed_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        worker.join().unwrap();
        closing.join().unwrap();
    }

    #[test]
    fn test_close_from_inside_dispatch_does_not_deadlock() {
        let lifecycle = active();
        assert!(lifecycle.begin_dispatch());
        assert!(lifecycle.close());
        lifecycle.end_dispatch();
        assert_eq!(lifecycle.state(), AdapterState::Closed);
    }

    #[test]
    fn test_dispatching_is_tracked_per_thread() {
        let lifecycle = Arc::new(active());
        assert!(!lifecycle.is_dispatching_here());

        assert!(lifecycle.begin_dispatch());
        assert!(lifecycle.is_dispatching_here());
        let other = Arc::clone(&lifecycle);
        assert!(!thread::spawn(move || other.is_dispatching_here()).join().unwrap());
        lifecycle.end_dispatch();

        assert!(!lifecycle.is_dispatching_here());
        assert!(!Lifecycle::new(ProviderId::Moka).is_dispatching_here());
    }

    #[test]
    fn test_state_reads_do_not_wait_for_the_dispatch_lock() {
        let lifecycle = Arc::new(active());
        let guard = lifecycle.in_flight.lock();

        let (tx, rx) = mpsc::channel();
        let reader = Arc::clone(&lifecycle);
        let worker = thread::spawn(move || {
            tx.send((reader.state(), reader.ensure_active())).unwrap();
        });
        let read = rx.recv_timeout(Duration::from_secs(5));
        drop(guard);

        assert_eq!(read.unwrap(), (AdapterState::Active, Ok(())));
        worker.join().unwrap();
    }
}
