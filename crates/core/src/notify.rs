//! Removal listener dispatch

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use omnicache_domain::RemovalCause;
use tracing::warn;

use crate::cache_ports::RemovalListener;
use crate::lifecycle::Lifecycle;

/// Delivers removal events to the configured listener.
///
/// Invocations are skipped once the owning lifecycle is closed, and a
/// panicking listener is contained to the single invocation.
pub(crate) struct RemovalNotifier<K, V> {
    listener: Option<Arc<dyn RemovalListener<K, V>>>,
    lifecycle: Arc<Lifecycle>,
}

impl<K, V> RemovalNotifier<K, V> {
    pub(crate) fn new(
        listener: Option<Arc<dyn RemovalListener<K, V>>>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self { listener, lifecycle }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.listener.is_some()
    }

    pub(crate) fn notify(&self, key: &K, value: &V, cause: RemovalCause) {
        let Some(listener) = &self.listener else {
            return;
        };
        if !self.lifecycle.begin_dispatch() {
            return;
        }
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| listener.on_removal(key, value, cause)));
        self.lifecycle.end_dispatch();

        if let Err(payload) = outcome {
            warn!(
                provider = %self.lifecycle.provider(),
                cause = %cause,
                panic = panic_message(payload.as_ref()),
                "removal listener panicked; entry was removed anyway"
            );
        }
    }
}

impl<K, V> Clone for RemovalNotifier<K, V> {
    fn clone(&self) -> Self {
        Self { listener: self.listener.clone(), lifecycle: Arc::clone(&self.lifecycle) }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
