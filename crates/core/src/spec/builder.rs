//! Fluent construction of [`CacheSpec`] values

use std::sync::Arc;
use std::time::Duration;

use omnicache_common::Scheduler;
use omnicache_domain::{CacheError, CacheResult, CacheSettings, ExpiryType, ProviderId};

use super::CacheSpec;
use crate::cache_ports::RemovalListener;

/// Longest accepted expiry time: 100 years.
///
/// Every provider can represent deadlines up to this bound.
pub const MAX_EXPIRY_TIME: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Accumulates options for a [`CacheSpec`].
///
/// Each setter validates its own argument and returns the builder for
/// chaining. [`CacheSpecBuilder::build`] checks cross-field rules and
/// finalizes the builder: any later call fails with
/// [`CacheError::BuilderFinalized`].
///
/// The builder is meant for one scoped configuration block and is not
/// synchronized.
pub struct CacheSpecBuilder<K, V> {
    provider: Option<ProviderId>,
    max_size: Option<u64>,
    expiry_type: Option<ExpiryType>,
    expiry_time: Option<Duration>,
    removal_listener: Option<Arc<dyn RemovalListener<K, V>>>,
    executor: Option<Arc<dyn Scheduler>>,
    high_contention: bool,
    finalized: bool,
}

impl<K, V> CacheSpecBuilder<K, V> {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            provider: None,
            max_size: None,
            expiry_type: None,
            expiry_time: None,
            removal_listener: None,
            executor: None,
            high_contention: false,
            finalized: false,
        }
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.finalized {
            Err(CacheError::BuilderFinalized)
        } else {
            Ok(())
        }
    }

    /// Force a specific backing engine.
    ///
    /// # Errors
    /// `BuilderFinalized` after `build()`.
    pub fn provider(&mut self, provider: ProviderId) -> CacheResult<&mut Self> {
        self.ensure_open()?;
        self.provider = Some(provider);
        Ok(self)
    }

    /// Bound the number of live entries. Zero yields a cache that never
    /// retains anything.
    ///
    /// # Errors
    /// `BuilderFinalized` after `build()`.
    pub fn max_size(&mut self, max_size: u64) -> CacheResult<&mut Self> {
        self.ensure_open()?;
        self.max_size = Some(max_size);
        Ok(self)
    }

    /// Choose which operations restart the expiry clock.
    ///
    /// # Errors
    /// `BuilderFinalized` after `build()`.
    pub fn expiry_type(&mut self, expiry_type: ExpiryType) -> CacheResult<&mut Self> {
        self.ensure_open()?;
        self.expiry_type = Some(expiry_type);
        Ok(self)
    }

    /// Time an entry lives once its expiry clock starts.
    ///
    /// # Errors
    /// `InvalidSpecification` for a zero duration or one above
    /// [`MAX_EXPIRY_TIME`], `BuilderFinalized` after `build()`.
    pub fn expiry_time(&mut self, expiry_time: Duration) -> CacheResult<&mut Self> {
        self.ensure_open()?;
        if expiry_time.is_zero() {
            return Err(CacheError::InvalidSpecification(
                "expiry time must be a positive duration".to_string(),
            ));
        }
        if expiry_time > MAX_EXPIRY_TIME {
            return Err(CacheError::InvalidSpecification(format!(
                "expiry time {expiry_time:?} exceeds the maximum of {MAX_EXPIRY_TIME:?}"
            )));
        }
        self.expiry_time = Some(expiry_time);
        Ok(self)
    }

    /// Listener invoked once for every removal.
    ///
    /// # Errors
    /// `BuilderFinalized` after `build()`.
    pub fn removal_listener<L>(&mut self, listener: L) -> CacheResult<&mut Self>
    where
        L: RemovalListener<K, V> + 'static,
    {
        self.shared_removal_listener(Arc::new(listener))
    }

    /// Listener already shared elsewhere. Specifications built with the same
    /// `Arc` compare equal.
    ///
    /// # Errors
    /// `BuilderFinalized` after `build()`.
    pub fn shared_removal_listener(
        &mut self,
        listener: Arc<dyn RemovalListener<K, V>>,
    ) -> CacheResult<&mut Self> {
        self.ensure_open()?;
        self.removal_listener = Some(listener);
        Ok(self)
    }

    /// Scheduler for time-driven eviction. The caller keeps ownership: no
    /// cache ever shuts it down.
    ///
    /// # Errors
    /// `BuilderFinalized` after `build()`.
    pub fn executor(&mut self, executor: Arc<dyn Scheduler>) -> CacheResult<&mut Self> {
        self.ensure_open()?;
        self.executor = Some(executor);
        Ok(self)
    }

    /// Request internals tuned for concurrent writers. Advisory.
    ///
    /// # Errors
    /// `BuilderFinalized` after `build()`.
    pub fn high_contention(&mut self, enabled: bool) -> CacheResult<&mut Self> {
        self.ensure_open()?;
        self.high_contention = enabled;
        Ok(self)
    }

    /// Apply every field set in `settings` through the regular setters.
    ///
    /// # Errors
    /// Whatever the individual setters return.
    pub fn apply_settings(&mut self, settings: &CacheSettings) -> CacheResult<&mut Self> {
        self.ensure_open()?;
        if let Some(provider) = settings.provider {
            self.provider(provider)?;
        }
        if let Some(max_size) = settings.max_size {
            self.max_size(max_size)?;
        }
        if let Some(expiry_type) = settings.expiry_type {
            self.expiry_type(expiry_type)?;
        }
        if let Some(expiry_time) = settings.expiry_time() {
            self.expiry_time(expiry_time)?;
        }
        if let Some(high_contention) = settings.high_contention {
            self.high_contention(high_contention)?;
        }
        Ok(self)
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    /// - `InvalidSpecification` when an expiry time is set without an
    ///   enabled expiry type, or an enabled expiry type has no time
    /// - `BuilderFinalized` when called a second time
    pub fn build(&mut self) -> CacheResult<CacheSpec<K, V>> {
        self.ensure_open()?;
        let expiry_type = self.expiry_type.unwrap_or_default();
        match (expiry_type.is_enabled(), self.expiry_time) {
            (false, Some(expiry_time)) => {
                return Err(CacheError::InvalidSpecification(format!(
                    "expiry time {expiry_time:?} requires expiry type post_write or post_access, got {expiry_type}"
                )));
            }
            (true, None) => {
                return Err(CacheError::InvalidSpecification(format!(
                    "expiry type {expiry_type} requires an expiry time"
                )));
            }
            _ => {}
        }
        self.finalized = true;

        Ok(CacheSpec {
            provider: self.provider,
            max_size: self.max_size,
            expiry_type,
            expiry_time: self.expiry_time,
            removal_listener: self.removal_listener.take(),
            executor: self.executor.take(),
            high_contention: self.high_contention,
        })
    }
}

impl<K, V> Default for CacheSpecBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
