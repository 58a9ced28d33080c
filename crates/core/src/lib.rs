//! # Omnicache Core
//!
//! Provider-agnostic cache facade.
//!
//! Callers describe the cache they want through a [`CacheSpecBuilder`];
//! [`create`] validates the description, resolves a backing engine and
//! returns a [`CacheHandle`] implementing the uniform [`Cache`] contract.
//! Every engine adapter either reproduces the requested semantics exactly
//! or refuses at construction with `UnsupportedCapability`.
//!
//! This crate contains:
//! - The specification value and its builder
//! - The adapter contract and removal listener port
//! - The provider registry and resolver
//! - Engine adapters (`moka`, `lru`, `dashmap` features)
//!
//! ## Architecture Principles
//! - Depends on `omnicache-common` for time and scheduling, and on
//!   `omnicache-domain` for value types and errors
//! - Native engine objects never leave their adapter
//! - Removal listeners run outside engine locks

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod cache_ports;
pub mod registry;
pub mod spec;

mod lifecycle;
mod notify;
mod providers;

pub use api::{create, create_from_spec, create_with, CacheHandle};
pub use cache_ports::{AdapterState, Cache, CacheKey, CacheValue, RemovalListener};
// Re-export the value types callers need to configure a cache
pub use omnicache_common::scheduler::{Scheduler, TaskHandle};
pub use omnicache_domain::{
    CacheError, CacheResult, CacheSettings, Capability, ExpiryType, ProviderId, RemovalCause,
};
pub use registry::{AdapterFactory, AvailabilityProbe, ProviderEntry, ProviderRegistry};
pub use spec::{CacheSpec, CacheSpecBuilder, MAX_EXPIRY_TIME};
