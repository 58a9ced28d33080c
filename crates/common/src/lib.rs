//! Shared runtime utilities for the omnicache crates.
//!
//! # Feature Tiers
//!
//! - `runtime` (default): tokio-backed [`scheduler::RuntimeScheduler`] and
//!   the process-wide [`scheduler::shared`] scheduler
//! - `test-utils`: deterministic [`scheduler::ManualScheduler`] for tests
//!
//! The [`time`] and [`scheduler`] ports are always available.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod scheduler;
pub mod time;

pub use scheduler::{schedule_repeating, ScheduledTask, Scheduler, TaskHandle};
pub use time::{Clock, MockClock, SystemClock};
