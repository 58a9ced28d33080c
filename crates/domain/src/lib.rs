//! # Omnicache Domain
//!
//! Value types shared by every layer of the cache facade.
//!
//! This crate contains:
//! - Provider identifiers, expiry types and removal causes
//! - The cache error taxonomy and Result definition
//! - Data-driven cache settings (TOML, JSON, environment)
//!
//! ## Architecture
//! - No dependencies on other omnicache crates
//! - Only external dependencies allowed
//! - Pure data structures, no engine code

pub mod config;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
