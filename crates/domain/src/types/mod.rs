//! Value types describing cache behavior

pub mod capability;
pub mod expiry;
pub mod provider;
pub mod removal;

pub use capability::Capability;
pub use expiry::ExpiryType;
pub use provider::ProviderId;
pub use removal::RemovalCause;
