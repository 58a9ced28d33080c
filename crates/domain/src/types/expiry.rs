//! Expiry policy

use serde::{Deserialize, Serialize};

use crate::impl_domain_enum_conversions;

/// Governs which operations restart an entry's expiry clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryType {
    /// Entries never expire.
    #[default]
    None,
    /// The clock restarts on `put` only.
    PostWrite,
    /// The clock restarts on `put` and on every successful `get`.
    PostAccess,
}

impl_domain_enum_conversions!(ExpiryType {
    None => "none",
    PostWrite => "post_write",
    PostAccess => "post_access",
});

impl ExpiryType {
    /// Whether entries expire at all.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether a read restarts the expiry clock.
    #[must_use]
    pub const fn resets_on_read(self) -> bool {
        matches!(self, Self::PostAccess)
    }
}
