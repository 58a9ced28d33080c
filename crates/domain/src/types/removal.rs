//! Removal notification taxonomy

use serde::{Deserialize, Serialize};

use crate::impl_domain_enum_conversions;

/// Reason an entry left a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalCause {
    /// Removed by the caller through `remove` or `clear`.
    Explicit,
    /// Overwritten by a `put` for the same key.
    Replaced,
    /// Expiry time elapsed.
    Expired,
    /// Evicted to keep the cache within its size bound.
    Size,
    /// Reclaimed by the backing store, e.g. under memory pressure.
    Collected,
    /// Engine-specific cause with no closer match.
    Other,
}

impl_domain_enum_conversions!(RemovalCause {
    Explicit => "explicit",
    Replaced => "replaced",
    Expired => "expired",
    Size => "size",
    Collected => "collected",
    Other => "other",
});

impl RemovalCause {
    /// Whether the cache removed the entry on its own initiative.
    ///
    /// `Other` counts as an eviction: every caller-initiated path maps to
    /// `Explicit` or `Replaced`.
    #[must_use]
    pub const fn is_eviction(self) -> bool {
        !matches!(self, Self::Explicit | Self::Replaced)
    }
}
