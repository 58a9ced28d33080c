//! Backing engine identifiers

use serde::{Deserialize, Serialize};

use crate::impl_domain_enum_conversions;

/// Selectable backing cache engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Concurrent cache from the `moka` crate. Native size bound, both
    /// expiry flavors and a native removal-cause vocabulary.
    Moka,
    /// Single-lock LRU map from the `lru` crate. Native size bound only.
    Lru,
    /// Sharded map from the `dashmap` crate. No size bound; expiry is
    /// driven by a scheduler.
    DashMap,
}

impl_domain_enum_conversions!(ProviderId {
    Moka => "moka",
    Lru => "lru",
    DashMap => "dashmap",
});

impl ProviderId {
    /// Order in which providers are probed when none is requested.
    pub const RESOLUTION_ORDER: [Self; 3] = [Self::Moka, Self::Lru, Self::DashMap];

    /// Position in [`ProviderId::RESOLUTION_ORDER`]; lower wins.
    #[must_use]
    pub const fn priority(self) -> usize {
        match self {
            Self::Moka => 0,
            Self::Lru => 1,
            Self::DashMap => 2,
        }
    }
}
