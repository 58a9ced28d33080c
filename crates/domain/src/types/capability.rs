//! Capabilities a provider may be asked to honour

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ExpiryType;

/// Semantic feature requested by a cache specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Upper bound on live entries.
    SizeBound,
    /// Expiry that restarts on write only.
    PostWriteExpiry,
    /// Expiry that restarts on read and write.
    PostAccessExpiry,
}

impl Capability {
    /// Capability needed to honour an expiry type, if any.
    #[must_use]
    pub const fn for_expiry(expiry: ExpiryType) -> Option<Self> {
        match expiry {
            ExpiryType::None => None,
            ExpiryType::PostWrite => Some(Self::PostWriteExpiry),
            ExpiryType::PostAccess => Some(Self::PostAccessExpiry),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SizeBound => "a maximum size",
            Self::PostWriteExpiry => "post-write expiry",
            Self::PostAccessExpiry => "post-access expiry",
        })
    }
}
