//! Cache settings loaded from data
//!
//! Everything a cache specification needs except the removal listener and
//! the scheduler can be expressed as data. [`CacheSettings`] carries those
//! values from configuration files or the environment to the specification
//! builder, which validates them like any other input.
//!
//! ## Environment Variables
//! - `OMNICACHE_PROVIDER`: `moka`, `lru` or `dashmap`
//! - `OMNICACHE_MAX_SIZE`: maximum number of entries
//! - `OMNICACHE_EXPIRY_TYPE`: `none`, `post_write` or `post_access`
//! - `OMNICACHE_EXPIRY_TIME_MS`: expiry time in milliseconds
//! - `OMNICACHE_HIGH_CONTENTION`: `true`/`false` (also `1`/`0`, `yes`/`no`)
//!
//! ## File Formats
//! JSON and TOML, detected by file extension. Field names match the struct:
//!
//! ```toml
//! provider = "moka"
//! max_size = 10000
//! expiry_type = "post_access"
//! expiry_time_ms = 300000
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{CacheError, CacheResult};
use crate::types::{ExpiryType, ProviderId};

/// Prefix shared by every environment variable read by
/// [`CacheSettings::from_env`].
pub const ENV_PREFIX: &str = "OMNICACHE_";

/// Data-expressible cache options. Unset fields leave the builder untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Explicit provider; unset means auto-resolve.
    pub provider: Option<ProviderId>,
    /// Maximum number of entries.
    pub max_size: Option<u64>,
    /// Expiry clock reset policy.
    pub expiry_type: Option<ExpiryType>,
    /// Expiry time in milliseconds.
    pub expiry_time_ms: Option<u64>,
    /// Concurrency tuning hint.
    pub high_contention: Option<bool>,
}

impl CacheSettings {
    /// Expiry time as a [`Duration`].
    #[must_use]
    pub fn expiry_time(&self) -> Option<Duration> {
        self.expiry_time_ms.map(Duration::from_millis)
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            provider: other.provider.or(self.provider),
            max_size: other.max_size.or(self.max_size),
            expiry_type: other.expiry_type.or(self.expiry_type),
            expiry_time_ms: other.expiry_time_ms.or(self.expiry_time_ms),
            high_contention: other.high_contention.or(self.high_contention),
        }
    }

    /// Parse TOML settings.
    ///
    /// # Errors
    /// Returns `CacheError::Config` on malformed input or unknown fields.
    pub fn from_toml_str(contents: &str) -> CacheResult<Self> {
        toml::from_str(contents).map_err(|e| CacheError::Config(format!("Invalid TOML format: {e}")))
    }

    /// Parse JSON settings.
    ///
    /// # Errors
    /// Returns `CacheError::Config` on malformed input or unknown fields.
    pub fn from_json_str(contents: &str) -> CacheResult<Self> {
        serde_json::from_str(contents)
            .map_err(|e| CacheError::Config(format!("Invalid JSON format: {e}")))
    }

    /// Load settings from a `.toml` or `.json` file.
    ///
    /// # Errors
    /// Returns `CacheError::Config` if the file is missing, unreadable, has
    /// an unsupported extension or fails to parse.
    pub fn from_file(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CacheError::Config(format!("Settings file not found: {}", path.display())));
        }

        tracing::info!(path = %path.display(), "Loading cache settings from file");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| CacheError::Config(format!("Failed to read settings file: {e}")))?;

        match path.extension().and_then(|e| e.to_str()).unwrap_or_default() {
            "toml" => Self::from_toml_str(&contents),
            "json" => Self::from_json_str(&contents),
            other => Err(CacheError::Config(format!("Unsupported settings format: '{other}'"))),
        }
    }

    /// Read settings from `OMNICACHE_*` environment variables.
    ///
    /// Missing variables leave the field unset.
    ///
    /// # Errors
    /// Returns `CacheError::Config` when a variable is present but malformed.
    pub fn from_env() -> CacheResult<Self> {
        let settings = Self::from_lookup(|name| std::env::var(name).ok())?;
        if !settings.is_empty() {
            tracing::debug!(settings = ?settings, "Cache settings loaded from environment variables");
        }
        Ok(settings)
    }

    /// Read settings through an arbitrary variable lookup.
    ///
    /// `lookup` receives full variable names such as `OMNICACHE_MAX_SIZE`.
    ///
    /// # Errors
    /// Returns `CacheError::Config` when a value is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|value| (name, value))
        };

        Ok(Self {
            provider: read("PROVIDER").map(|(n, v)| parse_var::<ProviderId>(&n, &v)).transpose()?,
            max_size: read("MAX_SIZE").map(|(n, v)| parse_var::<u64>(&n, &v)).transpose()?,
            expiry_type: read("EXPIRY_TYPE")
                .map(|(n, v)| parse_var::<ExpiryType>(&n, &v))
                .transpose()?,
            expiry_time_ms: read("EXPIRY_TIME_MS")
                .map(|(n, v)| parse_var::<u64>(&n, &v))
                .transpose()?,
            high_contention: read("HIGH_CONTENTION").map(|(n, v)| parse_bool(&n, &v)).transpose()?,
        })
    }
}

fn parse_var<T>(name: &str, value: &str) -> CacheResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| CacheError::Config(format!("Invalid {name}: {e}")))
}

fn parse_bool(name: &str, value: &str) -> CacheResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(CacheError::Config(format!("Invalid {name}: expected a boolean, got '{other}'"))),
    }
}
