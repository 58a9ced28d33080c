//! Macro for implementing Display and FromStr for identifier enums
//!
//! Provider identifiers, expiry types and removal causes all travel through
//! configuration files and environment variables as lowercase strings. This
//! macro keeps their textual forms in one table per enum.
//!
//! # Example
//!
//! ```rust
//! use omnicache_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Tier {
//!     Hot,
//!     ColdStorage,
//! }
//!
//! impl_domain_enum_conversions!(Tier {
//!     Hot => "hot",
//!     ColdStorage => "cold_storage",
//! });
//!
//! assert_eq!("COLD-STORAGE".parse::<Tier>().unwrap(), Tier::ColdStorage);
//! ```

/// Implements Display, FromStr and `as_str` for identifier enums
///
/// This macro generates:
/// - `as_str`: the canonical lowercase form
/// - Display trait: writes the canonical form
/// - FromStr trait: case-insensitive parsing that also accepts `-` in place
///   of `_`
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their canonical string
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical lowercase name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().replace('-', "_").as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
