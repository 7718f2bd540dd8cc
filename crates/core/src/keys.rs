//! Typed wrappers around catalog identifiers.
//!
//! The catalog hands out opaque strings for series, seasons and episodes.
//! Each kind gets its own newtype so a season id can never be passed where a
//! series id is expected. Keys are never minted locally; they only come back
//! from the catalog client or the local store.

use std::fmt;
use std::hash::Hash;

/// Common behaviour of every catalog identifier.
pub trait CatalogKey:
    Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Kind label used in log fields and table lookups.
    const KIND: &'static str;

    fn from_catalog(raw: impl Into<String>) -> Self;

    fn as_str(&self) -> &str;
}

macro_rules! catalog_key {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl CatalogKey for $name {
            const KIND: &'static str = $kind;

            fn from_catalog(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

catalog_key!(
    /// Identifier of a series in the remote catalog.
    SeriesId,
    "series"
);
catalog_key!(
    /// Identifier of one season record. Several records may share a number.
    SeasonId,
    "season"
);
catalog_key!(EpisodeId, "episode");
