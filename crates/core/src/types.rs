use serde::{Deserialize, Serialize};

use crate::error::FailureReason;
use crate::keys::{CatalogKey, EpisodeId, SeasonId, SeriesId};

/// One parent → children hop in the catalog hierarchy.
pub trait Level: Send + Sync + 'static {
    type Parent: CatalogKey;
    type Child: CatalogKey;

    /// Label used in log fields.
    const NAME: &'static str;
}

/// Seasons listed under a series.
#[derive(Debug)]
pub enum Seasons {}

impl Level for Seasons {
    type Parent = SeriesId;
    type Child = SeasonId;
    const NAME: &'static str = "seasons";
}

/// Episodes listed under a season.
#[derive(Debug)]
pub enum Episodes {}

impl Level for Episodes {
    type Parent = SeasonId;
    type Child = EpisodeId;
    const NAME: &'static str = "episodes";
}

/// A child entity as reported by the catalog and as kept in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildDescriptor<K> {
    pub key: K,
    /// Catalog-native ordinal ("9" for a season, "700" or "12.5" for an episode).
    pub ordinal: Option<String>,
    pub title: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl<K> ChildDescriptor<K> {
    pub fn new(key: K, ordinal: Option<&str>, title: impl Into<String>) -> Self {
        Self {
            key,
            ordinal: ordinal.map(str::to_string),
            title: title.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Catalog ordinals are matched as text; numeric input is rendered without padding.
pub fn ordinal_token(ordinal: u32) -> String {
    ordinal.to_string()
}

/// Input to the identifier resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionQuery<P> {
    pub parent: P,
    pub candidate_name: String,
    pub candidate_ordinal: Option<u32>,
    pub language: String,
    /// 1-based position among catalog entries sharing `candidate_ordinal`.
    pub duplicate_ordinal: Option<u32>,
}

impl<P> ResolutionQuery<P> {
    pub fn new(parent: P, candidate_name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            parent,
            candidate_name: candidate_name.into(),
            candidate_ordinal: None,
            language: language.into(),
            duplicate_ordinal: None,
        }
    }

    pub fn with_ordinal(mut self, ordinal: Option<u32>) -> Self {
        self.candidate_ordinal = ordinal;
        self
    }

    pub fn with_duplicate(mut self, duplicate: Option<u32>) -> Self {
        self.duplicate_ordinal = duplicate;
        self
    }
}

/// How a resolution was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    ExactOrdinalMatch,
    NameSubstringMatch,
    NoMatch,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactOrdinalMatch => "exact_ordinal_match",
            Self::NameSubstringMatch => "name_substring_match",
            Self::NoMatch => "no_match",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the identifier resolver. `NoMatch` is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult<K> {
    pub matched: Option<K>,
    pub confidence: Confidence,
}

impl<K> ResolutionResult<K> {
    pub fn exact(key: K) -> Self {
        Self {
            matched: Some(key),
            confidence: Confidence::ExactOrdinalMatch,
        }
    }

    pub fn by_name(key: K) -> Self {
        Self {
            matched: Some(key),
            confidence: Confidence::NameSubstringMatch,
        }
    }

    pub fn no_match() -> Self {
        Self {
            matched: None,
            confidence: Confidence::NoMatch,
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }

    pub fn into_key(self) -> Option<K> {
        self.matched
    }
}

/// What a merge changed in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub fetched: usize,
    pub inserted: usize,
}

/// Result of `ensure_fresh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    Ok(MergeSummary),
    /// Data for the key was already present.
    Skipped,
    Failed(FailureReason),
    Cancelled,
}

impl ScrapeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok(_) => "ok",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// True when the store holds data for the key afterwards.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Ok(_) | Self::Skipped)
    }
}

impl std::fmt::Display for ScrapeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of `ensure_cached`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    Ok,
    Failed(FailureReason),
    Cancelled,
}

impl AssetOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AssetOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Where a remote asset lives locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRecord {
    pub source_uri: String,
    pub local_blob_id: String,
    pub exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_carries_no_key() {
        let r: ResolutionResult<SeasonId> = ResolutionResult::no_match();
        assert!(!r.is_match());
        assert_eq!(r.confidence, Confidence::NoMatch);
        assert_eq!(r.into_key(), None);
    }

    #[test]
    fn outcome_freshness() {
        assert!(ScrapeOutcome::Skipped.is_fresh());
        assert!(ScrapeOutcome::Ok(MergeSummary::default()).is_fresh());
        assert!(!ScrapeOutcome::Cancelled.is_fresh());
        assert!(!ScrapeOutcome::Failed(FailureReason::Abandoned).is_fresh());
        assert_eq!(
            ScrapeOutcome::Failed(FailureReason::Abandoned).to_string(),
            "failed: in-flight fetch ended without a result"
        );
    }

    #[test]
    fn ordinal_token_has_no_padding() {
        assert_eq!(ordinal_token(7), "7");
        assert_eq!(ordinal_token(700), "700");
    }
}
