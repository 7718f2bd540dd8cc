//! Ordinal extraction from local episode names.
//!
//! Each heuristic is a named matcher behind [`OrdinalPattern`]. File parsing
//! and resolution both talk to an [`OrdinalPatterns`] set, so new heuristics
//! slot in without touching either control flow.

use regex::Regex;
use std::sync::LazyLock;

/// What one pattern made of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    Ordinal(u32),
    /// The name encodes sub-numbering ("E12.5", "E12B"); any positional
    /// ordinal must be ignored and the name matched instead.
    SubNumbered,
    Nothing,
}

pub trait OrdinalPattern: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_extract(&self, candidate: &str) -> Extraction;
}

// E12.5, E-12.5. The fractional part is capped at two digits so "E02.1080p"
// is not taken for a half episode.
static RE_DECIMAL_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ee]-?\d+\.\d{1,2}\b").unwrap());

// E12B, E-12a
static RE_LETTER_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ee]-?\d+[A-Za-z]\b").unwrap());

// S09E700, s1e07
static RE_SEASON_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bS\d{1,4}\s*E-?(\d{1,5})").unwrap());

// E-007, E700
static RE_EPISODE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^a-z])E-?(\d{1,5})").unwrap());

/// Decimal episode numbers mark specials slotted between regular episodes.
pub struct DecimalEpisode;

impl OrdinalPattern for DecimalEpisode {
    fn name(&self) -> &'static str {
        "decimal_episode"
    }

    fn try_extract(&self, candidate: &str) -> Extraction {
        if RE_DECIMAL_EPISODE.is_match(candidate) {
            Extraction::SubNumbered
        } else {
            Extraction::Nothing
        }
    }
}

/// A number immediately followed by a letter ("E12B") is a split episode.
pub struct LetterSuffixEpisode;

impl OrdinalPattern for LetterSuffixEpisode {
    fn name(&self) -> &'static str {
        "letter_suffix_episode"
    }

    fn try_extract(&self, candidate: &str) -> Extraction {
        if RE_LETTER_EPISODE.is_match(candidate) {
            Extraction::SubNumbered
        } else {
            Extraction::Nothing
        }
    }
}

pub struct SeasonEpisodeToken;

impl OrdinalPattern for SeasonEpisodeToken {
    fn name(&self) -> &'static str {
        "season_episode_token"
    }

    fn try_extract(&self, candidate: &str) -> Extraction {
        capture_ordinal(&RE_SEASON_EPISODE, candidate)
    }
}

/// `E-<token>` or `E<token>`, leading zeros stripped.
pub struct EpisodeToken;

impl OrdinalPattern for EpisodeToken {
    fn name(&self) -> &'static str {
        "episode_token"
    }

    fn try_extract(&self, candidate: &str) -> Extraction {
        capture_ordinal(&RE_EPISODE_TOKEN, candidate)
    }
}

fn capture_ordinal(re: &Regex, candidate: &str) -> Extraction {
    re.captures(candidate)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(Extraction::Ordinal)
        .unwrap_or(Extraction::Nothing)
}

/// Ordered set of patterns. The first one that says anything wins, so the
/// sub-numbering vetoes go first.
pub struct OrdinalPatterns {
    patterns: Vec<Box<dyn OrdinalPattern>>,
}

impl OrdinalPatterns {
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn with(mut self, pattern: impl OrdinalPattern + 'static) -> Self {
        self.patterns.push(Box::new(pattern));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|p| p.name()).collect()
    }

    pub fn evaluate(&self, candidate: &str) -> Extraction {
        self.patterns
            .iter()
            .map(|p| p.try_extract(candidate))
            .find(|e| *e != Extraction::Nothing)
            .unwrap_or(Extraction::Nothing)
    }
}

impl Default for OrdinalPatterns {
    fn default() -> Self {
        Self::empty()
            .with(DecimalEpisode)
            .with(LetterSuffixEpisode)
            .with(SeasonEpisodeToken)
            .with(EpisodeToken)
    }
}
