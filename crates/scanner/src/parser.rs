use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use scrapefin_core::{ResolutionQuery, SeasonId, SeriesId};

use crate::patterns::{Extraction, OrdinalPatterns};

/// Series folder: display title plus catalog id when tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesHint {
    pub title: String,
    pub catalog_id: Option<String>,
}

/// Season folder: `Season 9`, or `Season 9 - 2` for the second catalog
/// season that shares number 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonHint {
    pub number: u32,
    pub duplicate: Option<u32>,
}

/// Episode file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeHint {
    /// File stem, handed to the resolver as the candidate name.
    pub name: String,
    pub season: Option<u32>,
    /// Plain integer episode number. `None` for sub-numbered files like
    /// `E12.5` or `E12B`.
    pub ordinal: Option<u32>,
}

/// Everything a library path says about one episode file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub series: SeriesHint,
    pub season: Option<SeasonHint>,
    pub episode: EpisodeHint,
}

impl LibraryEntry {
    pub fn series_id(&self) -> Option<SeriesId> {
        self.series.catalog_id.as_deref().map(SeriesId::new)
    }

    /// Season number from the folder, else from the file's `SxxEyy` token.
    pub fn season_number(&self) -> Option<u32> {
        self.season.map(|s| s.number).or(self.episode.season)
    }

    pub fn season_query(&self, series: SeriesId, language: &str) -> ResolutionQuery<SeriesId> {
        let name = match self.season {
            Some(hint) => format!("Season {}", hint.number),
            None => String::new(),
        };
        ResolutionQuery::new(series, name, language)
            .with_ordinal(self.season_number())
            .with_duplicate(self.season.and_then(|s| s.duplicate))
    }

    pub fn episode_query(&self, season: SeasonId, language: &str) -> ResolutionQuery<SeasonId> {
        ResolutionQuery::new(season, self.episode.name.clone(), language)
            .with_ordinal(self.episode.ordinal)
    }
}

// Patterns to ignore
static IGNORE_NAMES: &[&str] = &[
    ".DS_Store",
    "Thumbs.db",
    "@eaDir",
    ".nfo",
    ".txt",
    ".jpg",
    ".jpeg",
    ".png",
    ".srt",
    ".sub",
    ".idx",
    ".ass",
    ".ssa",
];

static VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "mov", "wmv", "flv", "webm", "ts", "m2ts", "mts", "mpg", "mpeg",
    "mpe", "mpv", "3gp", "3g2", "ogv", "vob", "mxf", "f4v", "asf",
];

// Catalog tag in folder name: [crunchyroll=GRMG8ZQZR], [cr=G6NQ5DWZ6]
static RE_PROVIDER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\w+)=([^\]]+)\]").unwrap());

static RE_PROVIDER_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\[.*?\]\s*").unwrap());

// "Season 9", "Season 09 - 2"
static RE_SEASON_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*Season\s+(\d{1,4})(?:\s*-\s*(\d{1,3}))?\s*$").unwrap());

// Season half of S9E700; the episode half belongs to the ordinal patterns.
static RE_SEASON_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bS(\d{1,4})\s*E-?\d").unwrap());

static EPISODE_PATTERNS: LazyLock<OrdinalPatterns> = LazyLock::new(OrdinalPatterns::default);

static CATALOG_TAGS: &[&str] = &["crunchyroll", "cr"];

/// Check if a filename should be ignored.
pub fn should_ignore(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    IGNORE_NAMES
        .iter()
        .any(|pat| lower == pat.to_lowercase() || lower.ends_with(pat))
}

/// Check if a file has a video extension.
pub fn is_video_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Extract provider IDs from a folder/file name like `[cr=GRMG8ZQZR]`.
pub fn extract_provider_ids(name: &str) -> Vec<(String, String)> {
    RE_PROVIDER_ID
        .captures_iter(name)
        .map(|c| (c[1].to_lowercase(), c[2].trim().to_string()))
        .collect()
}

pub fn parse_series_folder(name: &str) -> SeriesHint {
    let catalog_id = extract_provider_ids(name)
        .into_iter()
        .find(|(tag, _)| CATALOG_TAGS.contains(&tag.as_str()))
        .map(|(_, id)| id);
    let title = RE_PROVIDER_TAG.replace_all(name, " ").trim().to_string();

    SeriesHint {
        title: if title.is_empty() { name.to_string() } else { title },
        catalog_id,
    }
}

pub fn parse_season_folder(name: &str) -> Option<SeasonHint> {
    let caps = RE_SEASON_FOLDER.captures(name)?;
    let number = caps[1].parse().ok()?;
    let duplicate = caps.get(2).and_then(|m| m.as_str().parse().ok());
    Some(SeasonHint { number, duplicate })
}

pub fn parse_episode_file(filename: &str) -> EpisodeHint {
    let stem = match filename.rsplit_once('.') {
        Some((stem, ext)) if is_video_file(filename) && !ext.is_empty() => stem,
        _ => filename,
    };

    let season = RE_SEASON_TOKEN
        .captures(stem)
        .and_then(|caps| caps[1].parse().ok());
    let ordinal = match EPISODE_PATTERNS.evaluate(stem) {
        Extraction::Ordinal(n) => Some(n),
        Extraction::SubNumbered | Extraction::Nothing => None,
    };

    EpisodeHint {
        name: stem.to_string(),
        season,
        ordinal,
    }
}

/// Parse a path relative to the library root.
/// Supports `Series [cr=ID]/Season 9 - 2/S9E700.mkv` and `Series [cr=ID]/S9E700.mkv`.
pub fn parse_library_path(rel: &Path) -> Option<LibraryEntry> {
    let components: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    let (file, dirs) = components.split_last()?;
    let series_dir = dirs.first()?;
    let season = dirs.get(1).and_then(|d| parse_season_folder(d));

    Some(LibraryEntry {
        series: parse_series_folder(series_dir),
        season,
        episode: parse_episode_file(file),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
