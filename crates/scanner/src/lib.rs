//! Library walk and path hints for the resolver.
pub mod parser;
pub mod patterns;
pub mod walk;

pub use parser::{EpisodeHint, LibraryEntry, SeasonHint, SeriesHint, parse_library_path};
pub use patterns::{Extraction, OrdinalPattern, OrdinalPatterns};
pub use walk::{MediaEntry, walk_media_dir};
