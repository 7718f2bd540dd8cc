pub mod client;
pub mod error;
pub mod keys;
pub mod store;
pub mod types;

pub use error::{FailureReason, RemoteError, StoreError};
pub use keys::{CatalogKey, EpisodeId, SeasonId, SeriesId};
pub use types::{
    AssetOutcome, AssetRecord, ChildDescriptor, Confidence, Episodes, Level, MergeSummary,
    ResolutionQuery, ResolutionResult, ScrapeOutcome, Seasons,
};
