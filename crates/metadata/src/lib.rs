pub mod assets;
pub mod coordinator;
pub mod http;
pub mod inflight;
pub mod resolver;

use std::path::PathBuf;

pub use assets::{AssetCache, FsAssetStore, SnapshotNormalizer};
pub use coordinator::ScrapeCoordinator;
pub use http::HttpAssetFetcher;
pub use inflight::InFlightRegistry;
pub use resolver::IdentifierResolver;

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Where `FsAssetStore` keeps downloaded blobs.
    pub asset_dir: PathBuf,
    /// Hosts whose URLs wrap an original URI behind a snapshot marker,
    /// e.g. `web.archive.org/web/20210101000000/https://img.example/a.png`.
    pub archive_hosts: Vec<String>,
    pub default_language: String,
    pub http_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("/tmp/scrapefin_assets"),
            archive_hosts: vec!["web.archive.org/web".into()],
            default_language: "en-US".into(),
            http_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn snapshot_normalizer(&self) -> SnapshotNormalizer {
        SnapshotNormalizer::new(self.archive_hosts.iter().cloned())
    }
}
