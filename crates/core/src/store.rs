//! Persistence seams the engine needs. `scrapefin-db` provides the SQLite
//! implementation; tests may plug in their own.

use crate::error::StoreError;
use crate::types::{ChildDescriptor, Level, MergeSummary};

/// Read/query and merge access to the children of one catalog level.
#[async_trait::async_trait]
pub trait ChildStore<L: Level>: Send + Sync {
    /// Child of `parent` whose catalog ordinal equals `ordinal` exactly.
    async fn find_by_ordinal(
        &self,
        parent: &L::Parent,
        language: &str,
        ordinal: &str,
    ) -> Result<Option<L::Child>, StoreError>;

    /// First child (ingest order) whose title contains `text`, case-sensitive.
    async fn find_by_name_substring(
        &self,
        parent: &L::Parent,
        language: &str,
        text: &str,
    ) -> Result<Option<L::Child>, StoreError>;

    /// All children of `parent` in the order they were ingested.
    async fn list_children(
        &self,
        parent: &L::Parent,
        language: &str,
    ) -> Result<Vec<ChildDescriptor<L::Child>>, StoreError>;

    /// Whether a scrape of `parent` in `language` has been recorded.
    async fn exists(&self, parent: &L::Parent, language: &str) -> Result<bool, StoreError>;

    /// Set-union `children` into the store and record the scrape.
    /// Children already present are left untouched.
    async fn upsert_children(
        &self,
        parent: &L::Parent,
        language: &str,
        children: &[ChildDescriptor<L::Child>],
    ) -> Result<MergeSummary, StoreError>;
}

/// Blob storage for fetched assets, keyed by the derived blob id.
#[async_trait::async_trait]
pub trait AssetStore: Send + Sync {
    async fn asset_exists(&self, blob_id: &str) -> Result<bool, StoreError>;

    async fn write_asset(
        &self,
        blob_id: &str,
        source_uri: &str,
        bytes: &[u8],
    ) -> Result<(), StoreError>;
}
