//! Remote seams. Authentication, rate limiting and the catalog wire format
//! live behind these traits.

use crate::error::RemoteError;
use crate::types::{ChildDescriptor, Level};

/// Lists the children of a catalog entry.
#[async_trait::async_trait]
pub trait ChildFetcher<L: Level>: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_children(
        &self,
        parent: &L::Parent,
        language: &str,
    ) -> Result<Vec<ChildDescriptor<L::Child>>, RemoteError>;
}

/// Downloads raw asset bytes.
#[async_trait::async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch_asset(&self, source_uri: &str) -> Result<Vec<u8>, RemoteError>;
}
