//! Catalog listings exported as JSON files.
//!
//! Layout: `<root>/<level>/<parent key>.<language>.json`, each file a JSON
//! array of child descriptors, e.g. `seasons/GRMG8ZQZR.en-US.json`.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use scrapefin_core::client::ChildFetcher;
use scrapefin_core::{CatalogKey, ChildDescriptor, Level, RemoteError};

pub struct JsonCatalogFetcher<L> {
    root: PathBuf,
    _level: PhantomData<fn() -> L>,
}

impl<L: Level> JsonCatalogFetcher<L> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            _level: PhantomData,
        }
    }

    pub fn listing_path(&self, parent: &L::Parent, language: &str) -> PathBuf {
        listing_path(&self.root, L::NAME, parent.as_str(), language)
    }
}

pub fn listing_path(root: &Path, level: &str, parent: &str, language: &str) -> PathBuf {
    root.join(level).join(format!("{parent}.{language}.json"))
}

#[async_trait::async_trait]
impl<L> ChildFetcher<L> for JsonCatalogFetcher<L>
where
    L: Level,
    L::Child: DeserializeOwned,
{
    fn name(&self) -> &str {
        "json-catalog"
    }

    async fn fetch_children(
        &self,
        parent: &L::Parent,
        language: &str,
    ) -> Result<Vec<ChildDescriptor<L::Child>>, RemoteError> {
        let path = self.listing_path(parent, language);
        debug!(path = %path.display(), "reading catalog listing");

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RemoteError::NotFound);
            }
            Err(e) => return Err(RemoteError::Network(e.to_string())),
        };

        serde_json::from_str(&raw)
            .map_err(|e| RemoteError::Provider(format!("parse {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapefin_core::{SeasonId, Seasons, SeriesId};

    #[tokio::test]
    async fn reads_listing_and_reports_missing() {
        let root = std::env::temp_dir().join(format!("scrapefin-catalog-{}", uuid::Uuid::new_v4()));
        let path = listing_path(&root, "seasons", "GRMG8ZQZR", "en-US");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"[{"key":"S9-A","ordinal":"9","title":"Enies Lobby"},
                {"key":"S9-B","ordinal":"9","title":"Post-Enies Lobby","payload":{"image":"https://img.example/s9b.jpg"}}]"#,
        )
        .unwrap();

        let fetcher = JsonCatalogFetcher::<Seasons>::new(&root);
        let seasons = fetcher
            .fetch_children(&SeriesId::new("GRMG8ZQZR"), "en-US")
            .await
            .unwrap();
        assert_eq!(seasons.len(), 2);
        assert_eq!(seasons[1].key, SeasonId::new("S9-B"));
        assert_eq!(seasons[0].payload, serde_json::Value::Null);

        let missing = fetcher.fetch_children(&SeriesId::new("OTHER"), "en-US").await;
        assert_eq!(missing, Err(RemoteError::NotFound));

        std::fs::remove_dir_all(&root).ok();
    }
}
