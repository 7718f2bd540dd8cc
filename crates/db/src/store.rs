//! SQLite implementation of the engine's persistence seams.

use sqlx::SqlitePool;
use tracing::debug;

use scrapefin_core::store::{AssetStore, ChildStore};
use scrapefin_core::{
    CatalogKey, ChildDescriptor, Episodes, Level, MergeSummary, Seasons, StoreError,
};

use crate::repo::children::{self, ChildRow, ChildTable, NewChild};
use crate::repo::{assets, scrape_state};
use crate::store_err;

/// Levels backed by a child table.
pub trait TableLevel: Level {
    const TABLE: ChildTable;
}

impl TableLevel for Seasons {
    const TABLE: ChildTable = ChildTable::Season;
}

impl TableLevel for Episodes {
    const TABLE: ChildTable = ChildTable::Episode;
}

#[derive(Debug, Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Drop the scrape marker for `parent` so the next scrape fetches again.
    pub async fn forget<L: TableLevel>(
        &self,
        parent: &L::Parent,
        language: &str,
    ) -> Result<bool, StoreError> {
        scrape_state::forget(&self.pool, parent.as_str(), L::NAME, language)
            .await
            .map_err(store_err)
    }
}

fn row_to_descriptor<K: CatalogKey>(row: ChildRow) -> Result<ChildDescriptor<K>, StoreError> {
    let payload = match row.payload_json.as_deref() {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", row.catalog_key)))?,
        None => serde_json::Value::Null,
    };
    Ok(ChildDescriptor {
        key: K::from_catalog(row.catalog_key),
        ordinal: row.number,
        title: row.title,
        payload,
    })
}

#[async_trait::async_trait]
impl<L: TableLevel> ChildStore<L> for SqliteCatalogStore {
    async fn find_by_ordinal(
        &self,
        parent: &L::Parent,
        language: &str,
        ordinal: &str,
    ) -> Result<Option<L::Child>, StoreError> {
        let key = children::find_by_number(&self.pool, L::TABLE, parent.as_str(), language, ordinal)
            .await
            .map_err(store_err)?;
        Ok(key.map(L::Child::from_catalog))
    }

    async fn find_by_name_substring(
        &self,
        parent: &L::Parent,
        language: &str,
        text: &str,
    ) -> Result<Option<L::Child>, StoreError> {
        let key = children::find_by_title_substring(
            &self.pool,
            L::TABLE,
            parent.as_str(),
            language,
            text,
        )
        .await
        .map_err(store_err)?;
        Ok(key.map(L::Child::from_catalog))
    }

    async fn list_children(
        &self,
        parent: &L::Parent,
        language: &str,
    ) -> Result<Vec<ChildDescriptor<L::Child>>, StoreError> {
        children::list(&self.pool, L::TABLE, parent.as_str(), language)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(row_to_descriptor)
            .collect()
    }

    async fn exists(&self, parent: &L::Parent, language: &str) -> Result<bool, StoreError> {
        scrape_state::exists(&self.pool, parent.as_str(), L::NAME, language)
            .await
            .map_err(store_err)
    }

    async fn upsert_children(
        &self,
        parent: &L::Parent,
        language: &str,
        children: &[ChildDescriptor<L::Child>],
    ) -> Result<MergeSummary, StoreError> {
        let mut rows = Vec::with_capacity(children.len());
        for child in children {
            let payload_json = if child.payload.is_null() {
                None
            } else {
                Some(
                    serde_json::to_string(&child.payload)
                        .map_err(|e| StoreError::Corrupt(e.to_string()))?,
                )
            };
            rows.push(NewChild {
                catalog_key: child.key.as_str(),
                number: child.ordinal.as_deref(),
                title: &child.title,
                payload_json,
            });
        }

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let inserted = children::insert_missing(&mut *tx, L::TABLE, parent.as_str(), language, &rows)
            .await
            .map_err(store_err)?;
        let summary = MergeSummary {
            fetched: children.len(),
            inserted,
        };
        // The marker carries the last merge's summary.
        let state_json =
            serde_json::to_string(&summary).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        scrape_state::mark_fetched(&mut *tx, parent.as_str(), L::NAME, language, Some(&state_json))
            .await
            .map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;

        debug!(
            parent = %parent,
            level = L::NAME,
            language,
            fetched = children.len(),
            inserted,
            "merged children"
        );

        Ok(summary)
    }
}

#[async_trait::async_trait]
impl AssetStore for SqliteCatalogStore {
    async fn asset_exists(&self, blob_id: &str) -> Result<bool, StoreError> {
        assets::exists(&self.pool, blob_id).await.map_err(store_err)
    }

    async fn write_asset(
        &self,
        blob_id: &str,
        source_uri: &str,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        assets::upsert(&self.pool, blob_id, source_uri, bytes)
            .await
            .map_err(store_err)
    }
}
