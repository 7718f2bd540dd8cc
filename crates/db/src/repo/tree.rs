//! Series → season → episode traversal for cleanup collaborators.
//!
//! The walk uses an explicit stack so depth is bounded by the heap, not the
//! call stack, however deep a library gets.

use sqlx::SqlitePool;
use tracing::info;

use super::children::{self, ChildTable};
use super::scrape_state;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogNode {
    Series(String),
    Season(String),
    Episode(String),
}

impl CatalogNode {
    pub fn key(&self) -> &str {
        match self {
            Self::Series(k) | Self::Season(k) | Self::Episode(k) => k,
        }
    }

    fn child_table(&self) -> Option<ChildTable> {
        match self {
            Self::Series(_) => Some(ChildTable::Season),
            Self::Season(_) => Some(ChildTable::Episode),
            Self::Episode(_) => None,
        }
    }

    fn row_table(&self) -> Option<ChildTable> {
        match self {
            Self::Series(_) => None,
            Self::Season(_) => Some(ChildTable::Season),
            Self::Episode(_) => Some(ChildTable::Episode),
        }
    }
}

/// All nodes under `series_key`, the series itself first (pre-order).
pub async fn collect_descendants(
    pool: &SqlitePool,
    series_key: &str,
) -> Result<Vec<CatalogNode>, sqlx::Error> {
    let mut stack = vec![CatalogNode::Series(series_key.to_string())];
    let mut visited = Vec::new();

    while let Some(node) = stack.pop() {
        if let Some(table) = node.child_table() {
            let keys = children::child_keys(pool, table, node.key()).await?;
            // Reverse so the first child is popped first.
            for key in keys.into_iter().rev() {
                stack.push(match table {
                    ChildTable::Season => CatalogNode::Season(key),
                    ChildTable::Episode => CatalogNode::Episode(key),
                });
            }
        }
        visited.push(node);
    }

    Ok(visited)
}

/// Delete a series and everything below it, leaves first, in one transaction.
/// Returns the number of nodes removed.
pub async fn delete_series_tree(pool: &SqlitePool, series_key: &str) -> Result<usize, sqlx::Error> {
    let nodes = collect_descendants(pool, series_key).await?;

    let mut tx = pool.begin().await?;
    for node in nodes.iter().rev() {
        if let Some(table) = node.row_table() {
            children::delete_by_key(&mut *tx, table, node.key()).await?;
        }
        scrape_state::delete_all_for_key(&mut *tx, node.key()).await?;
    }
    tx.commit().await?;

    info!(series = series_key, nodes = nodes.len(), "deleted series tree");
    Ok(nodes.len())
}
