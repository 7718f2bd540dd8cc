use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scrapefin_core::client::ChildFetcher;
use scrapefin_core::{Episodes, ScrapeOutcome, Seasons};
use scrapefin_db::SqliteCatalogStore;
use scrapefin_metadata::{IdentifierResolver, ScrapeCoordinator};
use scrapefin_scanner::{parse_library_path, walk_media_dir};

/// Scrape coordinators for both levels plus the resolver, sharing one store.
pub struct Engine {
    seasons: ScrapeCoordinator<Seasons>,
    episodes: ScrapeCoordinator<Episodes>,
    store: Arc<SqliteCatalogStore>,
    resolver: IdentifierResolver,
}

impl Engine {
    pub fn new(
        store: Arc<SqliteCatalogStore>,
        season_fetcher: Arc<dyn ChildFetcher<Seasons>>,
        episode_fetcher: Arc<dyn ChildFetcher<Episodes>>,
    ) -> Self {
        Self {
            seasons: ScrapeCoordinator::new(season_fetcher, store.clone()),
            episodes: ScrapeCoordinator::new(episode_fetcher, store.clone()),
            store,
            resolver: IdentifierResolver::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    pub files: usize,
    pub resolved: usize,
    pub unmatched: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum FileOutcome {
    Resolved,
    Unmatched,
    Skipped,
    Failed,
    Cancelled,
}

/// Walk `root` and resolve every episode file to its catalog key, scraping
/// season and episode listings on first sight. A file that cannot be resolved
/// is counted and the walk moves on.
pub async fn run_library_scan(
    engine: &Engine,
    root: &Path,
    language: &str,
    cancel: &CancellationToken,
) -> ScanResult {
    let entries = walk_media_dir(root);
    info!(path = %root.display(), files_found = entries.len(), "scan found video files");

    let mut result = ScanResult::default();
    for entry in &entries {
        result.files += 1;
        let rel = entry.relative_to(root);

        match resolve_file(engine, rel, language, cancel).await {
            FileOutcome::Resolved => result.resolved += 1,
            FileOutcome::Unmatched => result.unmatched += 1,
            FileOutcome::Skipped => result.skipped += 1,
            FileOutcome::Failed => result.failed += 1,
            FileOutcome::Cancelled => {
                info!("scan cancelled");
                break;
            }
        }
    }

    result
}

async fn resolve_file(
    engine: &Engine,
    rel: &Path,
    language: &str,
    cancel: &CancellationToken,
) -> FileOutcome {
    let Some(parsed) = parse_library_path(rel) else {
        debug!(file = %rel.display(), "not inside a series folder");
        return FileOutcome::Skipped;
    };
    let Some(series) = parsed.series_id() else {
        debug!(series = %parsed.series.title, "series folder has no catalog tag");
        return FileOutcome::Skipped;
    };

    match engine.seasons.ensure_fresh(&series, language, cancel).await {
        ScrapeOutcome::Cancelled => return FileOutcome::Cancelled,
        ScrapeOutcome::Failed(_) => return FileOutcome::Failed,
        ScrapeOutcome::Ok(_) | ScrapeOutcome::Skipped => {}
    }

    let query = parsed.season_query(series, language);
    let season = match engine.resolver.resolve_season(&*engine.store, &query).await {
        Ok(result) => result.into_key(),
        Err(e) => {
            warn!(file = %rel.display(), error = %e, "season lookup failed");
            return FileOutcome::Failed;
        }
    };
    let Some(season) = season else {
        warn!(file = %rel.display(), season = ?parsed.season_number(), "no catalog season");
        return FileOutcome::Unmatched;
    };

    match engine.episodes.ensure_fresh(&season, language, cancel).await {
        ScrapeOutcome::Cancelled => return FileOutcome::Cancelled,
        ScrapeOutcome::Failed(_) => return FileOutcome::Failed,
        ScrapeOutcome::Ok(_) | ScrapeOutcome::Skipped => {}
    }

    let query = parsed.episode_query(season.clone(), language);
    let resolved = match engine.resolver.resolve_episode(&*engine.store, &query).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(file = %rel.display(), season = %season, error = %e, "episode lookup failed");
            return FileOutcome::Failed;
        }
    };

    match resolved.matched {
        Some(episode) => {
            info!(
                file = %rel.display(),
                season = %season,
                episode = %episode,
                confidence = %resolved.confidence,
                "resolved"
            );
            FileOutcome::Resolved
        }
        None => {
            warn!(file = %rel.display(), season = %season, "no catalog episode");
            FileOutcome::Unmatched
        }
    }
}
