use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scrapefin_cli::catalog::JsonCatalogFetcher;
use scrapefin_cli::cli::{Cli, Command};
use scrapefin_cli::config::CliConfig;
use scrapefin_cli::scan::{Engine, run_library_scan};
use scrapefin_core::{AssetOutcome, Episodes, Seasons, SeriesId};
use scrapefin_db::SqliteCatalogStore;
use scrapefin_metadata::{AssetCache, FsAssetStore, HttpAssetFetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = CliConfig::from_env();

    info!(db_path = %config.db_path, "connecting to database");
    let pool = scrapefin_db::connect(&config.db_path)
        .await
        .context("failed to connect to database")?;
    scrapefin_db::migrate::run(&pool)
        .await
        .context("failed to run migrations")?;
    let store = Arc::new(SqliteCatalogStore::new(pool));

    // Ctrl-C cancels in-flight work; locks are released on the way out.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Scan { library } => {
            let library = library
                .or(config.library.clone())
                .context("no library path given and SCRAPEFIN_LIBRARY is unset")?;

            let engine = Engine::new(
                store,
                Arc::new(JsonCatalogFetcher::<Seasons>::new(&config.catalog_dir)),
                Arc::new(JsonCatalogFetcher::<Episodes>::new(&config.catalog_dir)),
            );
            let result = run_library_scan(
                &engine,
                &library,
                &config.engine.default_language,
                &cancel,
            )
            .await;

            info!(
                files = result.files,
                resolved = result.resolved,
                unmatched = result.unmatched,
                skipped = result.skipped,
                failed = result.failed,
                "scan completed"
            );
        }
        Command::Cache { uris } => {
            let fetcher = HttpAssetFetcher::from_config(&config.engine)
                .context("failed to build http client")?;
            let cache = AssetCache::new(
                Arc::new(fetcher),
                Arc::new(FsAssetStore::new(&config.engine.asset_dir)),
                config.engine.snapshot_normalizer(),
            );

            let mut failed = 0;
            for uri in &uris {
                match cache.ensure_cached(uri, &cancel).await {
                    AssetOutcome::Ok => {
                        let record = cache.record(uri).await.context("asset lookup failed")?;
                        info!(source_uri = %uri, blob_id = %record.local_blob_id, "asset ready");
                    }
                    AssetOutcome::Failed(_) => failed += 1,
                    AssetOutcome::Cancelled => break,
                }
            }
            if failed > 0 {
                bail!("{failed} asset(s) could not be cached");
            }
        }
        Command::Forget { series } => {
            let series = SeriesId::new(series);
            let removed = store
                .forget::<Seasons>(&series, &config.engine.default_language)
                .await
                .context("failed to forget series")?;
            info!(series = %series, removed, "scrape marker cleared");
        }
        Command::Purge { series } => {
            let nodes = scrapefin_db::repo::tree::delete_series_tree(store.pool(), &series)
                .await
                .context("failed to purge series")?;
            info!(series = %series, nodes, "series purged");
        }
    }

    Ok(())
}
