//! Fetch-once asset cache.
//!
//! Assets are keyed by their source URI with any archive snapshot wrapper
//! removed, so the same image captured at two points in time is fetched and
//! stored once.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scrapefin_core::client::AssetFetcher;
use scrapefin_core::store::AssetStore;
use scrapefin_core::{AssetOutcome, AssetRecord, FailureReason, StoreError};

use crate::inflight::{Acquired, InFlightRegistry, WaitResult};

// 20210101000000, 2021, 20210101000000im_
static RE_SNAPSHOT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4,}[A-Za-z0-9_]*$").unwrap());

/// Strips `<archive-host>/<snapshot-marker>/` wrappers from asset URIs.
#[derive(Debug, Clone)]
pub struct SnapshotNormalizer {
    hosts: Vec<String>,
}

impl SnapshotNormalizer {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.into().trim_matches('/').to_string())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// The original URI behind any number of nested wrappers, or `uri`
    /// unchanged when it is not wrapped.
    pub fn normalize<'a>(&self, uri: &'a str) -> &'a str {
        let mut current = uri;
        while let Some(inner) = self.unwrap_once(current) {
            current = inner;
        }
        current
    }

    fn unwrap_once<'a>(&self, uri: &'a str) -> Option<&'a str> {
        let rest = strip_scheme(uri);
        self.hosts.iter().find_map(|host| {
            let after_host = rest.strip_prefix(host.as_str())?.strip_prefix('/')?;
            let (marker, original) = after_host.split_once('/')?;
            (RE_SNAPSHOT_MARKER.is_match(marker) && !original.is_empty()).then_some(original)
        })
    }
}

impl Default for SnapshotNormalizer {
    fn default() -> Self {
        Self::new(["web.archive.org/web"])
    }
}

fn strip_scheme(uri: &str) -> &str {
    for scheme in ["https://", "http://", "//"] {
        if uri
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
        {
            return &uri[scheme.len()..];
        }
    }
    uri
}

/// Local blob id for a normalized asset URI: a SHA-256 prefix of the whole
/// URI followed by its file name, reduced to characters safe in a single path
/// component. Query and fragment are part of the digest but not the name.
pub fn blob_id(normalized_uri: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_uri.as_bytes());
    let digest = hex::encode(hasher.finalize());
    let prefix = &digest[..BLOB_DIGEST_LEN];

    match file_name(normalized_uri) {
        Some(name) => format!("{prefix}-{name}"),
        None => prefix.to_string(),
    }
}

const BLOB_DIGEST_LEN: usize = 16;

fn file_name(uri: &str) -> Option<String> {
    let without_suffix = uri
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let name = without_suffix.rsplit('/').next()?;

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    (!sanitized.is_empty()).then(|| sanitized.to_string())
}

pub struct AssetCache {
    fetcher: Arc<dyn AssetFetcher>,
    store: Arc<dyn AssetStore>,
    normalizer: SnapshotNormalizer,
    in_flight: InFlightRegistry<String, AssetOutcome>,
}

impl AssetCache {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        store: Arc<dyn AssetStore>,
        normalizer: SnapshotNormalizer,
    ) -> Self {
        Self {
            fetcher,
            store,
            normalizer,
            in_flight: InFlightRegistry::new(),
        }
    }

    pub fn in_flight(&self) -> &InFlightRegistry<String, AssetOutcome> {
        &self.in_flight
    }

    pub fn blob_id_for(&self, source_uri: &str) -> String {
        blob_id(self.normalizer.normalize(source_uri))
    }

    /// Where `source_uri` lives locally, without fetching anything.
    pub async fn record(&self, source_uri: &str) -> Result<AssetRecord, StoreError> {
        let local_blob_id = self.blob_id_for(source_uri);
        let exists = self.store.asset_exists(&local_blob_id).await?;
        Ok(AssetRecord {
            source_uri: source_uri.to_string(),
            local_blob_id,
            exists,
        })
    }

    /// Make sure the asset behind `source_uri` is stored locally. Bytes are
    /// fetched from `source_uri` as given, wrapper included.
    pub async fn ensure_cached(&self, source_uri: &str, cancel: &CancellationToken) -> AssetOutcome {
        let key = self.normalizer.normalize(source_uri).to_string();
        let blob = blob_id(&key);

        match self.store.asset_exists(&blob).await {
            Ok(true) => {
                debug!(blob_id = %blob, "asset cache hit");
                return AssetOutcome::Ok;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(blob_id = %blob, error = %e, "asset lookup failed");
                return AssetOutcome::Failed(e.into());
            }
        }

        let guard = match self.in_flight.acquire(key) {
            Acquired::Leader(guard) => guard,
            Acquired::Waiter(waiter) => {
                debug!(blob_id = %blob, "asset fetch in flight, waiting");
                return match waiter.wait(cancel).await {
                    WaitResult::Done(outcome) => outcome,
                    WaitResult::Abandoned => AssetOutcome::Failed(FailureReason::Abandoned),
                    WaitResult::Cancelled => AssetOutcome::Cancelled,
                };
            }
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.fetch_and_store(source_uri, &blob) => Some(result),
        };

        match fetched {
            Some(Ok(())) => {
                guard.complete(AssetOutcome::Ok);
                AssetOutcome::Ok
            }
            Some(Err(reason)) => {
                warn!(
                    source_uri,
                    blob_id = %blob,
                    code = reason.code(),
                    error = %reason,
                    "asset fetch failed"
                );
                let outcome = AssetOutcome::Failed(reason);
                guard.complete(outcome.clone());
                outcome
            }
            None => {
                debug!(blob_id = %blob, "asset fetch cancelled");
                AssetOutcome::Cancelled
            }
        }
    }

    async fn fetch_and_store(&self, source_uri: &str, blob: &str) -> Result<(), FailureReason> {
        // A previous leader may have finished between the check and the lock.
        if self.store.asset_exists(blob).await? {
            return Ok(());
        }

        let bytes = self.fetcher.fetch_asset(source_uri).await?;
        self.store.write_asset(blob, source_uri, &bytes).await?;

        info!(source_uri, blob_id = %blob, size = bytes.len(), "cached asset");
        Ok(())
    }
}

/// Blobs as plain files under one directory.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, blob_id: &str) -> PathBuf {
        self.root.join(blob_id)
    }
}

#[async_trait::async_trait]
impl AssetStore for FsAssetStore {
    async fn asset_exists(&self, blob_id: &str) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.path_for(blob_id)).await?)
    }

    async fn write_asset(
        &self,
        blob_id: &str,
        _source_uri: &str,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;

        // Write beside the target and rename so readers never see a partial file.
        let tmp = self
            .root
            .join(format!(".{blob_id}.{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, self.path_for(blob_id)).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use scrapefin_core::RemoteError;
    use scrapefin_db::SqliteCatalogStore;

    const POSTER: &str = "https://img.example/catalog/poster.jpg";

    struct CountingAssetFetcher {
        calls: AtomicUsize,
        requested: Mutex<Vec<String>>,
        delay: Duration,
        fail_with: Option<RemoteError>,
    }

    impl CountingAssetFetcher {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
                delay,
                fail_with: None,
            })
        }

        fn failing(err: RemoteError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                fail_with: Some(err),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl AssetFetcher for CountingAssetFetcher {
        async fn fetch_asset(&self, source_uri: &str) -> Result<Vec<u8>, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(source_uri.to_string());
            tokio::time::sleep(self.delay).await;
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(b"\x89PNG".to_vec()),
            }
        }
    }

    async fn file_store() -> Arc<SqliteCatalogStore> {
        let path = std::env::temp_dir().join(format!("scrapefin-{}.db", uuid::Uuid::new_v4()));
        let pool = scrapefin_db::connect(&path.to_string_lossy()).await.unwrap();
        scrapefin_db::migrate::run(&pool).await.unwrap();
        Arc::new(SqliteCatalogStore::new(pool))
    }

    #[test]
    fn snapshot_wrappers_normalize_to_original() {
        let n = SnapshotNormalizer::default();
        let a = format!("https://web.archive.org/web/20210101000000/{POSTER}");
        let b = format!("http://web.archive.org/web/20220615123000im_/{POSTER}");
        assert_eq!(n.normalize(&a), POSTER);
        assert_eq!(n.normalize(&b), POSTER);
        assert_eq!(n.normalize(POSTER), POSTER);
    }

    #[test]
    fn nested_wrappers_are_all_removed() {
        let n = SnapshotNormalizer::default();
        let nested = format!(
            "https://web.archive.org/web/2021/https://web.archive.org/web/2019/{POSTER}"
        );
        assert_eq!(n.normalize(&nested), POSTER);
    }

    #[test]
    fn non_snapshot_segments_are_left_alone() {
        let n = SnapshotNormalizer::new(["archive"]);
        assert_eq!(n.normalize("archive/latest/x.png"), "archive/latest/x.png");
        assert_eq!(n.normalize("archive/2021/x.png"), "x.png");
        assert_eq!(n.normalize("archive/2021/"), "archive/2021/");
    }

    #[test]
    fn blob_ids_are_single_safe_components() {
        let poster = blob_id(POSTER);
        assert_eq!(poster.len(), BLOB_DIGEST_LEN + "-poster.jpg".len());
        assert!(poster.ends_with("-poster.jpg"));
        assert_eq!(blob_id(POSTER), poster);

        assert!(blob_id("https://img.example/a/avatar.png?w=300#top").ends_with("-avatar.png"));
        assert!(blob_id("https://img.example/a b/c%20d.png").ends_with("-c_20d.png"));
        assert_eq!(blob_id("../..").len(), BLOB_DIGEST_LEN);
        assert!(!blob_id("..\\..\\secret").contains(['/', '\\']));
    }

    #[test]
    fn same_file_name_under_different_paths_gets_distinct_blobs() {
        let a = blob_id("https://img.example/series/GRMG8ZQZR/poster.jpg");
        let b = blob_id("https://img.example/series/G6NQ5DWZ6/poster.jpg");
        assert_ne!(a, b);
        assert_ne!(
            blob_id("https://img.example/p.png?w=300"),
            blob_id("https://img.example/p.png?w=600")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn snapshots_of_one_asset_fetch_once() {
        let fetcher = CountingAssetFetcher::new(Duration::from_millis(50));
        let store = file_store().await;
        let cache = AssetCache::new(
            fetcher.clone(),
            store.clone(),
            SnapshotNormalizer::new(["archive"]),
        );

        let first = format!("archive/2021/{POSTER}");
        let second = format!("archive/2022/{POSTER}");
        let (a, b) = tokio::time::timeout(Duration::from_secs(5), async {
            let cancel = CancellationToken::new();
            tokio::join!(
                cache.ensure_cached(&first, &cancel),
                cache.ensure_cached(&second, &cancel),
            )
        })
        .await
        .expect("no deadlock");

        assert_eq!(a, AssetOutcome::Ok);
        assert_eq!(b, AssetOutcome::Ok);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(scrapefin_db::repo::assets::count(store.pool()).await.unwrap(), 1);

        // Bytes come from the wrapped URI as given.
        let requested = fetcher.requested.lock().unwrap().clone();
        assert!(requested[0].starts_with("archive/202"));
        assert!(cache.in_flight().is_empty());
    }

    #[tokio::test]
    async fn cached_asset_needs_no_network() {
        let fetcher = CountingAssetFetcher::new(Duration::ZERO);
        let cache = AssetCache::new(fetcher.clone(), file_store().await, SnapshotNormalizer::default());
        let cancel = CancellationToken::new();

        let before = cache.record(POSTER).await.unwrap();
        assert!(!before.exists);
        assert_eq!(before.local_blob_id, blob_id(POSTER));

        assert_eq!(cache.ensure_cached(POSTER, &cancel).await, AssetOutcome::Ok);
        assert_eq!(cache.ensure_cached(POSTER, &cancel).await, AssetOutcome::Ok);
        assert_eq!(fetcher.calls(), 1);
        assert!(cache.record(POSTER).await.unwrap().exists);
    }

    #[tokio::test]
    async fn failed_fetch_releases_lock_and_stores_nothing() {
        let fetcher = CountingAssetFetcher::failing(RemoteError::NotFound);
        let store = file_store().await;
        let cache = AssetCache::new(fetcher.clone(), store.clone(), SnapshotNormalizer::default());
        let cancel = CancellationToken::new();

        assert_eq!(
            cache.ensure_cached(POSTER, &cancel).await,
            AssetOutcome::Failed(FailureReason::Remote(RemoteError::NotFound))
        );
        assert!(cache.in_flight().is_empty());
        assert!(!store.asset_exists(&blob_id(POSTER)).await.unwrap());

        cache.ensure_cached(POSTER, &cancel).await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn posters_of_different_series_are_fetched_separately() {
        let fetcher = CountingAssetFetcher::new(Duration::ZERO);
        let store = file_store().await;
        let cache = AssetCache::new(fetcher.clone(), store.clone(), SnapshotNormalizer::default());
        let cancel = CancellationToken::new();

        let first = "https://img.example/series/GRMG8ZQZR/poster.jpg";
        let second = "https://img.example/series/G6NQ5DWZ6/poster.jpg";
        assert_eq!(cache.ensure_cached(first, &cancel).await, AssetOutcome::Ok);
        assert_eq!(cache.ensure_cached(second, &cancel).await, AssetOutcome::Ok);

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(
            *fetcher.requested.lock().unwrap(),
            vec![first.to_string(), second.to_string()]
        );
        assert_eq!(scrapefin_db::repo::assets::count(store.pool()).await.unwrap(), 2);
        assert_ne!(
            cache.record(first).await.unwrap().local_blob_id,
            cache.record(second).await.unwrap().local_blob_id
        );
    }

    #[tokio::test]
    async fn cancelled_before_fetch_reports_cancelled() {
        let fetcher = CountingAssetFetcher::new(Duration::ZERO);
        let cache = AssetCache::new(fetcher.clone(), file_store().await, SnapshotNormalizer::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(cache.ensure_cached(POSTER, &cancel).await, AssetOutcome::Cancelled);
        assert_eq!(fetcher.calls(), 0);
        assert!(cache.in_flight().is_empty());
    }

    #[tokio::test]
    async fn fs_store_writes_atomically() {
        let root = std::env::temp_dir().join(format!("scrapefin-assets-{}", uuid::Uuid::new_v4()));
        let store = FsAssetStore::new(&root);

        assert!(!store.asset_exists("poster.jpg").await.unwrap());
        store.write_asset("poster.jpg", POSTER, b"jpeg").await.unwrap();
        assert!(store.asset_exists("poster.jpg").await.unwrap());
        assert_eq!(std::fs::read(store.path_for("poster.jpg")).unwrap(), b"jpeg");

        let leftovers: Vec<_> = std::fs::read_dir(&root)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        std::fs::remove_dir_all(&root).ok();
    }
}
