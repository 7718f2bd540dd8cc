//! Fetch-once scrape coordination for one catalog level.
//!
//! `ensure_fresh` runs CHECK LOCK → CHECK FRESH → FETCH → MERGE for a parent
//! key. Concurrent callers for the same key wait on the leader and receive
//! its outcome; nobody polls.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scrapefin_core::client::ChildFetcher;
use scrapefin_core::store::ChildStore;
use scrapefin_core::{FailureReason, Level, ScrapeOutcome};

use crate::inflight::{Acquired, InFlightRegistry, WaitResult};

/// What a leader publishes to its waiters. The lock key carries no language,
/// so waiters check that the published outcome is for theirs.
#[derive(Debug, Clone)]
pub struct Published {
    language: String,
    outcome: ScrapeOutcome,
}

pub struct ScrapeCoordinator<L: Level> {
    fetcher: Arc<dyn ChildFetcher<L>>,
    store: Arc<dyn ChildStore<L>>,
    in_flight: InFlightRegistry<L::Parent, Published>,
}

impl<L: Level> Clone for ScrapeCoordinator<L> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<L: Level> ScrapeCoordinator<L> {
    pub fn new(fetcher: Arc<dyn ChildFetcher<L>>, store: Arc<dyn ChildStore<L>>) -> Self {
        Self::with_registry(fetcher, store, InFlightRegistry::new())
    }

    /// Build on an existing registry, e.g. one shared with another coordinator
    /// for the same level.
    pub fn with_registry(
        fetcher: Arc<dyn ChildFetcher<L>>,
        store: Arc<dyn ChildStore<L>>,
        in_flight: InFlightRegistry<L::Parent, Published>,
    ) -> Self {
        Self {
            fetcher,
            store,
            in_flight,
        }
    }

    pub fn in_flight(&self) -> &InFlightRegistry<L::Parent, Published> {
        &self.in_flight
    }

    /// Make sure the children of `key` are in the store for `language`.
    pub async fn ensure_fresh(
        &self,
        key: &L::Parent,
        language: &str,
        cancel: &CancellationToken,
    ) -> ScrapeOutcome {
        loop {
            let guard = match self.in_flight.acquire(key.clone()) {
                Acquired::Leader(guard) => guard,
                Acquired::Waiter(waiter) => {
                    debug!(key = %key, level = L::NAME, language, "scrape in flight, waiting");
                    match waiter.wait(cancel).await {
                        WaitResult::Done(done) if done.language == language => {
                            return done.outcome;
                        }
                        // Finished a different language; contend again.
                        WaitResult::Done(_) => continue,
                        WaitResult::Abandoned => {
                            warn!(key = %key, level = L::NAME, "scrape leader went away");
                            return ScrapeOutcome::Failed(FailureReason::Abandoned);
                        }
                        WaitResult::Cancelled => {
                            debug!(key = %key, level = L::NAME, "wait cancelled");
                            return ScrapeOutcome::Cancelled;
                        }
                    }
                }
            };

            debug!(key = %key, level = L::NAME, language, "scrape lock acquired");
            let scraped = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = self.scrape(key, language) => Some(outcome),
            };

            return match scraped {
                Some(outcome) => {
                    guard.complete(Published {
                        language: language.to_string(),
                        outcome: outcome.clone(),
                    });
                    outcome
                }
                None => {
                    // Guard drops here; waiters observe an abandoned fetch.
                    debug!(key = %key, level = L::NAME, "scrape cancelled");
                    ScrapeOutcome::Cancelled
                }
            };
        }
    }

    async fn scrape(&self, key: &L::Parent, language: &str) -> ScrapeOutcome {
        match self.try_scrape(key, language).await {
            Ok(outcome) => outcome,
            Err(reason) => {
                warn!(
                    key = %key,
                    level = L::NAME,
                    language,
                    code = reason.code(),
                    error = %reason,
                    "scrape failed"
                );
                ScrapeOutcome::Failed(reason)
            }
        }
    }

    async fn try_scrape(
        &self,
        key: &L::Parent,
        language: &str,
    ) -> Result<ScrapeOutcome, FailureReason> {
        if self.store.exists(key, language).await? {
            debug!(key = %key, level = L::NAME, language, "already fresh");
            return Ok(ScrapeOutcome::Skipped);
        }

        let children = self.fetcher.fetch_children(key, language).await?;
        let summary = self.store.upsert_children(key, language, &children).await?;

        info!(
            key = %key,
            level = L::NAME,
            language,
            provider = self.fetcher.name(),
            fetched = summary.fetched,
            inserted = summary.inserted,
            "scraped children"
        );
        Ok(ScrapeOutcome::Ok(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use scrapefin_core::{
        ChildDescriptor, MergeSummary, RemoteError, SeasonId, Seasons, SeriesId,
    };
    use scrapefin_db::SqliteCatalogStore;

    struct CountingFetcher {
        calls: AtomicUsize,
        delay: Duration,
        result: Result<Vec<ChildDescriptor<SeasonId>>, RemoteError>,
    }

    impl CountingFetcher {
        fn returning(children: Vec<ChildDescriptor<SeasonId>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                result: Ok(children),
            })
        }

        fn failing(err: RemoteError, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                result: Err(err),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ChildFetcher<Seasons> for CountingFetcher {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch_children(
            &self,
            _parent: &SeriesId,
            _language: &str,
        ) -> Result<Vec<ChildDescriptor<SeasonId>>, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    // File-backed so concurrent connections see one database.
    async fn file_store() -> Arc<SqliteCatalogStore> {
        let path = std::env::temp_dir().join(format!("scrapefin-{}.db", uuid::Uuid::new_v4()));
        let pool = scrapefin_db::connect(&path.to_string_lossy()).await.unwrap();
        scrapefin_db::migrate::run(&pool).await.unwrap();
        Arc::new(SqliteCatalogStore::new(pool))
    }

    fn seasons() -> Vec<ChildDescriptor<SeasonId>> {
        vec![
            ChildDescriptor::new(SeasonId::new("S1"), Some("1"), "East Blue"),
            ChildDescriptor::new(SeasonId::new("S2"), Some("2"), "Alabasta"),
        ]
    }

    fn coordinator(
        fetcher: Arc<CountingFetcher>,
        store: Arc<SqliteCatalogStore>,
    ) -> ScrapeCoordinator<Seasons> {
        ScrapeCoordinator::new(fetcher, store)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_fetch() {
        let fetcher = CountingFetcher::returning(seasons(), Duration::from_millis(100));
        let coord = coordinator(fetcher.clone(), file_store().await);
        let series = SeriesId::new("series-123");

        let tasks = (0..8).map(|_| {
            let coord = coord.clone();
            let series = series.clone();
            tokio::spawn(async move {
                coord
                    .ensure_fresh(&series, "en-US", &CancellationToken::new())
                    .await
            })
        });
        let outcomes = tokio::time::timeout(
            Duration::from_secs(5),
            futures::future::join_all(tasks),
        )
        .await
        .expect("no deadlock");

        assert_eq!(fetcher.calls(), 1);
        for outcome in outcomes {
            assert_eq!(
                outcome.unwrap(),
                ScrapeOutcome::Ok(MergeSummary { fetched: 2, inserted: 2 })
            );
        }
        assert!(coord.in_flight().is_empty());
    }

    #[tokio::test]
    async fn second_call_is_skipped_without_fetching() {
        let fetcher = CountingFetcher::returning(seasons(), Duration::ZERO);
        let coord = coordinator(fetcher.clone(), file_store().await);
        let series = SeriesId::new("series-123");
        let cancel = CancellationToken::new();

        assert!(matches!(
            coord.ensure_fresh(&series, "en-US", &cancel).await,
            ScrapeOutcome::Ok(_)
        ));
        assert_eq!(
            coord.ensure_fresh(&series, "en-US", &cancel).await,
            ScrapeOutcome::Skipped
        );
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn languages_are_fetched_separately() {
        let fetcher = CountingFetcher::returning(seasons(), Duration::ZERO);
        let coord = coordinator(fetcher.clone(), file_store().await);
        let series = SeriesId::new("series-123");
        let cancel = CancellationToken::new();

        coord.ensure_fresh(&series, "en-US", &cancel).await;
        coord.ensure_fresh(&series, "ja-JP", &cancel).await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failure_is_broadcast_and_lock_released() {
        let fetcher = CountingFetcher::failing(RemoteError::Unauthorized, Duration::from_millis(50));
        let coord = coordinator(fetcher.clone(), file_store().await);
        let series = SeriesId::new("series-401");

        let (a, b) = tokio::time::timeout(Duration::from_secs(5), async {
            let cancel = CancellationToken::new();
            tokio::join!(
                coord.ensure_fresh(&series, "en-US", &cancel),
                coord.ensure_fresh(&series, "en-US", &cancel),
            )
        })
        .await
        .expect("no deadlock");

        let expected = ScrapeOutcome::Failed(FailureReason::Remote(RemoteError::Unauthorized));
        assert_eq!(a, expected);
        assert_eq!(b, expected);
        assert_eq!(fetcher.calls(), 1);
        assert!(coord.in_flight().is_empty());

        // Nothing was marked fresh, so the next call tries again.
        coord
            .ensure_fresh(&series, "en-US", &CancellationToken::new())
            .await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_leader_abandons_waiters() {
        let fetcher = CountingFetcher::returning(seasons(), Duration::from_secs(30));
        let coord = coordinator(fetcher.clone(), file_store().await);
        let series = SeriesId::new("series-slow");

        let leader_cancel = CancellationToken::new();
        let leader = {
            let coord = coord.clone();
            let series = series.clone();
            let cancel = leader_cancel.clone();
            tokio::spawn(async move { coord.ensure_fresh(&series, "en-US", &cancel).await })
        };
        while !coord.in_flight().contains(&series) {
            tokio::task::yield_now().await;
        }

        let waiter = {
            let coord = coord.clone();
            let series = series.clone();
            tokio::spawn(async move {
                coord
                    .ensure_fresh(&series, "en-US", &CancellationToken::new())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader_cancel.cancel();

        let (leader, waiter) = tokio::time::timeout(Duration::from_secs(5), async {
            (leader.await.unwrap(), waiter.await.unwrap())
        })
        .await
        .expect("no deadlock");

        assert_eq!(leader, ScrapeOutcome::Cancelled);
        assert_eq!(waiter, ScrapeOutcome::Failed(FailureReason::Abandoned));
        assert!(coord.in_flight().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_waiter_does_not_disturb_leader() {
        let fetcher = CountingFetcher::returning(seasons(), Duration::from_millis(100));
        let coord = coordinator(fetcher.clone(), file_store().await);
        let series = SeriesId::new("series-123");

        let leader = {
            let coord = coord.clone();
            let series = series.clone();
            tokio::spawn(async move {
                coord
                    .ensure_fresh(&series, "en-US", &CancellationToken::new())
                    .await
            })
        };
        while !coord.in_flight().contains(&series) {
            tokio::task::yield_now().await;
        }

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            coord.ensure_fresh(&series, "en-US", &cancel).await,
            ScrapeOutcome::Cancelled
        );

        let leader = tokio::time::timeout(Duration::from_secs(5), leader)
            .await
            .expect("no deadlock")
            .unwrap();
        assert!(matches!(leader, ScrapeOutcome::Ok(_)));
        assert_eq!(fetcher.calls(), 1);
    }
}
