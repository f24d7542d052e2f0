//! Monthly review buckets and the purge loop that reclaims old ones.
//!
//! Reads always filter on the current bucket key, so a review from a past
//! month is invisible the moment the month turns. Purging only frees the
//! storage.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::clock::Clock;
use crate::db::ReviewStore;
use crate::Result;

/// `YYYY-MM` key of the UTC month containing `at`.
pub fn bucket_key(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// Midnight UTC on the first day of the month after `now`.
pub fn next_month_start(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    let midnight = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

#[derive(Clone)]
pub struct ReviewRotation {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
}

impl ReviewRotation {
    pub fn new(store: Arc<dyn ReviewStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn current_bucket_key(&self) -> String {
        bucket_key(self.clock.now())
    }

    /// Delete every review outside the current bucket in one bulk call.
    pub async fn purge_expired(&self) -> Result<u64> {
        let current = self.current_bucket_key();
        let removed = self.store.delete_reviews_outside(&current).await?;
        info!("Purged {} review(s) outside {}", removed, current);
        Ok(removed)
    }
}

/// Handle to the background purge loop.
pub struct PurgeTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PurgeTask {
    /// Stop future wake-ups and wait for the loop to exit. A purge already
    /// in flight runs to completion first.
    pub async fn shutdown(self) -> std::result::Result<(), JoinError> {
        self.cancel.cancel();
        self.handle.await
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Purge once now, then again at the start of every UTC month until
/// `cancel` fires.
pub fn spawn_purge_task(rotation: ReviewRotation, cancel: CancellationToken) -> PurgeTask {
    let handle = tokio::spawn(run_loop(rotation, cancel.clone()));
    PurgeTask { cancel, handle }
}

async fn run_loop(rotation: ReviewRotation, cancel: CancellationToken) {
    info!("Monthly review purge started");

    while !cancel.is_cancelled() {
        // A failed run waits for the next boundary like a successful one.
        if let Err(e) = rotation.purge_expired().await {
            error!("Review purge failed: {}", e);
        }

        let now = rotation.now();
        let Some(next) = next_month_start(now) else {
            error!("Cannot compute the month after {}; purge loop stopping", now);
            return;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        info!(
            "Next review purge scheduled for {} UTC (in {:.2} hours)",
            next.format("%Y-%m-%d %H:%M:%S"),
            wait.as_secs_f64() / 3600.0
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {},
            _ = cancel.cancelled() => break,
        }
    }

    info!("Monthly review purge stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::{MemoryStore, Review};
    use crate::error::{AppError, DatabaseError};
    use async_trait::async_trait;
    use mockall::{mock, predicate::eq};

    mock! {
        Store {}

        #[async_trait]
        impl ReviewStore for Store {
            async fn create_review(&self, review: &Review) -> Result<Review>;
            async fn get_reviews(&self, subject_reg_number: &str, month_year: &str) -> Result<Vec<Review>>;
            async fn delete_reviews_outside(&self, month_year: &str) -> Result<u64>;
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn review(subject: &str, month_year: &str) -> Review {
        Review::new("R1".into(), subject.into(), "helpful".into(), 4, month_year.into(), Utc::now())
    }

    #[test]
    fn test_bucket_key_format() {
        assert_eq!(bucket_key(at(2024, 1, 5, 0, 0, 0)), "2024-01");
        assert_eq!(bucket_key(at(2024, 12, 31, 23, 59, 59)), "2024-12");
        assert_eq!(bucket_key(at(987, 3, 1, 0, 0, 0)), "0987-03");
    }

    #[test]
    fn test_current_bucket_key_follows_the_month() {
        let clock = Arc::new(ManualClock::new(at(2024, 1, 1, 0, 0, 0)));
        let rotation = ReviewRotation::new(Arc::new(MemoryStore::new()), clock.clone());

        let first = rotation.current_bucket_key();
        clock.set(at(2024, 1, 31, 23, 59, 59));
        assert_eq!(rotation.current_bucket_key(), first);

        clock.set(at(2024, 2, 1, 0, 0, 0));
        assert_ne!(rotation.current_bucket_key(), first);
        assert_eq!(rotation.current_bucket_key(), "2024-02");
    }

    #[test]
    fn test_next_month_start() {
        assert_eq!(
            next_month_start(at(2024, 1, 15, 10, 30, 0)),
            Some(at(2024, 2, 1, 0, 0, 0))
        );
        assert_eq!(
            next_month_start(at(2024, 12, 31, 23, 59, 59)),
            Some(at(2025, 1, 1, 0, 0, 0))
        );
        // Exactly on a boundary schedules the following one.
        assert_eq!(
            next_month_start(at(2024, 3, 1, 0, 0, 0)),
            Some(at(2024, 4, 1, 0, 0, 0))
        );
    }

    #[tokio::test]
    async fn test_purge_removes_previous_months() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(at(2024, 1, 20, 9, 0, 0)));
        let rotation = ReviewRotation::new(store.clone(), clock.clone());

        store.create_review(&review("21BCE0002", "2024-01")).await.unwrap();
        assert_eq!(rotation.purge_expired().await.unwrap(), 0);

        clock.set(at(2024, 2, 1, 0, 0, 0));
        assert_eq!(rotation.purge_expired().await.unwrap(), 1);
        assert!(store.get_reviews("21BCE0002", "2024-02").await.unwrap().is_empty());
        assert_eq!(store.review_count().await, 0);
    }

    #[tokio::test]
    async fn test_purge_passes_current_bucket_to_store() {
        let mut store = MockStore::new();
        store
            .expect_delete_reviews_outside()
            .with(eq("2024-07"))
            .times(1)
            .returning(|_| Ok(3));

        let clock = Arc::new(ManualClock::new(at(2024, 7, 4, 12, 0, 0)));
        let rotation = ReviewRotation::new(Arc::new(store), clock);

        assert_eq!(rotation.purge_expired().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_purge_task_runs_at_startup_and_stops_cleanly() {
        let store = Arc::new(MemoryStore::new());
        store.create_review(&review("21BCE0002", "2024-01")).await.unwrap();
        store.create_review(&review("21BCE0002", "2024-02")).await.unwrap();

        let clock = Arc::new(ManualClock::new(at(2024, 2, 10, 8, 0, 0)));
        let rotation = ReviewRotation::new(store.clone(), clock);
        let task = spawn_purge_task(rotation, CancellationToken::new());

        for _ in 0..100 {
            if store.review_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.review_count().await, 1);
        assert!(!task.is_finished());

        assert!(task.shutdown().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_runs_again_at_month_boundary() {
        let store = Arc::new(MemoryStore::new());
        store.create_review(&review("21BCE0002", "2023-12")).await.unwrap();
        store.create_review(&review("21BCE0002", "2024-01")).await.unwrap();

        let clock = Arc::new(ManualClock::new(at(2024, 1, 31, 23, 0, 0)));
        let rotation = ReviewRotation::new(store.clone(), clock.clone());
        let task = spawn_purge_task(rotation, CancellationToken::new());

        // Startup purge drops December; the loop is then asleep until Feb 1.
        for _ in 0..100 {
            if store.review_count().await == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(store.review_count().await, 1);

        tokio::time::advance(Duration::from_secs(30 * 60)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.review_count().await, 1);

        clock.set(at(2024, 2, 1, 0, 0, 5));
        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        for _ in 0..100 {
            if store.review_count().await == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(store.review_count().await, 0);
        assert!(!task.is_finished());

        assert!(task.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_purge_waits_for_next_boundary() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut store = MockStore::new();
        store
            .expect_delete_reviews_outside()
            .times(1)
            .returning(move |_| {
                let _ = tx.send(());
                Err(AppError::DatabaseError(DatabaseError::ConnectionError(
                    "connection refused".into(),
                )))
            });

        let clock = Arc::new(ManualClock::new(at(2024, 5, 2, 0, 0, 0)));
        let rotation = ReviewRotation::new(Arc::new(store), clock);
        let task = spawn_purge_task(rotation, CancellationToken::new());

        rx.recv().await.expect("purge was never attempted");
        // An immediate retry would hit the mock a second time and panic.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        assert!(task.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_purges() {
        let mut store = MockStore::new();
        store.expect_delete_reviews_outside().never();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let clock = Arc::new(ManualClock::new(at(2024, 5, 2, 0, 0, 0)));
        let task = spawn_purge_task(ReviewRotation::new(Arc::new(store), clock), cancel);
        assert!(task.shutdown().await.is_ok());
    }
}
