//! The polling worker: a periodic full sweep over every feed plus a bounded
//! priority queue for immediate re-sync, sharing one per-feed pipeline.
//!
//! Two long-lived tasks are spawned by [`PollingWorker::start`]: the sweep
//! driver (interval timer, first tick immediate) and the priority-queue
//! consumer. Interval gating lives in the sweep loop only: the queue
//! consumer calls the per-feed pipeline directly, so explicitly requested
//! feeds always run. That bypass is intentional, not an accident of layering.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::feed::FeedFetcher;
use crate::storage::{Feed, FeedStore, NewArticle, StoreError};
use crate::wallabag::DeliveryClient;

/// Capacity of the priority queue. Overflow drops the request with a
/// warning; the feed is still reached by the next scheduled sweep.
pub const PRIORITY_QUEUE_CAPACITY: usize = 100;

/// Upper bound on processing one priority-queued feed.
const PRIORITY_ITEM_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker already started")]
    AlreadyStarted,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one article in the per-feed loop. Errors are isolated per
/// article; they never abort the rest of the feed's cycle.
enum ArticleOutcome {
    Delivered,
    AlreadyProcessed,
    Failed,
}

/// Handle for the two background tasks. `stop` closes the sweep loop and
/// the consumer; enqueues arriving after that are inert.
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    sweep: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl WorkerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.sweep.await;
        let _ = self.consumer.await;
        info!("Polling worker stopped");
    }
}

/// Orchestrates store, fetcher and delivery client, on a schedule and on
/// demand.
pub struct PollingWorker<S, F, D> {
    inner: Arc<WorkerInner<S, F, D>>,
    queue_tx: mpsc::Sender<i64>,
    queue_rx: Mutex<Option<mpsc::Receiver<i64>>>,
}

struct WorkerInner<S, F, D> {
    store: S,
    fetcher: F,
    delivery: D,
}

impl<S, F, D> PollingWorker<S, F, D>
where
    S: FeedStore + 'static,
    F: FeedFetcher + 'static,
    D: DeliveryClient + 'static,
{
    pub fn new(store: S, fetcher: F, delivery: D) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(PRIORITY_QUEUE_CAPACITY);
        Self {
            inner: Arc::new(WorkerInner {
                store,
                fetcher,
                delivery,
            }),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
        }
    }

    /// Spawn the sweep driver and the priority-queue consumer.
    ///
    /// The sweep period is the store's global default interval, read once
    /// here; operator changes apply on the next restart. The first sweep
    /// runs immediately.
    pub async fn start(&self) -> Result<WorkerHandle, WorkerError> {
        let mut queue_rx = self
            .queue_rx
            .lock()
            .await
            .take()
            .ok_or(WorkerError::AlreadyStarted)?;

        let minutes = self.inner.store.get_default_poll_interval().await?;
        let period = Duration::from_secs(minutes.max(1) as u64 * 60);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sweep = {
            let inner = Arc::clone(&self.inner);
            let mut shutdown = shutdown_rx.clone();
            let cancel = shutdown_rx.clone();
            tokio::spawn(async move {
                info!(period_minutes = minutes, "Sweep driver started");
                let mut timer = tokio::time::interval(period);
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            debug!("Sweep driver shutting down");
                            break;
                        }
                        _ = timer.tick() => {
                            inner.sweep(&cancel).await;
                        }
                    }
                }
            })
        };

        let consumer = {
            let inner = Arc::clone(&self.inner);
            let mut shutdown = shutdown_rx.clone();
            let cancel = shutdown_rx;
            tokio::spawn(async move {
                debug!("Priority queue consumer started");
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            debug!("Priority queue consumer shutting down");
                            break;
                        }
                        item = queue_rx.recv() => {
                            let Some(feed_id) = item else { break };
                            inner.process_queued(feed_id, &cancel).await;
                        }
                    }
                }
            })
        };

        Ok(WorkerHandle {
            shutdown_tx,
            sweep,
            consumer,
        })
    }

    /// Fire-and-forget request to process one feed out of schedule.
    ///
    /// Never blocks: a full queue drops the request with a warning.
    pub fn queue_feed(&self, feed_id: i64) {
        match self.queue_tx.try_send(feed_id) {
            Ok(()) => debug!(feed_id, "Feed queued for immediate sync"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(feed_id, "Priority queue full, dropping immediate sync request");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(feed_id, "Worker stopped, ignoring immediate sync request");
            }
        }
    }

    /// Queue every known feed for immediate processing, best-effort.
    ///
    /// Stops once the queue is full; how many made it in is reported via
    /// logs, not the return value.
    pub async fn queue_all_feeds(&self) -> Result<(), StoreError> {
        let feeds = self.inner.store.get_feeds().await?;
        let total = feeds.len();
        let mut queued = 0usize;
        for feed in feeds {
            match self.queue_tx.try_send(feed.id) {
                Ok(()) => queued += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(queued, total, "Priority queue filled before all feeds were queued");
                    break;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Worker stopped, ignoring sync-all request");
                    break;
                }
            }
        }
        info!(queued, total, "Queued feeds for immediate sync");
        Ok(())
    }
}

impl<S, F, D> WorkerInner<S, F, D>
where
    S: FeedStore,
    F: FeedFetcher,
    D: DeliveryClient,
{
    /// One pass over every feed, polling those that are due.
    async fn sweep(&self, cancel: &watch::Receiver<bool>) {
        debug!("Starting poll sweep");
        let feeds = match self.store.get_feeds().await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!(error = %e, "Failed to list feeds for sweep");
                return;
            }
        };

        for feed in &feeds {
            if *cancel.borrow() {
                debug!("Sweep cancelled, leaving remaining feeds for next run");
                return;
            }
            match self.is_due(feed).await {
                Ok(true) => self.process_feed(feed, cancel).await,
                Ok(false) => debug!(feed_id = feed.id, "Feed not due yet, skipping"),
                Err(e) => {
                    error!(feed_id = feed.id, error = %e, "Failed to resolve effective interval");
                }
            }
        }
    }

    /// Load and process one priority-queued feed under a time bound.
    async fn process_queued(&self, feed_id: i64, cancel: &watch::Receiver<bool>) {
        let feed = match self.store.get_feed_by_id(feed_id).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!(feed_id, error = %e, "Queued feed could not be loaded, dropping");
                return;
            }
        };

        // No gating here: an explicit request always runs.
        if tokio::time::timeout(PRIORITY_ITEM_TIMEOUT, self.process_feed(&feed, cancel))
            .await
            .is_err()
        {
            warn!(feed_id, "Priority processing timed out");
        }
    }

    /// Effective cadence for a feed: its own normalized interval when set,
    /// otherwise the global default, read fresh from the store.
    async fn effective_interval_minutes(&self, feed: &Feed) -> Result<i64, StoreError> {
        if feed.poll_interval_minutes > 0 {
            Ok(feed.poll_interval_minutes)
        } else {
            self.store.get_default_poll_interval().await
        }
    }

    async fn is_due(&self, feed: &Feed) -> Result<bool, StoreError> {
        let Some(last_fetched) = feed.last_fetched else {
            return Ok(true);
        };
        let interval = self.effective_interval_minutes(feed).await?;
        Ok(Utc::now().timestamp() - last_fetched >= interval * 60)
    }

    /// The per-feed pipeline shared by both drivers: fetch, deliver each
    /// article independently, then finalize timestamps.
    ///
    /// A fetch error aborts the cycle with no state mutated. Article-level
    /// errors are counted and skipped; undelivered articles are naturally
    /// retried next cycle because only delivered articles are recorded.
    async fn process_feed(&self, feed: &Feed, cancel: &watch::Receiver<bool>) {
        let fetched = if feed.initial_sync_done {
            self.fetcher.fetch(&feed.url).await
        } else {
            self.fetcher
                .fetch_with_sync_options(
                    &feed.url,
                    feed.sync_mode,
                    feed.sync_count,
                    feed.sync_date_from,
                )
                .await
        };

        let articles = match fetched {
            Ok(articles) => articles,
            Err(e) => {
                warn!(feed_id = feed.id, error = %e, "Feed fetch failed, skipping this cycle");
                return;
            }
        };

        let mut delivered = 0usize;
        let mut already = 0usize;
        let mut errors = 0usize;

        for article in &articles {
            if *cancel.borrow() {
                debug!(feed_id = feed.id, "Cancelled mid-feed, committed articles remain");
                return;
            }
            match self.deliver_article(feed, article).await {
                ArticleOutcome::Delivered => delivered += 1,
                ArticleOutcome::AlreadyProcessed => already += 1,
                ArticleOutcome::Failed => errors += 1,
            }
        }

        // Finalize, best-effort: a failure here only means the feed comes
        // up due again sooner than intended.
        if let Err(e) = self.store.update_feed_last_fetched(feed.id).await {
            warn!(feed_id = feed.id, error = %e, "Failed to update last_fetched");
        }
        if !feed.initial_sync_done {
            if let Err(e) = self.store.mark_feed_initial_sync_done(feed.id).await {
                warn!(feed_id = feed.id, error = %e, "Failed to mark initial sync done");
            }
        }

        info!(
            feed_id = feed.id,
            feed = %feed.url,
            fetched = articles.len(),
            delivered,
            already_processed = already,
            errors,
            "Feed cycle complete"
        );
    }

    async fn deliver_article(&self, feed: &Feed, article: &NewArticle) -> ArticleOutcome {
        match self.store.is_article_processed(&article.url).await {
            Err(e) => {
                warn!(url = %article.url, error = %e, "Dedup check failed, skipping article");
                return ArticleOutcome::Failed;
            }
            // Expected steady state: most of a feed's items are already
            // delivered on any non-initial poll.
            Ok(true) => {
                debug!(url = %article.url, "Article already delivered");
                return ArticleOutcome::AlreadyProcessed;
            }
            Ok(false) => {}
        }

        let entry = match self.delivery.submit(&article.url).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(url = %article.url, error = %e, "Delivery failed, article retried next cycle");
                return ArticleOutcome::Failed;
            }
        };

        match self
            .store
            .save_article(feed.id, article, Some(entry.id))
            .await
        {
            Ok(()) => {
                debug!(url = %article.url, entry_id = entry.id, "Article delivered");
                ArticleOutcome::Delivered
            }
            Err(e) => {
                // The entry exists remotely but not locally; the next cycle
                // may re-deliver it. Accepted at-least-once tradeoff.
                warn!(url = %article.url, error = %e, "Delivered but failed to record article");
                ArticleOutcome::Failed
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
