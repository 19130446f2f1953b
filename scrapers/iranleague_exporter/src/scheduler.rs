use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::Result,
    fetcher::Fetcher,
    metrics::MetricsStore,
    scraper::ScheduleParser,
    types::{Match, SchedulerState, ScrapeResult},
};

/// Drives fetch -> parse -> publish on a fixed interval.
///
/// The scheduler is the only writer of its [`MetricsStore`]. Network and
/// parsing work runs on a spawned task, so a panic there is recorded as a
/// failed scrape instead of ending the loop, and the store lock is only
/// taken once the cycle has a complete result.
pub struct Scheduler {
    fetcher: Arc<Fetcher>,
    parser: Arc<ScheduleParser>,
    store: MetricsStore,
    interval: Duration,
    grace: Duration,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(fetcher: Fetcher, parser: ScheduleParser, store: MetricsStore, interval: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            fetcher: Arc::new(fetcher),
            parser: Arc::new(parser),
            store,
            interval,
            grace: Duration::from_secs(5),
            state,
        }
    }

    /// How long an in-flight cycle may keep running after shutdown is requested.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    fn set_state(&self, state: SchedulerState) {
        debug!(%state, "Scheduler state");
        self.state.send_replace(state);
    }

    fn spawn_cycle(&self) -> JoinHandle<Result<Vec<Match>>> {
        let fetcher = Arc::clone(&self.fetcher);
        let parser = Arc::clone(&self.parser);
        let state = self.state.clone();

        self.set_state(SchedulerState::Fetching);
        tokio::spawn(async move {
            let html = fetcher.fetch().await?;
            state.send_replace(SchedulerState::Parsing);
            Ok(parser.parse(&html))
        })
    }

    fn publish(
        &self,
        joined: std::result::Result<Result<Vec<Match>>, JoinError>,
        started: Instant,
    ) -> ScrapeResult {
        let result = match joined {
            Ok(Ok(matches)) => {
                self.set_state(SchedulerState::Publishing);
                ScrapeResult::succeeded(matches)
            }
            Ok(Err(e)) => {
                error!("Crawler error while updating metrics: {}", e);
                self.set_state(SchedulerState::Failed);
                ScrapeResult::failed(e.to_string())
            }
            Err(e) => {
                error!("Unexpected error updating metrics: {}", e);
                self.set_state(SchedulerState::Failed);
                ScrapeResult::failed(format!("scrape task failed: {}", e))
            }
        };

        let duration = started.elapsed();
        self.store.record(&result, duration);
        if result.success {
            debug!(
                "Updated {} metrics in {:.2} seconds",
                result.matches.len(),
                duration.as_secs_f64()
            );
        }

        self.set_state(SchedulerState::Idle);
        result
    }

    /// Runs one complete scrape cycle and publishes its outcome.
    pub async fn run_cycle(&self) -> ScrapeResult {
        info!("Updating metrics");
        let started = Instant::now();
        let joined = self.spawn_cycle().await;
        self.publish(joined, started)
    }

    /// Like [`run_cycle`](Self::run_cycle), but gives up once shutdown is
    /// requested and the grace period has passed. Returns `None` when the
    /// cycle was abandoned without touching the store.
    async fn run_cycle_until(&self, shutdown: &mut watch::Receiver<bool>) -> Option<ScrapeResult> {
        info!("Updating metrics");
        let started = Instant::now();
        let mut handle = self.spawn_cycle();

        let joined = tokio::select! {
            joined = &mut handle => joined,
            _ = shutdown_requested(shutdown) => {
                let grace = self.grace.min(self.interval);
                info!("Shutdown requested mid-cycle, waiting up to {:?}", grace);
                match tokio::time::timeout(grace, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("Abandoning in-flight scrape");
                        handle.abort();
                        self.set_state(SchedulerState::Idle);
                        return None;
                    }
                }
            }
        };

        Some(self.publish(joined, started))
    }

    /// Runs one cycle immediately, then one per interval, until `shutdown`
    /// carries `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Scheduler started - updating every {} seconds",
            self.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            if self.run_cycle_until(&mut shutdown).await.is_none() {
                break;
            }
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }
        }

        info!("Scheduler stopped");
    }
}

/// Resolves once `true` is sent or the sender is gone. The `watch::Ref`
/// returned by `wait_for` is dropped here so callers never hold the
/// channel's read lock across an await.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
