// Polling scheduler implementation

use crate::clock::Clock;
use crate::db::EventStore;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::errors::StoreError;
use crate::models::Event;
use crate::telemetry;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often to poll for due events (in seconds)
    pub poll_interval_seconds: u64,
    /// Maximum number of events dispatched at once within a pass
    pub dispatch_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 60,
            dispatch_concurrency: 1,
        }
    }
}

impl From<&crate::config::SchedulerConfig> for SchedulerConfig {
    fn from(config: &crate::config::SchedulerConfig) -> Self {
        Self {
            poll_interval_seconds: config.poll_interval_seconds.max(1),
            dispatch_concurrency: config.dispatch_concurrency.max(1),
        }
    }
}

/// Whether a polling pass is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Polling,
}

/// Tally of one polling pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub store_errors: usize,
    /// The pass did not run because another one was in flight
    pub busy: bool,
}

impl PollReport {
    fn busy() -> Self {
        Self {
            busy: true,
            ..Self::default()
        }
    }

    fn record(&mut self, result: Result<DispatchOutcome, StoreError>) {
        match result {
            Ok(DispatchOutcome::Sent) => self.sent += 1,
            Ok(DispatchOutcome::Failed(_)) => self.failed += 1,
            Ok(DispatchOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.store_errors += 1,
        }
    }
}

/// Scheduler trait for the polling lifecycle
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Run the polling loop until `stop` is called
    async fn start(&self) -> anyhow::Result<()>;

    /// Ask the polling loop to exit after the in-flight pass
    async fn stop(&self);

    /// Run a single polling pass
    async fn poll_once(&self) -> Result<PollReport, StoreError>;
}

/// Resets the polling flag when a pass ends, including on early return
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Timer-driven scheduler that dispatches due events
pub struct PollingScheduler {
    config: SchedulerConfig,
    store: Arc<dyn EventStore>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    polling: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl PollingScheduler {
    /// Create a new polling scheduler
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn EventStore>,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);

        // tokio intervals cannot be zero
        let config = SchedulerConfig {
            poll_interval_seconds: config.poll_interval_seconds.max(1),
            dispatch_concurrency: config.dispatch_concurrency.max(1),
        };

        Self {
            config,
            store,
            dispatcher,
            clock,
            polling: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.polling.load(Ordering::Acquire) {
            SchedulerState::Polling
        } else {
            SchedulerState::Idle
        }
    }

    async fn dispatch_all(&self, due: &[Event]) -> PollReport {
        let mut report = PollReport {
            due: due.len(),
            ..PollReport::default()
        };

        if self.config.dispatch_concurrency <= 1 {
            for event in due {
                report.record(self.dispatch_one(event).await);
            }
        } else {
            // Each event appears once in `due`, so none is sent twice at once
            let results: Vec<_> = stream::iter(due.to_vec())
                .map(|event| async move { self.dispatch_one(&event).await })
                .buffer_unordered(self.config.dispatch_concurrency)
                .collect()
                .await;
            for result in results {
                report.record(result);
            }
        }

        report
    }

    async fn dispatch_one(&self, event: &Event) -> Result<DispatchOutcome, StoreError> {
        let result = self.dispatcher.dispatch(event).await;
        if let Err(e) = &result {
            // Continue with the rest of the batch
            error!(event_id = %event.id, error = %e, "Failed to record dispatch outcome");
        }
        result
    }
}

#[async_trait]
impl Scheduler for PollingScheduler {
    #[instrument(skip(self))]
    async fn start(&self) -> anyhow::Result<()> {
        info!(
            poll_interval_seconds = self.config.poll_interval_seconds,
            dispatch_concurrency = self.config.dispatch_concurrency,
            timezone = %self.clock.timezone(),
            "Starting polling scheduler"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_seconds));
        // Ticks that elapse during a long pass are dropped, not queued
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !*shutdown_rx.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(report) if report.due > 0 => {
                            info!(
                                due = report.due,
                                sent = report.sent,
                                failed = report.failed,
                                skipped = report.skipped,
                                store_errors = report.store_errors,
                                "Polling pass finished"
                            );
                        }
                        Ok(_) => debug!("No events due"),
                        Err(e) => error!(error = %e, "Polling pass abandoned"),
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Polling scheduler stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) {
        info!("Stopping polling scheduler");
        self.shutdown_tx.send_replace(true);
    }

    #[instrument(skip(self))]
    async fn poll_once(&self) -> Result<PollReport, StoreError> {
        if self
            .polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous polling pass still running, skipping");
            return Ok(PollReport::busy());
        }
        let _guard = PassGuard(&self.polling);

        let now = self.clock.now();
        debug!(now = %self.clock.now_local(), "Polling for due events");

        let due = self.store.select_due(now).await?;
        telemetry::update_due_events(due.len());

        Ok(self.dispatch_all(&due).await)
    }
}
