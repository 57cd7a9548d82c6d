//! Background reminder loop.
//!
//! One scan runs at spawn, then one per `scan_interval`. A failed scan is
//! logged and the next one runs after the shorter `retry_interval`; the loop
//! itself only ends on shutdown.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::sink::{dispatch, NotificationSink};
use super::{ReminderEvent, ReminderScan, ScanOutcome};
use crate::config::ReminderConfig;
use crate::store::{SharedTaskStore, StoreError};
use crate::task::NodeRef;

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A scan iteration that failed without touching the forest.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Reminder scan panicked: {0}")]
    Panicked(String),

    #[error("Reminder scan timed out after {0:?}")]
    TimedOut(Duration),
}

pub struct ReminderScheduler {
    store: SharedTaskStore,
    sink: Arc<dyn NotificationSink>,
    config: ReminderConfig,
    clock: Clock,
}

impl ReminderScheduler {
    pub fn new(
        store: SharedTaskStore,
        sink: Arc<dyn NotificationSink>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            sink,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock (tests, simulations).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Start the background loop.
    pub fn spawn(self) -> ReminderHandle {
        let cancel = CancellationToken::new();
        let worker = Worker {
            store: Arc::clone(&self.store),
            sink: Arc::clone(&self.sink),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            scan: ReminderScan::new(local_date((self.clock)())),
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(worker.run());

        ReminderHandle {
            store: self.store,
            sink: self.sink,
            clock: self.clock,
            shutdown_grace: self.config.shutdown_grace,
            cancel,
            join,
        }
    }
}

fn local_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Local).date_naive()
}

struct Worker {
    store: SharedTaskStore,
    sink: Arc<dyn NotificationSink>,
    config: ReminderConfig,
    clock: Clock,
    scan: ReminderScan,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(mut self) {
        tracing::info!(
            "Reminder scheduler started: every {:?}, retry after {:?}",
            self.config.scan_interval,
            self.config.retry_interval
        );

        loop {
            let delay = match self.scan_once().await {
                Ok(outcome) => {
                    tracing::debug!(
                        events = outcome.events.len(),
                        day_rolled_over = outcome.day_rolled_over,
                        "Reminder scan finished"
                    );
                    self.config.scan_interval
                }
                Err(e) => {
                    tracing::error!(
                        "{}; retrying in {:?}",
                        e,
                        self.config.retry_interval
                    );
                    self.config.retry_interval
                }
            };

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Reminder scheduler stopped");
    }

    /// One pass. Scan state is only committed when the pass succeeds.
    async fn scan_once(&mut self) -> Result<ScanOutcome, ScanError> {
        let mut next = self.scan.clone();
        let store = &self.store;
        let clock = &self.clock;

        let pass = AssertUnwindSafe(async {
            let now = clock();
            let today = local_date(now);
            store
                .read(|forest| next.evaluate(forest.iter(), now, today))
                .await
        })
        .catch_unwind();

        let outcome = match tokio::time::timeout(self.config.scan_timeout, pass).await {
            Err(_) => return Err(ScanError::TimedOut(self.config.scan_timeout)),
            Ok(Err(panic)) => return Err(ScanError::Panicked(panic_message(panic))),
            Ok(Ok(outcome)) => outcome,
        };

        self.scan = next;
        if outcome.day_rolled_over {
            tracing::info!(
                "New day {} detected, reminding about everything due within a week",
                self.scan.last_checked_date()
            );
        }
        for event in &outcome.events {
            dispatch(&self.sink, event.notification());
        }
        Ok(outcome)
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle to the running scheduler; also serves on-demand reminders.
pub struct ReminderHandle {
    store: SharedTaskStore,
    sink: Arc<dyn NotificationSink>,
    clock: Clock,
    shutdown_grace: Duration,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ReminderHandle {
    /// Reminder for one task right now, independent of scan state.
    pub async fn reminder_for(
        &self,
        node: impl Into<NodeRef>,
    ) -> Result<ReminderEvent, StoreError> {
        let task = self.store.resolve(node).await?;
        Ok(ReminderEvent::for_task(&task, (self.clock)())?)
    }

    /// Like [`reminder_for`](Self::reminder_for), and also send it to the sink.
    pub async fn notify_now(&self, node: impl Into<NodeRef>) -> Result<ReminderEvent, StoreError> {
        let event = self.reminder_for(node).await?;
        dispatch(&self.sink, event.on_demand_notification());
        Ok(event)
    }

    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop scheduling scans. An in-flight scan gets `shutdown_grace` to
    /// finish before it is abandoned.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        match tokio::time::timeout(self.shutdown_grace, &mut self.join).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Reminder scheduler task ended abnormally: {}", e),
            Err(_) => {
                tracing::warn!(
                    "Reminder scheduler did not stop within {:?}, abandoning it",
                    self.shutdown_grace
                );
                self.join.abort();
            }
        }
    }
}
