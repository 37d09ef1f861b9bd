//! Adaptive poll scheduler
//!
//! One background task per platform. Each tick is awaited to completion
//! before the next one is scheduled, so ticks never overlap. Recording
//! activity (after a successful move) cancels the pending timer and
//! reschedules at the freshly selected interval.

use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

/// Idle and fast cadences plus how long the fast one lasts after activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub idle: Duration,
    pub fast: Duration,
    pub fast_window: Duration,
}

impl PollIntervals {
    /// Interval for the next tick given the time since the last activity
    pub fn select(&self, since_activity: Option<Duration>) -> Duration {
        match since_activity {
            Some(elapsed) if elapsed < self.fast_window => self.fast,
            _ => self.idle,
        }
    }
}

/// Last write activity and the restart signal for the poll loop
#[derive(Debug, Default)]
pub struct ActivityClock {
    last_activity: Mutex<Option<Instant>>,
    restart: Notify,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark activity now and restart polling
    pub fn record_activity(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.request_restart();
    }

    pub fn last_activity(&self) -> Option<Instant> {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn since_last_activity(&self) -> Option<Duration> {
        self.last_activity().map(|at| at.elapsed())
    }

    /// Cancel the pending tick; the loop reschedules immediately.
    /// A request made while a tick runs applies once it completes.
    pub fn request_restart(&self) {
        self.restart.notify_one();
    }

    async fn restarted(&self) {
        self.restart.notified().await;
    }
}

/// Work performed on each scheduled tick
#[async_trait]
pub trait PollTarget: Send + Sync {
    async fn poll_once(&self) -> Result<()>;
}

/// Handle to the running poll loop
#[derive(Debug)]
pub struct PollScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    ticks: Arc<AtomicU64>,
    activity: Arc<ActivityClock>,
    intervals: PollIntervals,
    logger: StructuredLogger,
}

impl PollScheduler {
    /// Spawn the poll loop. The first tick runs one interval after start.
    pub fn start(
        target: Arc<dyn PollTarget>,
        activity: Arc<ActivityClock>,
        intervals: PollIntervals,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU64::new(0));
        let logger = get_logger("scheduler");
        logger.info(&format!(
            "Starting poller (idle {:?}, fast {:?} for {:?} after activity)",
            intervals.idle, intervals.fast, intervals.fast_window
        ));

        let handle = tokio::spawn(run_loop(
            target,
            Arc::clone(&activity),
            intervals,
            shutdown_rx,
            Arc::clone(&ticks),
            logger.clone(),
        ));

        Self {
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
            ticks,
            activity,
            intervals,
            logger,
        }
    }

    pub fn intervals(&self) -> PollIntervals {
        self.intervals
    }

    /// Interval the loop would pick if it rescheduled now
    pub fn current_interval(&self) -> Duration {
        self.intervals.select(self.activity.since_last_activity())
    }

    pub fn restart(&self) {
        self.activity.request_restart();
    }

    /// Completed ticks, failed ones included
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Stop the loop and wait for it; a tick in progress finishes first
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };
        if let Err(e) = handle.await {
            self.logger.error(&format!("Poll task ended abnormally: {}", e));
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

async fn run_loop(
    target: Arc<dyn PollTarget>,
    activity: Arc<ActivityClock>,
    intervals: PollIntervals,
    mut shutdown: watch::Receiver<bool>,
    ticks: Arc<AtomicU64>,
    logger: StructuredLogger,
) {
    loop {
        let interval = intervals.select(activity.since_last_activity());

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = activity.restarted() => {
                logger.debug("Polling restarted");
                continue;
            }
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        if let Err(e) = target.poll_once().await {
            logger.warn(&format!("Poll tick failed: {}", e));
        }
        ticks.fetch_add(1, Ordering::Relaxed);
    }
    logger.info("Poller stopped");
}
