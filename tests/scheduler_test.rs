use async_trait::async_trait;
use powershades::error::Result;
use powershades::platform::{ActivityClock, PollIntervals, PollScheduler, PollTarget};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
struct CountingTarget {
    ticks: AtomicU64,
}

impl CountingTarget {
    fn count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PollTarget for CountingTarget {
    async fn poll_once(&self) -> Result<()> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Target whose tick takes a while and records activity halfway through
struct SlowTarget {
    activity: Arc<ActivityClock>,
    ticks: AtomicU64,
}

#[async_trait]
impl PollTarget for SlowTarget {
    async fn poll_once(&self) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if self.ticks.fetch_add(1, Ordering::SeqCst) == 0 {
            self.activity.record_activity();
        }
        Ok(())
    }
}

fn intervals() -> PollIntervals {
    PollIntervals {
        idle: Duration::from_secs(10),
        fast: Duration::from_secs(1),
        fast_window: Duration::from_secs(5),
    }
}

#[tokio::test(start_paused = true)]
async fn fast_cadence_lasts_for_the_window_after_activity() {
    let target = Arc::new(CountingTarget::default());
    let activity = Arc::new(ActivityClock::new());
    let scheduler = PollScheduler::start(target.clone(), Arc::clone(&activity), intervals());
    activity.record_activity();

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(target.count(), 3);
    assert_eq!(scheduler.current_interval(), Duration::from_secs(1));

    // Ticks at 4 s and 5 s, then the idle interval applies
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(target.count(), 5);
    assert_eq!(scheduler.current_interval(), Duration::from_secs(10));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(target.count(), 6);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn activity_cancels_the_pending_idle_tick() {
    let target = Arc::new(CountingTarget::default());
    let activity = Arc::new(ActivityClock::new());
    let scheduler = PollScheduler::start(target.clone(), Arc::clone(&activity), intervals());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(target.count(), 0);
    activity.record_activity();

    // Rescheduled at the fast interval instead of waiting out the idle one
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(target.count(), 1);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn restart_without_activity_reschedules_at_idle() {
    let target = Arc::new(CountingTarget::default());
    let activity = Arc::new(ActivityClock::new());
    let scheduler = PollScheduler::start(target.clone(), activity, intervals());

    tokio::time::sleep(Duration::from_secs(6)).await;
    scheduler.restart();

    // The pending tick at 10 s moved to 16 s
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(target.count(), 0);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(target.count(), 1);

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn ticks_never_overlap_and_activity_during_a_tick_applies_after_it() {
    let activity = Arc::new(ActivityClock::new());
    let target = Arc::new(SlowTarget {
        activity: Arc::clone(&activity),
        ticks: AtomicU64::new(0),
    });
    let scheduler = PollScheduler::start(target.clone(), Arc::clone(&activity), intervals());

    // First tick runs 10 s .. 10.5 s and records activity
    tokio::time::sleep(Duration::from_millis(10_250)).await;
    assert_eq!(target.ticks.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(target.ticks.load(Ordering::SeqCst), 1);

    // Next tick starts one fast interval after the first completed
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(target.ticks.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.tick_count(), 2);

    scheduler.stop().await;
}
