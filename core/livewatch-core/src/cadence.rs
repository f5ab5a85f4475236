//! Poller scheduling.
//!
//! A [`Cadence`] is the shared on/off switch for one poller. The drive loop
//! owns a [`Ticker`] per cadence and only polls it while the cadence runs.
//! Resuming a cadence restarts its ticker, so the first tick after a resume
//! lands one full period later.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

#[derive(Debug)]
pub struct Cadence {
    name: &'static str,
    period: Duration,
    running: AtomicBool,
    closed: AtomicBool,
    epoch: AtomicU64,
}

impl Cadence {
    /// Creates a paused cadence.
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pauses the cadence. Returns false if it was already paused.
    pub fn pause(&self) -> bool {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        if was_running {
            tracing::debug!(cadence = self.name, "Cadence paused");
        }
        was_running
    }

    /// Resumes the cadence. Returns false if it was already running or closed.
    pub fn resume(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        let was_running = self.running.swap(true, Ordering::SeqCst);
        if !was_running {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                cadence = self.name,
                period_secs = self.period.as_secs(),
                "Cadence resumed"
            );
        }
        !was_running
    }

    /// Pauses permanently; later `resume` calls are refused.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pause();
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

/// Timer half of a cadence, owned by the drive loop.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
    seen_epoch: u64,
}

impl Ticker {
    pub fn new(cadence: &Cadence) -> Self {
        let mut interval = time::interval_at(Instant::now() + cadence.period(), cadence.period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            seen_epoch: cadence.epoch(),
        }
    }

    /// Waits for the next scheduled tick of `cadence`.
    pub async fn tick(&mut self, cadence: &Cadence) {
        let epoch = cadence.epoch();
        if epoch != self.seen_epoch {
            self.seen_epoch = epoch;
            self.interval.reset();
        }
        self.interval.tick().await;
    }
}
