//! Injectable timers for pollers.
//!
//! Production uses [`TokioScheduler`]. Tests use [`ManualScheduler`] and
//! deliver ticks explicitly.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use {
    async_trait::async_trait,
    tokio::{
        sync::mpsc,
        time::{Instant, Interval, MissedTickBehavior},
    },
};

/// A running schedule.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. `false` means the schedule has ended.
    async fn tick(&mut self) -> bool;
}

pub trait Scheduler: Send + Sync {
    /// Start a schedule ticking every `period`. The first tick comes one
    /// full period after the call.
    fn every(&self, period: Duration) -> Box<dyn Ticker>;
}

// ── Tokio ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

struct IntervalTicker(Interval);

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.0.tick().await;
        true
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration) -> Box<dyn Ticker> {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        // A slow cycle does not cause a burst of catch-up ticks.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Box::new(IntervalTicker(interval))
    }
}

// ── Manual ───────────────────────────────────────────────────────────────────

/// Scheduler whose ticks are fired by hand.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    tickers: Mutex<Vec<mpsc::UnboundedSender<()>>>,
}

struct ManualTicker(mpsc::UnboundedReceiver<()>);

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.0.recv().await.is_some()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire one tick on every live schedule. Returns how many received it.
    pub fn advance(&self) -> usize {
        let mut tickers = self.tickers.lock().unwrap_or_else(PoisonError::into_inner);
        tickers.retain(|tx| tx.send(()).is_ok());
        tickers.len()
    }

    /// Number of schedules still listening.
    pub fn active(&self) -> usize {
        let mut tickers = self.tickers.lock().unwrap_or_else(PoisonError::into_inner);
        tickers.retain(|tx| !tx.is_closed());
        tickers.len()
    }

    /// End every schedule.
    pub fn stop(&self) {
        self.tickers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, _period: Duration) -> Box<dyn Ticker> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tickers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Box::new(ManualTicker(rx))
    }
}
