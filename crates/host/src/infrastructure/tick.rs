//! Reconciliation tick.
//!
//! The connection table is polled rather than pushed, so the host loop wakes
//! on a tick. The source is injectable: a real interval in production, a
//! hand-driven one in tests.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

#[async_trait]
pub trait TickSource: Send {
    /// Resolve at the next tick.
    async fn tick(&mut self);
}

pub struct IntervalTick {
    interval: Interval,
}

impl IntervalTick {
    /// Tick every `period`, starting immediately. Missed ticks are skipped.
    pub fn every(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl TickSource for IntervalTick {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Tick source driven through a [`ManualTicker`].
pub struct ManualTick {
    rx: mpsc::UnboundedReceiver<()>,
}

#[derive(Clone)]
pub struct ManualTicker {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTick {
    pub fn new() -> (Self, ManualTicker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTicker { tx })
    }
}

impl ManualTicker {
    pub fn tick(&self) {
        let _ = self.tx.send(());
    }
}

#[async_trait]
impl TickSource for ManualTick {
    async fn tick(&mut self) {
        if self.rx.recv().await.is_none() {
            // every ticker dropped: never tick again
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_tick_waits_for_the_ticker() {
        let (mut tick, ticker) = ManualTick::new();
        ticker.tick();
        tokio::time::timeout(Duration::from_millis(100), tick.tick())
            .await
            .unwrap();
        assert!(tokio::time::timeout(Duration::from_millis(20), tick.tick())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn interval_tick_fires_immediately_then_every_period() {
        let mut tick = IntervalTick::every(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_millis(500), tick.tick())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), tick.tick())
            .await
            .unwrap();
    }
}
