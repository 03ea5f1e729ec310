//! Simulated upload progress
//!
//! The restore endpoint gives no progress feedback, so the percentage shown
//! while a restore is in flight is a local approximation: a tokio task adds
//! `step` every `interval` and stops at `cap`. The caller sets the final value
//! (100 on success, 0 on failure) after [`ProgressTicker::stop`] returns, so a
//! late tick can never overwrite it.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::{AbortHandle, JoinHandle},
    time::{Instant, interval_at},
};
use tracing::trace;

use crate::config::{PROGRESS_CAP, PROGRESS_INTERVAL_MS, PROGRESS_STEP};

/// Timing of the simulated progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressConfig {
    /// Percent added per tick
    pub step: u8,
    /// Time between ticks
    pub interval: Duration,
    /// Progress never passes this value before the restore resolves
    pub cap: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            step: PROGRESS_STEP,
            interval: Duration::from_millis(PROGRESS_INTERVAL_MS),
            cap: PROGRESS_CAP,
        }
    }
}

/// Running ticker. Dropping it aborts the task.
#[derive(Debug)]
pub(crate) struct ProgressTicker {
    task: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// Resets progress to 0 and starts ticking. Must be called inside a tokio runtime.
    pub(crate) fn start(progress: Arc<watch::Sender<u8>>, config: ProgressConfig) -> Self {
        let step = config.step.max(1);
        let cap = config.cap.min(100);
        let period = config.interval.max(Duration::from_millis(1));
        progress.send_replace(0);

        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;
                let mut reached_cap = false;
                progress.send_modify(|value| {
                    *value = value.saturating_add(step).min(cap);
                    reached_cap = *value >= cap;
                });
                trace!(progress = *progress.borrow(), "progress tick");
                if reached_cap {
                    break;
                }
            }
        });
        Self { task: Some(task) }
    }

    pub(crate) fn abort_handle(&self) -> Option<AbortHandle> {
        self.task.as_ref().map(JoinHandle::abort_handle)
    }

    /// Aborts the task and waits until it has exited.
    pub(crate) async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn channel() -> (Arc<watch::Sender<u8>>, watch::Receiver<u8>) {
        let (tx, rx) = watch::channel(0u8);
        (Arc::new(tx), rx)
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_ticks_step_and_cap() {
        let (tx, rx) = channel();
        let ticker = ProgressTicker::start(tx, ProgressConfig::default());

        sleep(Duration::from_millis(250)).await;
        assert_eq!(*rx.borrow(), 0);
        sleep(Duration::from_millis(500)).await;
        assert_eq!(*rx.borrow(), 10);
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(*rx.borrow(), 30);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(*rx.borrow(), 90);
        ticker.stop().await;
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_stop_prevents_further_ticks() {
        let (tx, rx) = channel();
        let ticker = ProgressTicker::start(tx.clone(), ProgressConfig::default());
        sleep(Duration::from_millis(1250)).await;
        assert_eq!(*rx.borrow(), 20);

        ticker.stop().await;
        tx.send_replace(0);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(*rx.borrow(), 0);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_drop_aborts() {
        let (tx, rx) = channel();
        let ticker = ProgressTicker::start(tx, ProgressConfig::default());
        sleep(Duration::from_millis(750)).await;
        drop(ticker);
        let value = *rx.borrow();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(*rx.borrow(), value);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_uneven_step_clamped_to_cap() {
        let (tx, rx) = channel();
        let config = ProgressConfig {
            step: 40,
            interval: Duration::from_millis(100),
            cap: 90,
        };
        let ticker = ProgressTicker::start(tx, config);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(*rx.borrow(), 90);
        ticker.stop().await;
    }
}
