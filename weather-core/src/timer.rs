//! Clock loop that drives a [`JobRegistry`].
//!
//! The timer runs on its own OS thread so a busy request loop can never delay
//! a tick. It does not execute job actions: due actions are pushed into a
//! channel consumed by the request loop, and the timer moves on without
//! waiting for them.

use std::{sync::Arc, thread::JoinHandle, time::Duration};

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::{sync::mpsc::UnboundedSender, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::schedule::{JobHandle, JobRegistry};

/// Registry shared between the timer thread and the request loop.
pub type SharedRegistry<A> = Arc<Mutex<JobRegistry<A>>>;

/// A job action handed over to the request loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<A> {
    pub handle: JobHandle,
    pub action: A,
}

/// Run one tick: submit every job due at `now` and reschedule it.
///
/// The registry lock is released before anything is sent. Returns the number
/// of actions submitted.
pub fn tick<A: Clone>(
    registry: &Mutex<JobRegistry<A>>,
    sink: &UnboundedSender<Fired<A>>,
    now: DateTime<Utc>,
) -> usize {
    let due = registry.lock().run_pending(now);

    let mut submitted = 0;
    for (handle, action) in due {
        if sink.send(Fired { handle, action }).is_err() {
            tracing::warn!(?handle, "job runner has stopped, dropping fired job");
            continue;
        }
        tracing::debug!(?handle, "submitted due job");
        submitted += 1;
    }
    submitted
}

#[derive(Debug)]
pub struct Timer {
    token: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl Timer {
    /// Start ticking every `period` on a dedicated thread until `token` is cancelled.
    pub fn spawn<A>(
        registry: SharedRegistry<A>,
        sink: UnboundedSender<Fired<A>>,
        period: Duration,
        token: CancellationToken,
    ) -> Result<Self>
    where
        A: Clone + Send + 'static,
    {
        ensure!(!period.is_zero(), "Timer period must be longer than zero");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("Failed to build timer runtime")?;

        let loop_token = token.clone();
        let thread = std::thread::Builder::new()
            .name("scheduler-timer".into())
            .spawn(move || runtime.block_on(run_loop(registry, sink, period, loop_token)))
            .context("Failed to spawn timer thread")?;

        Ok(Self { token, thread: Some(thread) })
    }

    /// Signal the loop and wait for the thread to finish. A tick in progress
    /// completes first; no new tick starts afterwards.
    pub fn stop(mut self) {
        self.token.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("scheduler timer thread panicked");
            }
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_loop<A: Clone>(
    registry: SharedRegistry<A>,
    sink: UnboundedSender<Fired<A>>,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(?period, "scheduler timer started");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tracing::trace!("scheduler tick");
        tick(&registry, &sink, Utc::now());
    }

    tracing::info!("scheduler timer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
    }

    #[test]
    fn tick_submits_due_job_exactly_once() {
        let registry = Mutex::new(JobRegistry::new());
        let handle = registry
            .lock()
            .add_interval(Duration::from_secs(5), at(10, 0, 0), "alarm")
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert_eq!(tick(&registry, &tx, at(10, 0, 5)), 1);
        assert_eq!(rx.try_recv().unwrap(), Fired { handle, action: "alarm" });
        assert!(rx.try_recv().is_err());

        assert_eq!(registry.lock().next_fire(handle), Some(at(10, 0, 10)));
        assert_eq!(tick(&registry, &tx, at(10, 0, 6)), 0);
    }

    #[test]
    fn cancel_after_submission_keeps_submitted_action() {
        let registry = Mutex::new(JobRegistry::new());
        let handle = registry
            .lock()
            .add_interval(Duration::from_secs(5), at(10, 0, 0), "alarm")
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        tick(&registry, &tx, at(10, 0, 5));
        assert!(registry.lock().cancel(handle));

        assert_eq!(rx.try_recv().unwrap().action, "alarm");
        assert_eq!(tick(&registry, &tx, at(11, 0, 0)), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_channel_does_not_panic() {
        let registry = Mutex::new(JobRegistry::new());
        registry
            .lock()
            .add_interval(Duration::from_secs(1), at(10, 0, 0), ())
            .unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        assert_eq!(tick(&registry, &tx, at(10, 0, 1)), 0);
        assert_eq!(registry.lock().len(), 1);
    }

    #[test]
    fn zero_period_is_rejected() {
        let registry: SharedRegistry<()> = Arc::new(Mutex::new(JobRegistry::new()));
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = Timer::spawn(registry, tx, Duration::ZERO, CancellationToken::new()).unwrap_err();
        assert!(err.to_string().contains("longer than zero"));
    }

    #[tokio::test]
    async fn timer_thread_fires_jobs_and_stops() {
        let registry: SharedRegistry<&'static str> = Arc::new(Mutex::new(JobRegistry::new()));
        registry
            .lock()
            .add_interval(Duration::from_millis(20), Utc::now(), "ping")
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let timer = Timer::spawn(
            Arc::clone(&registry),
            tx,
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .unwrap();

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timer should fire within the timeout")
            .expect("channel open while timer runs");
        assert_eq!(fired.action, "ping");

        tokio::task::spawn_blocking(move || timer.stop()).await.unwrap();

        // The sender lives on the timer thread; once it exits the channel closes.
        while rx.recv().await.is_some() {}
    }
}
