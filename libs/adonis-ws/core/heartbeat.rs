//! Heartbeat scheduler
//!
//! # Architecture
//!
//! The server announces the heartbeat with a type-0 frame carrying an
//! interval and a number of pings it tolerates without an ack. The scheduler
//! runs a dedicated Tokio task:
//!
//! ```text
//! ┌──────────────────────────┐
//! │  Heartbeat Task          │
//! │  (Tokio spawn)           │
//! │                          │
//! │  Every interval:         │
//! │  1. remaining > 0 ?      │
//! │  2. send ping ───────────┼──> Connection ──> Transport
//! │  3. remaining -= 1       │
//! └──────────────────────────┘
//!          ▲
//!          │ reset to allowed
//!   type-9 ack / fresh type-0 config
//! ```
//!
//! Once `remaining` hits zero the task keeps ticking but stops pinging. Dead
//! links are detected by the transport's own failure reporting; the
//! scheduler never refills its budget by itself.

use crate::core::envelope::HeartbeatConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Sends one ping; returns `false` once the owning connection is gone
pub(crate) type PingFn = Box<dyn Fn() -> bool + Send + Sync + 'static>;

pub(crate) struct Heartbeat {
    allowed: u32,
    remaining: Arc<AtomicU32>,
    task: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub(crate) fn new() -> Self {
        Self {
            allowed: 0,
            remaining: Arc::new(AtomicU32::new(0)),
            task: None,
        }
    }

    /// Apply a server-pushed configuration, restarting the timer
    pub(crate) fn configure(&mut self, runtime: &Handle, config: HeartbeatConfig, ping: PingFn) {
        self.stop();

        self.allowed = config.client_attempts;
        self.remaining.store(config.client_attempts, Ordering::Release);

        if config.client_interval == 0 {
            warn!("Server sent a zero heartbeat interval, heartbeat disabled");
            return;
        }

        let interval = Duration::from_millis(config.client_interval);
        let remaining = Arc::clone(&self.remaining);
        debug!(
            "Heartbeat configured: every {:?}, {} unacknowledged pings allowed",
            interval, config.client_attempts
        );

        self.task = Some(runtime.spawn(heartbeat_task(interval, remaining, ping)));
    }

    /// Server acknowledged a ping; refill the budget
    pub(crate) fn acknowledge(&self) {
        self.remaining.store(self.allowed, Ordering::Release);
    }

    pub(crate) fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub(crate) fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Heartbeat stopped");
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn heartbeat_task(interval: Duration, remaining: Arc<AtomicU32>, ping: PingFn) {
    let mut ticker = tokio::time::interval(interval);
    // If we miss ticks due to slow processing, skip them rather than bursting
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        // First tick completes immediately
        ticker.tick().await;

        let took_slot = remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
            .is_ok();
        if !took_slot {
            continue;
        }

        if !ping() {
            debug!("Heartbeat owner dropped, heartbeat task exiting");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_ping(counter: &Arc<AtomicUsize>) -> PingFn {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
    }

    #[tokio::test]
    async fn test_pings_stop_when_budget_exhausted() {
        let pings = Arc::new(AtomicUsize::new(0));
        let mut heartbeat = Heartbeat::new();
        heartbeat.configure(
            &Handle::current(),
            HeartbeatConfig {
                client_interval: 10,
                client_attempts: 3,
            },
            counting_ping(&pings),
        );

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(pings.load(Ordering::SeqCst), 3);
        assert_eq!(heartbeat.remaining(), 0);
        assert!(heartbeat.is_running());
    }

    #[tokio::test]
    async fn test_acknowledge_refills_budget() {
        let pings = Arc::new(AtomicUsize::new(0));
        let mut heartbeat = Heartbeat::new();
        heartbeat.configure(
            &Handle::current(),
            HeartbeatConfig {
                client_interval: 10,
                client_attempts: 1,
            },
            counting_ping(&pings),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pings.load(Ordering::SeqCst), 1);

        heartbeat.acknowledge();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pings.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_interval_disables_heartbeat() {
        let pings = Arc::new(AtomicUsize::new(0));
        let mut heartbeat = Heartbeat::new();
        heartbeat.configure(
            &Handle::current(),
            HeartbeatConfig {
                client_interval: 0,
                client_attempts: 5,
            },
            counting_ping(&pings),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!heartbeat.is_running());
        assert_eq!(pings.load(Ordering::SeqCst), 0);
        assert_eq!(heartbeat.remaining(), 5);
    }

    #[tokio::test]
    async fn test_stop_aborts_task() {
        let pings = Arc::new(AtomicUsize::new(0));
        let mut heartbeat = Heartbeat::new();
        heartbeat.configure(
            &Handle::current(),
            HeartbeatConfig {
                client_interval: 10,
                client_attempts: 100,
            },
            counting_ping(&pings),
        );

        tokio::time::sleep(Duration::from_millis(35)).await;
        heartbeat.stop();
        let after_stop = pings.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pings.load(Ordering::SeqCst), after_stop);
        assert!(!heartbeat.is_running());
    }
}
