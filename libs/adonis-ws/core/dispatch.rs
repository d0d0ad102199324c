//! Listener dispatch thread
//!
//! ```text
//! transport callback ─┐
//! heartbeat / timers ─┼─> session lock ─> Job ──> Unbounded Channel ──> Dispatch Thread
//! public API calls   ─┘                                                (runs jobs in order)
//! ```
//!
//! The engine decides *which* listeners fire while it holds the session lock,
//! then hands the calls to this thread. Listeners therefore run in exactly the
//! order the engine produced them, never under the lock, and may call back
//! into the connection freely.

use crate::traits::error::{AdonisError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error};

/// A deferred listener invocation
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct Dispatcher {
    tx: Sender<Job>,
}

impl Dispatcher {
    /// Spawn the dispatch thread
    ///
    /// The thread exits once the dispatcher is dropped and the queue drained.
    pub(crate) fn spawn() -> Result<Self> {
        let (tx, rx) = unbounded::<Job>();

        std::thread::Builder::new()
            .name("adonis-dispatch".to_string())
            .spawn(move || run(rx))
            .map_err(|e| AdonisError::Other(format!("failed to spawn dispatch thread: {}", e)))?;

        Ok(Self { tx })
    }

    pub(crate) fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            debug!("Dispatch thread gone, dropping listener call");
        }
    }
}

fn run(rx: Receiver<Job>) {
    debug!("Dispatch thread started");

    while let Ok(job) = rx.recv() {
        // A panicking listener must not take the other listeners down with it
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("Listener panicked; continuing with next listener");
        }
    }

    debug!("Dispatch thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_order() {
        let dispatcher = Dispatcher::spawn().unwrap();
        let (tx, rx) = unbounded();

        for i in 0..100 {
            let tx = tx.clone();
            dispatcher.dispatch(move || {
                tx.send(i).unwrap();
            });
        }

        let received: Vec<i32> = (0..100)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(received, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_job_does_not_stop_thread() {
        let dispatcher = Dispatcher::spawn().unwrap();
        let (tx, rx) = unbounded();

        dispatcher.dispatch(|| panic!("listener failure"));
        dispatcher.dispatch(move || {
            tx.send("still alive").unwrap();
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "still alive");
    }
}
