//! The verification job queue.
//!
//! Producers hand jobs to a [`JobSender`] without ever blocking. A single
//! worker task drains the queue one job at a time, because every job
//! mutates the same mirror. Each job runs on the blocking pool, so a
//! panicking job is reported as a failed join and the worker carries on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::job::Job;

/// Something that processes dequeued jobs.
///
/// Implementations handle their own failures; `handle` never returns one.
pub trait JobHandler: Send + Sync + 'static {
    fn handle(&self, job: Job);
}

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn start(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Cheap, cloneable handle for enqueueing jobs.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::UnboundedSender<Job>,
    in_flight: Arc<InFlight>,
}

impl JobSender {
    /// Enqueue `job`. Never blocks; a closed queue is logged.
    pub fn enqueue(&self, job: Job) {
        self.in_flight.start();
        if self.tx.send(job).is_err() {
            self.in_flight.finish();
            error!(%job, "git queue is closed; job dropped");
            return;
        }
        debug!(%job, "job enqueued");
    }
}

/// The verification queue and its single worker.
#[derive(Debug)]
pub struct GitQueue {
    sender: JobSender,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    throttle: Duration,
}

impl GitQueue {
    /// Create a queue whose worker pauses `throttle` between jobs.
    #[must_use]
    pub fn new(throttle: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: JobSender {
                tx,
                in_flight: Arc::new(InFlight::default()),
            },
            receiver: Mutex::new(Some(rx)),
            throttle,
        }
    }

    /// A handle producers (and the worker itself) enqueue through.
    #[must_use]
    pub fn sender(&self) -> JobSender {
        self.sender.clone()
    }

    /// Enqueue `job`. Jobs enqueued before the worker starts wait for it.
    pub fn enqueue(&self, job: Job) {
        self.sender.enqueue(job);
    }

    /// Jobs enqueued but not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.sender.in_flight.count.load(Ordering::SeqCst)
    }

    /// Start the worker. Only the first call has any effect; later calls
    /// return `None`.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn start_worker<H: JobHandler>(&self, handler: Arc<H>) -> Option<JoinHandle<()>> {
        let rx = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        info!(throttle_ms = self.throttle.as_millis(), "starting git queue worker");
        let in_flight = Arc::clone(&self.sender.in_flight);
        Some(tokio::spawn(drain(rx, handler, in_flight, self.throttle)))
    }

    /// Remove and return jobs nobody has picked up yet.
    #[cfg(test)]
    pub(crate) fn take_pending(&self) -> Vec<Job> {
        let mut out = Vec::new();
        let mut guard = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = guard.as_mut() {
            while let Ok(job) = rx.try_recv() {
                self.sender.in_flight.finish();
                out.push(job);
            }
        }
        out
    }

    /// Wait until every enqueued job, including jobs enqueued by other
    /// jobs, has finished. Never returns if jobs are pending and the worker
    /// was not started.
    pub async fn wait_idle(&self) {
        let in_flight = &self.sender.in_flight;
        loop {
            let notified = in_flight.idle.notified();
            if in_flight.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

async fn drain<H: JobHandler>(
    mut rx: mpsc::UnboundedReceiver<Job>,
    handler: Arc<H>,
    in_flight: Arc<InFlight>,
    throttle: Duration,
) {
    while let Some(job) = rx.recv().await {
        let h = Arc::clone(&handler);
        if let Err(e) = tokio::task::spawn_blocking(move || h.handle(job)).await {
            error!(%job, error = %e, "job panicked; dropped");
        }
        in_flight.finish();

        if !throttle.is_zero() {
            tokio::time::sleep(throttle).await;
        }
    }
    debug!("git queue closed; worker exiting");
}
