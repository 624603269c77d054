//! Bounded worker pool with count-based completion waits
//!
//! Jobs are spawned onto the tokio runtime immediately and gated by a
//! semaphore, so at most `max_parallel` run at once. Each finished job posts
//! a [`JobOutcome`] to the completion channel; [`WorkerPool::wait`] blocks
//! until a given number of outcomes have arrived, success or failure alike.

use crate::error::SetupError;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_MAX_PARALLEL: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool has been shut down")]
    ShutDown,

    #[error("Cannot wait for {requested} job(s): only {outstanding} outstanding")]
    InsufficientJobs { requested: usize, outstanding: usize },
}

/// Completion record of a single job
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: String,
    pub result: Result<(), SetupError>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct WorkerPool {
    max_parallel: usize,
    semaphore: Arc<Semaphore>,
    completions_tx: mpsc::UnboundedSender<JobOutcome>,
    completions_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<JobOutcome>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    submitted: AtomicUsize,
    awaited: AtomicUsize,
    shut_down: AtomicBool,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARALLEL)
    }
}

impl WorkerPool {
    /// A pool running at most `max_parallel` jobs at once (minimum 1)
    pub fn new(max_parallel: usize) -> Self {
        let max_parallel = max_parallel.max(1);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            max_parallel,
            semaphore: Arc::new(Semaphore::new(max_parallel)),
            completions_tx,
            completions_rx: tokio::sync::Mutex::new(completions_rx),
            handles: Mutex::new(Vec::new()),
            submitted: AtomicUsize::new(0),
            awaited: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Jobs submitted whose outcome has not yet been returned by `wait`
    pub fn outstanding(&self) -> usize {
        self.submitted.load(Ordering::SeqCst) - self.awaited.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Queue a job; returns without waiting for a free worker.
    ///
    /// A panic inside `job` is reported as [`SetupError::JobPanicked`] in its
    /// outcome rather than unwinding into the runtime.
    pub fn submit<F>(&self, job_id: impl Into<String>, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = Result<(), SetupError>> + Send + 'static,
    {
        if self.is_shut_down() {
            return Err(PoolError::ShutDown);
        }

        let job_id = job_id.into();
        let semaphore = Arc::clone(&self.semaphore);
        let completions = self.completions_tx.clone();
        debug!("Submitting job {}", job_id);

        let handle = tokio::spawn(async move {
            // The semaphore is never closed, so a permit is always granted
            let _permit = semaphore.acquire_owned().await;
            let result = match AssertUnwindSafe(job).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(SetupError::JobPanicked {
                    job_id: job_id.clone(),
                    message: panic_message(payload.as_ref()),
                }),
            };
            // The receiver lives inside the pool; it is only gone once the pool is dropped
            let _ = completions.send(JobOutcome { job_id, result });
        });

        self.submitted.fetch_add(1, Ordering::SeqCst);
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        Ok(())
    }

    /// Block until `n` more jobs have completed and return their outcomes in
    /// completion order
    pub async fn wait(&self, n: usize) -> Result<Vec<JobOutcome>, PoolError> {
        self.wait_with(n, |_| {}).await
    }

    /// Like [`WorkerPool::wait`], invoking `on_complete` as each outcome arrives
    pub async fn wait_with<C>(&self, n: usize, mut on_complete: C) -> Result<Vec<JobOutcome>, PoolError>
    where
        C: FnMut(&JobOutcome),
    {
        let outstanding = self.outstanding();
        if n > outstanding {
            return Err(PoolError::InsufficientJobs {
                requested: n,
                outstanding,
            });
        }

        let mut completions = self.completions_rx.lock().await;
        let mut outcomes = Vec::with_capacity(n);
        while outcomes.len() < n {
            // The pool holds a sender, so the channel cannot close under us
            let Some(outcome) = completions.recv().await else {
                break;
            };
            self.awaited.fetch_add(1, Ordering::SeqCst);
            on_complete(&outcome);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Stop accepting jobs and wait for every spawned job to finish.
    ///
    /// Safe to call more than once; only the first call drains.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        debug!("Shutting down worker pool ({} live task(s))", handles.len());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker task ended abnormally: {}", e);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests;
