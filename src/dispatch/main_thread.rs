//! Cooperative per-tick job queue for work that must run on the host's main
//! thread.
//!
//! Any thread may `submit` a job. The host drains the queue once per tick by
//! calling [`MainThreadQueue::pump`] from its main loop. Callers wait on the
//! result with a deadline; a job whose caller gave up still runs when the
//! host gets to it, and its late result is dropped.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a cross-thread call produced no result.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("timed out waiting for the main thread")]
    TimedOut,
    /// The job was dropped or panicked before sending a result.
    #[error("main thread job was abandoned")]
    Abandoned,
}

#[derive(Default)]
pub struct MainThreadQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl std::fmt::Debug for MainThreadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

impl MainThreadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job`; the receiver resolves once the host has run it.
    pub fn submit<F, T>(&self, job: F) -> oneshot::Receiver<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.jobs.lock().push_back(Box::new(move || {
            // The receiver may be gone after a timeout.
            let _ = tx.send(job());
        }));
        rx
    }

    /// Run every job queued so far on the calling thread. Returns how many ran.
    ///
    /// Jobs queued while pumping wait for the next tick.
    pub fn pump(&self) -> usize {
        let batch: Vec<Job> = self.jobs.lock().drain(..).collect();
        let count = batch.len();
        for job in batch {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                log::error!("Main thread job panicked");
            }
        }
        count
    }

    /// Jobs waiting for the next pump.
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Queue `job` and wait for its result without blocking the runtime.
    pub async fn call<F, T>(&self, job: F, timeout: Duration) -> Result<T, CallError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let rx = self.submit(job);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(CallError::Abandoned),
            Err(_) => Err(CallError::TimedOut),
        }
    }

    /// Queue `job` and block the calling thread until it ran or `timeout`
    /// elapsed. Never call this from the thread that pumps the queue.
    pub fn call_blocking<F, T>(&self, job: F, timeout: Duration) -> Result<T, CallError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        self.jobs.lock().push_back(Box::new(move || {
            let _ = tx.send(job());
        }));
        match rx.recv_timeout(timeout) {
            Ok(value) => Ok(value),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(CallError::TimedOut),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(CallError::Abandoned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_pump_runs_jobs_in_order() {
        let queue = MainThreadQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let seen = Arc::clone(&seen);
            let _rx = queue.submit(move || seen.lock().push(i));
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.pump(), 3);
        assert_eq!(queue.pending(), 0);
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_job_does_not_stop_the_pump() {
        let queue = MainThreadQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let _a = queue.submit(|| panic!("boom"));
        let counter = Arc::clone(&ran);
        let _b = queue.submit(move || counter.fetch_add(1, Ordering::SeqCst));
        assert_eq!(queue.pump(), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_call_resolves_when_pumped() {
        let queue = Arc::new(MainThreadQueue::new());
        let pumper = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            while pumper.pump() == 0 {
                std::thread::sleep(Duration::from_millis(2));
            }
        });
        let value = queue.call(|| 21 * 2, Duration::from_secs(5)).await.unwrap();
        assert_eq!(value, 42);
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_call_times_out_and_job_runs_later() {
        let queue = MainThreadQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let result = queue
            .call(move || counter.fetch_add(1, Ordering::SeqCst), Duration::from_millis(20))
            .await;
        assert_eq!(result, Err(CallError::TimedOut));

        // Still queued; runs detached and its result goes nowhere.
        assert_eq!(queue.pending(), 1);
        queue.pump();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_job_is_abandoned() {
        let queue = Arc::new(MainThreadQueue::new());
        let pumper = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            while pumper.pump() == 0 {
                std::thread::sleep(Duration::from_millis(2));
            }
        });
        let result: Result<(), _> = queue
            .call(|| panic!("main thread failure"), Duration::from_secs(5))
            .await;
        assert_eq!(result, Err(CallError::Abandoned));
        handle.join().unwrap();
    }

    #[test]
    fn test_call_blocking() {
        let queue = Arc::new(MainThreadQueue::new());
        let pumper = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            while pumper.pump() == 0 {
                std::thread::sleep(Duration::from_millis(2));
            }
        });
        let value = queue
            .call_blocking(|| "done".to_string(), Duration::from_secs(5))
            .unwrap();
        assert_eq!(value, "done");
        handle.join().unwrap();

        let err = queue.call_blocking(|| 1, Duration::from_millis(10)).unwrap_err();
        assert_eq!(err, CallError::TimedOut);
    }
}
