//! Bounded background worker pool.
//!
//! Chunk generation, chunk loading and echo loading run here so the main
//! loop never blocks on CPU or disk work. The queue is bounded: when it is
//! full, submission fails immediately and the caller retries on a later
//! frame.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

/// A unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of named worker threads fed by a bounded queue.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
    capacity: usize,
}

impl WorkerPool {
    /// Spawns `threads` workers sharing a queue of `capacity` jobs.
    pub fn new(threads: usize, capacity: usize) -> io::Result<Self> {
        let threads = threads.max(1);
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded::<Job>(capacity);
        let pending = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("hinterland-worker-{index}"))
                .spawn(move || worker_loop(&receiver, &pending))?;
            workers.push(handle);
        }

        debug!(threads, capacity, "Worker pool started");
        Ok(Self {
            sender: Some(sender),
            workers,
            pending,
            capacity,
        })
    }

    /// Queues a job. Returns `false` without blocking when the queue is full.
    pub fn try_submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return false;
        };
        self.pending.fetch_add(1, Ordering::AcqRel);
        match sender.try_send(Box::new(job)) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                false
            },
        }
    }

    /// Jobs queued or running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether no job is queued or running.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Maximum queued jobs.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Spins until the pool is idle or the timeout passes. Returns whether it went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_idle() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.workers.len())
            .field("capacity", &self.capacity)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain the queue and exit.
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread exited abnormally");
            }
        }
    }
}

fn worker_loop(receiver: &Receiver<Job>, pending: &AtomicUsize) {
    while let Ok(job) = receiver.recv() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("Background job panicked");
        }
        pending.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_jobs_run() {
        let pool = WorkerPool::new(2, 8).expect("pool");
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            assert!(pool.try_submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_full_queue_rejects_without_blocking() {
        let pool = WorkerPool::new(1, 1).expect("pool");
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();

        assert!(pool.try_submit(move || {
            started_tx.send(()).expect("signal");
            release_rx.recv().expect("release");
        }));
        started_rx.recv().expect("worker started");

        // The worker is busy, one slot in the queue.
        assert!(pool.try_submit(|| {}));
        assert!(!pool.try_submit(|| {}));
        assert_eq!(pool.pending(), 2);

        release_tx.send(()).expect("release");
        assert!(pool.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1, 4).expect("pool");
        assert!(pool.try_submit(|| panic!("boom")));
        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        assert!(pool.try_submit(move || {
            flag.store(1, Ordering::SeqCst);
        }));
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_drains_queue() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(2, 16).expect("pool");
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                assert!(pool.try_submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }
}
