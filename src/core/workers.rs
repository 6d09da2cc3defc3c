//! Shared thread pool for background image loads
//!
//! Uses work-stealing deques:
//! - External jobs go into a global injector
//! - Each worker drains its own deque, then the injector, then steals from peers
//!
//! The pool itself has no notion of single-flight; `SequenceCache` keeps at
//! most one load outstanding and other users may share the same pool.

use crossbeam::deque::{Injector, Stealer, Worker};
use log::trace;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::entities::WorkerPool;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Global worker pool with work-stealing.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4)?;
/// workers.execute(move || {
///     store.get(&key).ok();
/// });
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl std::fmt::Debug for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workers")
            .field("threads", &self.handles.len())
            .finish()
    }
}

/// Next job for one worker: own deque, then injector, then peers
fn find_job(
    local: &Worker<Job>,
    injector: &Injector<Job>,
    stealers: &[Stealer<Job>],
) -> Option<Job> {
    local.pop().or_else(|| {
        std::iter::repeat_with(|| {
            injector
                .steal_batch_and_pop(local)
                .or_else(|| stealers.iter().map(|s| s.steal()).collect())
        })
        .find(|s| !s.is_retry())
        .and_then(|s| s.success())
    })
}

impl Workers {
    /// Spawn `num_threads` workers (min 1).
    ///
    /// Recommended: `num_cpus::get() * 3 / 4` (leave 25% for the UI thread).
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = locals.iter().map(|w| w.stealer()).collect();
        let mut handles = Vec::with_capacity(num_threads);

        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let worker_shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let handle = thread::Builder::new()
                .name(format!("seqcache-worker-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);

                    loop {
                        if let Some(job) = find_job(&local, &injector, &stealers) {
                            job();
                            continue;
                        }

                        if worker_shutdown.load(Ordering::Relaxed) {
                            break;
                        }

                        // No work - short sleep to avoid CPU spin
                        thread::sleep(Duration::from_millis(1));
                    }

                    trace!("Worker {} stopped", worker_id);
                });

            match handle {
                Ok(h) => handles.push(h),
                Err(e) => {
                    // Stop the workers spawned so far before bailing out
                    shutdown.store(true, Ordering::SeqCst);
                    for h in handles {
                        let _ = h.join();
                    }
                    return Err(e);
                }
            }
        }

        trace!("Workers initialized: {} threads (work-stealing)", num_threads);

        Ok(Self {
            injector,
            handles,
            shutdown,
        })
    }

    /// Execute closure on a worker thread. Returns immediately.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::SeqCst);

        // Loads run to completion, so allow a generous grace period
        let deadline = Instant::now() + Duration::from_secs(2);

        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }

        trace!("All {} workers stopped", num_threads);
    }
}

impl WorkerPool for Workers {
    fn execute(&self, job: Job) {
        Workers::execute(self, job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_runs_all_jobs() {
        let workers = Workers::new(3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let c = Arc::clone(&counter);
            workers.execute(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 50 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_jobs_run_off_caller_thread() {
        let workers = Workers::new(1).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);

        WorkerPool::execute(
            &workers,
            Box::new(move || {
                let name = thread::current().name().map(str::to_string);
                let _ = tx.send(name);
            }),
        );

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("seqcache-worker-0"));
    }

    #[test]
    fn test_zero_threads_clamped() {
        let workers = Workers::new(0).unwrap();
        assert_eq!(workers.num_threads(), 1);
    }

    #[test]
    fn test_drop_stops_every_worker() {
        let workers = Workers::new(4).unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let d = Arc::clone(&done);
            workers.execute(move || {
                d.fetch_add(1, Ordering::SeqCst);
            });
        }

        // Every thread sees the pool's shutdown flag, so drop joins them all
        // well before the grace deadline
        let started = Instant::now();
        drop(workers);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(done.load(Ordering::SeqCst), 8);
    }
}
