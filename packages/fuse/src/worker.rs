//! Threads that run filesystem requests off the session loop.
//!
//! fuser reads and dispatches kernel requests on one thread. Every request
//! here may wait on the backend, so the adapter hands the work and its
//! reply to a pool and returns to the loop at once.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

/// Number of workers used by a mounted filesystem.
pub const DEFAULT_WORKERS: usize = 8;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads fed from one unbounded queue.
///
/// Dropping the pool closes the queue; workers finish what is already
/// queued and exit. Drop does not wait for them.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let workers = (0..size.max(1))
            .map(|i| {
                let receiver: Receiver<Job> = receiver.clone();
                thread::Builder::new()
                    .name(format!("httpfs-worker-{}", i))
                    .spawn(move || {
                        for job in receiver.iter() {
                            job();
                        }
                        debug!(worker = i, "queue closed");
                    })
            })
            .collect::<io::Result<Vec<_>>>()?;

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `job` for the next free worker.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return;
        };
        // The receivers live as long as the workers, so this only fails if
        // every worker has panicked. The job is dropped along with its reply,
        // and fuser answers a dropped reply with EIO.
        if sender.send(Box::new(job)).is_err() {
            warn!("no workers left, dropping request");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        let panicked = self
            .workers
            .drain(..)
            .filter(|worker| worker.is_finished())
            .filter_map(|worker| worker.join().err())
            .count();
        if panicked > 0 {
            warn!(panicked, "workers panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    use super::*;

    #[test]
    fn slow_job_does_not_hold_up_others() {
        let pool = WorkerPool::new(2).unwrap();
        let (release, blocked) = mpsc::channel::<()>();
        let (done, finished) = mpsc::channel::<&'static str>();

        let slow_done = done.clone();
        pool.execute(move || {
            blocked.recv().unwrap();
            slow_done.send("slow").unwrap();
        });
        pool.execute(move || done.send("fast").unwrap());

        assert_eq!(
            finished.recv_timeout(Duration::from_secs(5)).unwrap(),
            "fast"
        );

        release.send(()).unwrap();
        assert_eq!(
            finished.recv_timeout(Duration::from_secs(5)).unwrap(),
            "slow"
        );
    }

    #[test]
    fn every_queued_job_runs() {
        let pool = WorkerPool::new(4).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let (done, finished) = mpsc::channel();

        for _ in 0..100 {
            let count = Arc::clone(&count);
            let done = done.clone();
            pool.execute(move || {
                count.fetch_add(1, Ordering::SeqCst);
                done.send(()).unwrap();
            });
        }

        for _ in 0..100 {
            finished.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn zero_size_still_gets_a_worker() {
        assert_eq!(WorkerPool::new(0).unwrap().size(), 1);
    }
}
