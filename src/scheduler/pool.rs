/*!
 * Worker Pool
 * Fixed set of OS threads fed from a bounded job channel
 */

use crate::core::limits::WORKER_THREAD_PREFIX;
use crate::core::{SchedulerError, SchedulerResult};
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sending side of the pool, shareable with jobs that dispatch follow-up work
pub struct Dispatcher {
    sender: RwLock<Option<flume::Sender<Job>>>,
    capacity: usize,
    busy: AtomicUsize,
}

impl Dispatcher {
    /// Queue a job; fails fast instead of blocking when the queue is full
    pub fn execute<F>(&self, job: F) -> SchedulerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.read();
        let sender = sender.as_ref().ok_or(SchedulerError::PoolShutdown)?;
        sender.try_send(Box::new(job)).map_err(|e| match e {
            flume::TrySendError::Full(_) => SchedulerError::PoolSaturated {
                capacity: self.capacity,
            },
            flume::TrySendError::Disconnected(_) => SchedulerError::PoolShutdown,
        })
    }

    /// Jobs queued but not yet picked up by a worker
    pub fn pending(&self) -> usize {
        self.sender.read().as_ref().map_or(0, |s| s.len())
    }

    /// Workers currently running a job
    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    fn close(&self) {
        self.sender.write().take();
    }
}

/// Thread pool running fire-and-forget jobs
///
/// Dropping the pool closes the channel, lets queued jobs drain, and joins
/// every worker.
pub struct WorkerPool {
    dispatcher: Arc<Dispatcher>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: usize, capacity: usize) -> SchedulerResult<Self> {
        let threads = threads.max(1);
        let capacity = capacity.max(1);
        let (sender, receiver) = flume::bounded::<Job>(capacity);
        let dispatcher = Arc::new(Dispatcher {
            sender: RwLock::new(Some(sender)),
            capacity,
            busy: AtomicUsize::new(0),
        });

        if let Ok(available) = thread::available_parallelism() {
            if threads > available.get() {
                warn!(
                    threads,
                    available = available.get(),
                    "worker thread count exceeds available parallelism"
                );
            }
        }

        let mut pool = Self {
            dispatcher,
            workers: Vec::with_capacity(threads),
        };
        for index in 0..threads {
            let receiver = receiver.clone();
            let dispatcher = Arc::clone(&pool.dispatcher);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", WORKER_THREAD_PREFIX, index))
                .spawn(move || worker_loop(receiver, dispatcher))
                .map_err(|e| SchedulerError::ThreadSpawn(e.to_string()))?;
            pool.workers.push(handle);
        }

        info!(threads, capacity, "Worker pool initialized");
        Ok(pool)
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Close the channel and join all workers; idempotent
    pub fn shutdown(&mut self) {
        self.dispatcher.close();
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                error!(thread = %name, "worker thread panicked");
            }
        }
        debug!("Worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: flume::Receiver<Job>, dispatcher: Arc<Dispatcher>) {
    while let Ok(job) = receiver.recv() {
        dispatcher.busy.fetch_add(1, Ordering::Relaxed);
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("job panicked on worker thread");
        }
        dispatcher.busy.fetch_sub(1, Ordering::Relaxed);
    }
}
