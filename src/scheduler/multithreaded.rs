/*!
 * Multithreaded Process Queue
 * Dispatches threaded processes onto the worker pool and collects their errors
 */

use super::pool::{Dispatcher, WorkerPool};
use crate::core::{ProcessError, ProcessId, ProcessResult, SchedulerResult};
use crate::process::{Process, ProcessHandle, ThreadedProcess};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

struct Shared {
    processes: Mutex<Vec<Arc<ThreadedProcess>>>,
    released: Mutex<Vec<Process>>,
    dispatcher: Arc<Dispatcher>,
    closed: AtomicBool,
}

impl Shared {
    fn dispatch(self: &Arc<Self>, threaded: ThreadedProcess) -> SchedulerResult<()> {
        let threaded = Arc::new(threaded);
        let id = threaded.id();
        self.processes.lock().push(Arc::clone(&threaded));

        let weak = Arc::downgrade(self);
        let result = self.dispatcher.execute(move || run_job(threaded, weak));
        if let Err(err) = result {
            self.remove(id);
            return Err(err);
        }
        debug!(process = %id, "threaded process dispatched");
        Ok(())
    }

    fn remove(&self, id: ProcessId) -> Option<Arc<ThreadedProcess>> {
        let mut processes = self.processes.lock();
        let index = processes.iter().position(|p| p.id() == id)?;
        Some(processes.remove(index))
    }

    fn find(&self, id: ProcessId) -> Option<Arc<ThreadedProcess>> {
        self.processes.lock().iter().find(|p| p.id() == id).cloned()
    }

    /// Route a child released by a finished threaded process
    fn promote(self: &Arc<Self>, child: Process) {
        if self.closed.load(Ordering::Acquire) {
            debug!(process = %child.id(), "queue closed, dropping released child");
            return;
        }
        if !child.is_threaded() {
            debug!(process = %child.id(), "queued child handed off to main queue");
            self.released.lock().push(child);
            return;
        }
        let id = child.id();
        let outcome = ThreadedProcess::new(child).and_then(|threaded| self.dispatch(threaded));
        if let Err(err) = outcome {
            error!(process = %id, error = %err, "failed to dispatch chained threaded process");
        }
    }
}

fn run_job(threaded: Arc<ThreadedProcess>, shared: Weak<Shared>) {
    let child = threaded.run();
    let Some(shared) = shared.upgrade() else {
        return;
    };
    if let Some(child) = child {
        shared.promote(*child);
    }
    debug!(process = %threaded.id(), "threaded process run returned");
}

/// Queue of processes that each run to completion on a pool worker
///
/// The queue never steps processes itself; it owns the in-flight list so the
/// owning thread can abort them and collect errors they raised. An entry stays
/// listed after its run returns, until `delete_threaded_process`, an immediate
/// abort or `reclaim_finished_processes` removes it.
pub struct MultithreadedProcessQueue {
    shared: Arc<Shared>,
    workers: WorkerPool,
}

impl MultithreadedProcessQueue {
    pub fn new(threads: usize, capacity: usize) -> SchedulerResult<Self> {
        let workers = WorkerPool::new(threads, capacity)?;
        let shared = Arc::new(Shared {
            processes: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            dispatcher: Arc::clone(workers.dispatcher()),
            closed: AtomicBool::new(false),
        });
        info!(threads = workers.thread_count(), "Multithreaded process queue initialized");
        Ok(Self { shared, workers })
    }

    /// Hand a threaded process to the pool
    ///
    /// With `initialize`, `on_init` runs on the calling thread before dispatch.
    pub fn attach_process(
        &self,
        process: Process,
        initialize: bool,
    ) -> SchedulerResult<ProcessHandle> {
        let handle = process.handle();
        let threaded = ThreadedProcess::new(process)?;
        if initialize {
            threaded.initialize()?;
        }
        self.shared.dispatch(threaded)?;
        Ok(handle)
    }

    /// Surface the first error captured on a worker
    ///
    /// The error is taken, so it is reported once. The entry itself stays.
    pub fn check_processes(&self) -> ProcessResult<()> {
        let processes = self.shared.processes.lock();
        match processes.iter().find_map(|p| p.take_error()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drop the entry for `id`, typically once its work has finished
    pub fn delete_threaded_process(&self, id: ProcessId) -> bool {
        if self.shared.remove(id).is_some() {
            debug!(process = %id, "threaded process deleted");
            true
        } else {
            warn!(process = %id, "threaded process not found");
            false
        }
    }

    /// Abort a threaded process
    ///
    /// With `immediate`, waits for the in-progress iteration, runs `on_abort`,
    /// removes the entry and reports any error the worker had already captured.
    pub fn abort_process(&self, id: ProcessId, immediate: bool) -> ProcessResult<bool> {
        // Lookup only; aborting under the list lock would block on the worker
        let Some(threaded) = self.shared.find(id) else {
            warn!(process = %id, "threaded process not found");
            return Ok(false);
        };

        let aborted = threaded.abort(immediate);
        debug!(process = %id, immediate, aborted, "threaded process abort requested");
        if immediate {
            self.shared.remove(id);
            if let Some(err) = threaded.take_error() {
                return Err(err);
            }
        }
        Ok(aborted)
    }

    /// Abort every in-flight process, returning the first error encountered
    pub fn abort_all_processes(&self, immediate: bool) -> ProcessResult<()> {
        let ids = self.process_ids();
        let mut first: Option<ProcessError> = None;
        for id in ids {
            if let Err(err) = self.abort_process(id, immediate) {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Abort everything immediately and forget all entries and handoffs
    pub fn clear_processes(&self) -> ProcessResult<()> {
        let result = self.abort_all_processes(true);
        self.shared.processes.lock().clear();
        self.shared.released.lock().clear();
        result
    }

    /// Queued-kind children released by finished threaded parents
    pub fn take_released_processes(&self) -> Vec<Process> {
        std::mem::take(&mut *self.shared.released.lock())
    }

    /// Children waiting for `take_released_processes`
    pub fn released_len(&self) -> usize {
        self.shared.released.lock().len()
    }

    /// Delete every finished entry whose error, if any, was already surfaced
    ///
    /// Returns the ids removed.
    pub fn reclaim_finished_processes(&self) -> Vec<ProcessId> {
        let mut reclaimed = Vec::new();
        self.shared.processes.lock().retain(|p| {
            let done = p.is_finished() && !p.has_error();
            if done {
                reclaimed.push(p.id());
            }
            !done
        });
        if !reclaimed.is_empty() {
            debug!(count = reclaimed.len(), "finished threaded processes reclaimed");
        }
        reclaimed
    }

    /// Entries whose worker run has returned
    pub fn finished_process_ids(&self) -> Vec<ProcessId> {
        self.shared
            .processes
            .lock()
            .iter()
            .filter(|p| p.is_finished())
            .map(|p| p.id())
            .collect()
    }

    pub fn process_ids(&self) -> Vec<ProcessId> {
        self.shared.processes.lock().iter().map(|p| p.id()).collect()
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.shared.find(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.shared.processes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.processes.lock().is_empty()
    }

    pub fn worker_threads(&self) -> usize {
        self.workers.thread_count()
    }

    pub fn pending_jobs(&self) -> usize {
        self.shared.dispatcher.pending()
    }

    pub fn busy_workers(&self) -> usize {
        self.shared.dispatcher.busy()
    }

    /// Abort everything and join the pool; idempotent
    pub fn shutdown(&mut self) -> ProcessResult<()> {
        self.shared.closed.store(true, Ordering::Release);
        let result = self.clear_processes();
        self.workers.shutdown();
        result
    }
}

impl Drop for MultithreadedProcessQueue {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "error while clearing threaded processes");
        }
    }
}
