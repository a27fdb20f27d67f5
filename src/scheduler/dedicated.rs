/*!
 * Dedicated Threads
 * A process queue ticking on its own named OS thread
 */

use super::config::DedicatedThreadConfig;
use super::queue::ProcessQueue;
use super::timestep::FixedTimestep;
use crate::core::{ProcessError, ProcessId, SchedulerError, SchedulerResult};
use crate::process::{Process, ProcessHandle};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Subsystems that get a queue thread of their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedicatedThreadType {
    Animation,
    Audio,
}

impl DedicatedThreadType {
    pub const ALL: [DedicatedThreadType; 2] = [Self::Animation, Self::Audio];

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Animation => "animation",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for DedicatedThreadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct ThreadShared {
    queue: Mutex<ProcessQueue>,
    running: AtomicBool,
    error: Mutex<Option<ProcessError>>,
    ticks: AtomicU64,
}

/// A [`ProcessQueue`] driven by a dedicated thread
///
/// Every iteration runs a full frame under the queue lock, then sleeps out
/// whatever remains of the minimum update interval. Hooks running on this
/// thread must not call back into the same `ProcessQueueThread`.
///
/// Queued children of finished processes stay on this thread. Threaded children
/// wait in the queue's handoff list until the owner takes them with
/// [`ProcessQueueThread::take_threaded_children`].
pub struct ProcessQueueThread {
    config: DedicatedThreadConfig,
    shared: Arc<ThreadShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessQueueThread {
    pub fn new(config: DedicatedThreadConfig) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shared: Arc::new(ThreadShared {
                queue: Mutex::new(ProcessQueue::new()),
                running: AtomicBool::new(false),
                error: Mutex::new(None),
                ticks: AtomicU64::new(0),
            }),
            handle: Mutex::new(None),
        })
    }

    pub fn thread_type(&self) -> DedicatedThreadType {
        self.config.thread
    }

    pub fn config(&self) -> &DedicatedThreadConfig {
        &self.config
    }

    /// Spawn the update thread; a no-op while it is already running
    pub fn initialize(&self) -> SchedulerResult<()> {
        let mut handle = self.handle.lock();
        if self.is_running() {
            return Ok(());
        }
        // A loop that stopped on error leaves a handle behind
        if let Some(stale) = handle.take() {
            let _ = stale.join();
        }

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let fixed_interval = self.config.fixed_update_interval_secs;
        let max_steps = self.config.max_fixed_steps_per_frame;
        let min_interval = Duration::from_secs_f64(self.config.min_update_interval_secs);
        let spawned = thread::Builder::new()
            .name(format!("{}-thread", self.config.thread))
            .spawn(move || {
                let timestep = FixedTimestep::new(fixed_interval).with_max_steps(max_steps);
                update_loop(shared, timestep, min_interval)
            });

        match spawned {
            Ok(join) => {
                *handle = Some(join);
                info!(thread = %self.config.thread, "Dedicated thread started");
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                Err(SchedulerError::ThreadSpawn(e.to_string()))
            }
        }
    }

    pub fn attach_process(
        &self,
        process: Process,
        initialize: bool,
    ) -> SchedulerResult<ProcessHandle> {
        self.shared.queue.lock().attach_process(process, initialize)
    }

    pub fn abort_process(&self, id: ProcessId, immediate: bool) -> bool {
        self.shared.queue.lock().abort_process(id, immediate)
    }

    pub fn abort_all_processes(&self, immediate: bool) {
        self.shared.queue.lock().abort_all_processes(immediate);
    }

    pub fn clear_processes(&self) {
        self.shared.queue.lock().clear_processes();
    }

    /// Stop the loop and wait for the thread; idempotent
    pub fn join(&self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!(thread = %self.config.thread, "dedicated thread panicked");
            }
            info!(thread = %self.config.thread, "Dedicated thread stopped");
        }
    }

    /// Take the error that stopped the loop, if any
    pub fn take_error(&self) -> Option<ProcessError> {
        self.shared.error.lock().take()
    }

    pub fn has_error(&self) -> bool {
        self.shared.error.lock().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Completed loop iterations since construction
    pub fn tick_count(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.lock().is_empty()
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.shared.queue.lock().contains(id)
    }

    /// Threaded children released by processes on this thread
    pub fn take_threaded_children(&self) -> Vec<Process> {
        self.shared.queue.lock().take_threaded_children()
    }

    pub fn handoff_len(&self) -> usize {
        self.shared.queue.lock().handoff_len()
    }

    /// Access to the queue between iterations
    pub fn with_queue<R>(&self, f: impl FnOnce(&mut ProcessQueue) -> R) -> R {
        f(&mut self.shared.queue.lock())
    }
}

impl Drop for ProcessQueueThread {
    fn drop(&mut self) {
        self.join();
    }
}

fn update_loop(shared: Arc<ThreadShared>, mut timestep: FixedTimestep, min_interval: Duration) {
    let mut last_tick = Instant::now();

    while shared.running.load(Ordering::Acquire) {
        let frame_start = Instant::now();
        let delta_seconds = frame_start.duration_since(last_tick).as_secs_f64();
        last_tick = frame_start;

        let outcome = {
            let mut queue = shared.queue.lock();
            panic::catch_unwind(AssertUnwindSafe(|| queue.tick(delta_seconds, &mut timestep)))
        };
        let failure = match outcome {
            Ok(Ok(_)) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => Some(ProcessError::from_panic(
                format!("{} thread", thread::current().name().unwrap_or("dedicated")),
                payload,
            )),
        };
        if let Some(err) = failure {
            error!(error = %err, "dedicated thread stopped on error");
            shared.error.lock().get_or_insert(err);
            break;
        }
        shared.ticks.fetch_add(1, Ordering::Relaxed);

        let elapsed = frame_start.elapsed();
        if elapsed < min_interval {
            thread::sleep(min_interval - elapsed);
        }
    }

    shared.running.store(false, Ordering::Release);
    debug!("dedicated update loop exited");
}
