/*!
 * Process Manager
 * Front door that owns every queue and routes processes between them
 */

use super::config::{DedicatedThreadConfig, SchedulerConfig};
use super::dedicated::{DedicatedThreadType, ProcessQueueThread};
use super::multithreaded::MultithreadedProcessQueue;
use super::queue::ProcessQueue;
use super::stats::{DedicatedThreadStats, SchedulerStats};
use super::timestep::FixedTimestep;
use crate::core::{ProcessId, SchedulerError, SchedulerResult, SortingLayerId};
use crate::process::{Process, ProcessHandle, SchedulingKind, UpdatePhase};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Owns the main queue, the worker pool queue and the dedicated threads
///
/// The frame drivers (`on_*` and `tick`) must be called from a single thread,
/// which acts as the main thread for the queued processes.
pub struct ProcessManager {
    config: SchedulerConfig,
    main_queue: ProcessQueue,
    timestep: FixedTimestep,
    threaded: MultithreadedProcessQueue,
    dedicated: Vec<ProcessQueueThread>,
}

impl ProcessManager {
    pub fn new(config: SchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        let threaded = MultithreadedProcessQueue::new(
            config.resolve_worker_threads(),
            config.pool_queue_capacity,
        )?;

        let mut dedicated = Vec::with_capacity(config.dedicated_threads.len());
        for thread_config in &config.dedicated_threads {
            let thread = ProcessQueueThread::new(thread_config.clone())?;
            thread.initialize()?;
            dedicated.push(thread);
        }

        info!(
            worker_threads = threaded.worker_threads(),
            dedicated_threads = dedicated.len(),
            "Process manager initialized"
        );
        Ok(Self {
            timestep: FixedTimestep::new(config.fixed_update_interval_secs)
                .with_max_steps(config.max_fixed_steps_per_frame),
            config,
            main_queue: ProcessQueue::new(),
            threaded,
            dedicated,
        })
    }

    pub fn builder() -> ProcessManagerBuilder {
        ProcessManagerBuilder::new()
    }

    /// Route a process by its scheduling kind
    pub fn attach_process(
        &mut self,
        process: Process,
        initialize: bool,
    ) -> SchedulerResult<ProcessHandle> {
        match process.kind() {
            SchedulingKind::Queued => self.main_queue.attach_process(process, initialize),
            SchedulingKind::Threaded => self.threaded.attach_process(process, initialize),
        }
    }

    /// Attach to the queue of a dedicated thread
    pub fn attach_to_thread(
        &self,
        thread: DedicatedThreadType,
        process: Process,
        initialize: bool,
    ) -> SchedulerResult<ProcessHandle> {
        self.dedicated_thread(thread)
            .ok_or_else(|| SchedulerError::DedicatedThreadUnavailable(thread.to_string()))?
            .attach_process(process, initialize)
    }

    pub fn on_fixed_update(&mut self, delta_seconds: f64) -> SchedulerResult<()> {
        self.run_phase(UpdatePhase::Fixed, delta_seconds)
    }

    pub fn on_update(&mut self, delta_seconds: f64) -> SchedulerResult<()> {
        self.run_phase(UpdatePhase::Update, delta_seconds)
    }

    pub fn on_late_update(&mut self, delta_seconds: f64) -> SchedulerResult<()> {
        self.run_phase(UpdatePhase::LateUpdate, delta_seconds)
    }

    pub fn on_post_update(&mut self, delta_seconds: f64) -> SchedulerResult<()> {
        self.run_phase(UpdatePhase::PostUpdate, delta_seconds)
    }

    fn run_phase(&mut self, phase: UpdatePhase, delta_seconds: f64) -> SchedulerResult<()> {
        self.route_released_processes()?;
        self.main_queue.step(phase, delta_seconds)?;
        self.route_released_processes()?;
        self.check_processes()
    }

    /// Run one frame of the main queue with the manager's fixed timestep
    ///
    /// Returns the number of fixed steps taken.
    pub fn tick(&mut self, delta_seconds: f64) -> SchedulerResult<u32> {
        self.route_released_processes()?;
        let steps = self.main_queue.tick(delta_seconds, &mut self.timestep)?;
        self.route_released_processes()?;
        self.check_processes()?;
        Ok(steps)
    }

    /// Move chained children to the backend their kind belongs on
    ///
    /// Queued children of threaded parents join the main queue. Threaded
    /// children released by the main queue or a dedicated thread go to the pool.
    fn route_released_processes(&mut self) -> SchedulerResult<()> {
        for process in self.threaded.take_released_processes() {
            debug!(process = %process.id(), "adopting child of threaded process");
            self.main_queue.attach_process(process, false)?;
        }

        let mut threaded_children = self.main_queue.take_threaded_children();
        for thread in &self.dedicated {
            threaded_children.extend(thread.take_threaded_children());
        }
        for child in threaded_children {
            debug!(process = %child.id(), "dispatching threaded child");
            self.threaded.attach_process(child, false)?;
        }
        Ok(())
    }

    /// Surface errors captured off the main thread, one per call
    pub fn check_processes(&self) -> SchedulerResult<()> {
        self.threaded.check_processes()?;
        for thread in &self.dedicated {
            if let Some(source) = thread.take_error() {
                return Err(SchedulerError::DedicatedThread {
                    thread: thread.thread_type().to_string(),
                    source,
                });
            }
        }
        Ok(())
    }

    /// Abort a process wherever it lives
    ///
    /// Returns false when the process is unknown or had already finished.
    pub fn abort_process(&mut self, id: ProcessId, immediate: bool) -> SchedulerResult<bool> {
        let aborted = if self.main_queue.contains(id) {
            self.main_queue.abort_process(id, immediate)
        } else if let Some(thread) = self.dedicated.iter().find(|t| t.contains(id)) {
            thread.abort_process(id, immediate)
        } else if self.threaded.contains(id) {
            self.threaded.abort_process(id, immediate)?
        } else {
            warn!(process = %id, "process not found for abort");
            return Ok(false);
        };
        if !aborted {
            debug!(process = %id, "process already finished, abort ignored");
        }
        Ok(aborted)
    }

    pub fn abort_all_processes(&mut self, immediate: bool) -> SchedulerResult<()> {
        self.main_queue.abort_all_processes(immediate);
        for thread in &self.dedicated {
            thread.abort_all_processes(immediate);
        }
        self.threaded.abort_all_processes(immediate)?;
        Ok(())
    }

    /// Abort everything immediately and empty every queue
    pub fn clear_processes(&mut self) -> SchedulerResult<()> {
        self.main_queue.clear_processes();
        for thread in &self.dedicated {
            thread.clear_processes();
        }
        self.threaded.clear_processes()?;
        Ok(())
    }

    /// Drop a finished threaded process from the in-flight list
    pub fn delete_threaded_process(&self, id: ProcessId) -> bool {
        self.threaded.delete_threaded_process(id)
    }

    /// Delete every finished threaded process whose error was surfaced
    pub fn reclaim_finished_processes(&self) -> Vec<ProcessId> {
        self.threaded.reclaim_finished_processes()
    }

    /// Re-sort a main queue process at the next sweep
    pub fn reattach_process(&mut self, id: ProcessId) -> SchedulerResult<()> {
        match self.main_queue.reattach_process(id) {
            Err(SchedulerError::ProcessNotFound(_)) if self.threaded.contains(id) => {
                Err(SchedulerError::ThreadedReattach(id))
            }
            other => other,
        }
    }

    pub fn add_sorting_layer(&mut self, name: impl Into<String>) -> SchedulerResult<SortingLayerId> {
        self.main_queue.add_sorting_layer(name)
    }

    pub fn remove_sorting_layer(&mut self, name: &str) -> SchedulerResult<()> {
        self.main_queue.remove_sorting_layer(name)
    }

    pub fn sorting_layers_json(&self) -> Value {
        self.main_queue.sorting_layers().to_json()
    }

    pub fn load_sorting_layers_json(&mut self, json: &Value) -> SchedulerResult<()> {
        self.main_queue.load_sorting_layers(json)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            main_queue_processes: self.main_queue.len(),
            main_queue_staged: self.main_queue.staged_len(),
            sorting_layers: self.main_queue.sorting_layers().len(),
            threaded_processes: self.threaded.len(),
            handoff_processes: self.threaded.released_len()
                + self.main_queue.handoff_len()
                + self.dedicated.iter().map(|t| t.handoff_len()).sum::<usize>(),
            pending_jobs: self.threaded.pending_jobs(),
            worker_threads: self.threaded.worker_threads(),
            busy_workers: self.threaded.busy_workers(),
            dedicated_threads: self
                .dedicated
                .iter()
                .map(|thread| DedicatedThreadStats {
                    thread: thread.thread_type(),
                    running: thread.is_running(),
                    processes: thread.len(),
                    ticks: thread.tick_count(),
                    has_error: thread.has_error(),
                })
                .collect(),
        }
    }

    /// Abort everything, then stop the dedicated threads and the worker pool
    ///
    /// Idempotent; the manager accepts no further work afterwards.
    pub fn shutdown(&mut self) -> SchedulerResult<()> {
        let result = self.clear_processes();
        for thread in &self.dedicated {
            thread.join();
        }
        self.threaded.shutdown()?;
        info!("Process manager shut down");
        result
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn main_queue(&self) -> &ProcessQueue {
        &self.main_queue
    }

    pub fn main_queue_mut(&mut self) -> &mut ProcessQueue {
        &mut self.main_queue
    }

    pub fn threaded_queue(&self) -> &MultithreadedProcessQueue {
        &self.threaded
    }

    pub fn dedicated_thread(&self, thread: DedicatedThreadType) -> Option<&ProcessQueueThread> {
        self.dedicated.iter().find(|t| t.thread_type() == thread)
    }
}

impl Drop for ProcessManager {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "error while shutting down process manager");
        }
    }
}

/// Builder for ProcessManager
pub struct ProcessManagerBuilder {
    config: SchedulerConfig,
    sorting_layers: Vec<String>,
}

impl ProcessManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            sorting_layers: Vec::new(),
        }
    }

    /// Start from an existing configuration
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.config = self.config.with_worker_threads(threads);
        self
    }

    pub fn with_pool_queue_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.with_pool_queue_capacity(capacity);
        self
    }

    pub fn with_fixed_update_interval(mut self, secs: f64) -> Self {
        self.config = self.config.with_fixed_update_interval(secs);
        self
    }

    pub fn with_max_fixed_steps(mut self, steps: u32) -> Self {
        self.config = self.config.with_max_fixed_steps(steps);
        self
    }

    pub fn with_dedicated_thread(mut self, thread: DedicatedThreadConfig) -> Self {
        self.config = self.config.with_dedicated_thread(thread);
        self
    }

    pub fn without_dedicated_threads(mut self) -> Self {
        self.config = self.config.without_dedicated_threads();
        self
    }

    /// Register a main queue sorting layer; layers get ids in call order
    pub fn with_sorting_layer(mut self, name: impl Into<String>) -> Self {
        self.sorting_layers.push(name.into());
        self
    }

    pub fn build(self) -> SchedulerResult<ProcessManager> {
        let mut manager = ProcessManager::new(self.config)?;
        for name in self.sorting_layers {
            manager.add_sorting_layer(name)?;
        }
        Ok(manager)
    }
}

impl Default for ProcessManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
