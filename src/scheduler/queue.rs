/*!
 * Process Queue
 * Single-threaded, sorting-layer ordered queue driven once per phase
 */

use super::sorting::SortingLayers;
use super::timestep::FixedTimestep;
use crate::core::limits::DEFAULT_SORTING_LAYER_ID;
use crate::core::{ProcessId, ProcessResult, SchedulerError, SchedulerResult, SortingLayerId};
use crate::process::{Process, ProcessHandle, ProcessState, UpdatePhase};
use std::mem;
use tracing::{debug, trace};

/// Ordered collection of processes driven from one thread
///
/// `Update` and `LateUpdate` only run hooks. `Fixed` and `PostUpdate` are sweeps:
/// survivors and released children are copied into the staging list, dead
/// processes are dropped, and staging then replaces the live list, stably sorted
/// by sorting layer id.
///
/// A released child of `Threaded` kind never joins this queue. It is parked in
/// the handoff list for the owner to dispatch onto the worker pool.
#[derive(Debug, Default)]
pub struct ProcessQueue {
    processes: Vec<Box<Process>>,
    staging: Vec<Box<Process>>,
    handoff: Vec<Box<Process>>,
    sorting_layers: SortingLayers,
}

impl ProcessQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sorting_layers(sorting_layers: SortingLayers) -> Self {
        Self {
            sorting_layers,
            ..Self::default()
        }
    }

    /// Append a process to the live list
    ///
    /// With `initialize`, the process enters `Running` and `on_init` runs before
    /// this returns.
    pub fn attach_process(
        &mut self,
        mut process: Process,
        initialize: bool,
    ) -> SchedulerResult<ProcessHandle> {
        if initialize && process.state() == ProcessState::Uninitialized {
            process.initialize()?;
        }
        let handle = process.handle();
        debug!(process = %process.id(), name = process.name(), layer = process.sorting_layer(), "process attached");
        self.processes.push(Box::new(process));
        Ok(handle)
    }

    /// Drive every live process through `phase`
    ///
    /// A hook error stops the phase and is returned; no process is lost.
    pub fn step(&mut self, phase: UpdatePhase, delta_seconds: f64) -> ProcessResult<()> {
        if phase.evaluates_liveness() {
            return self.sweep(phase, delta_seconds);
        }
        for process in self.processes.iter_mut() {
            process.step(phase, delta_seconds)?;
        }
        Ok(())
    }

    fn sweep(&mut self, phase: UpdatePhase, delta_seconds: f64) -> ProcessResult<()> {
        let mut result = Ok(());
        let mut live = mem::take(&mut self.processes).into_iter();

        for mut process in live.by_ref() {
            match process.step(phase, delta_seconds) {
                Ok(dead) => {
                    if let Some(child) = process.take_released_child() {
                        if child.is_threaded() {
                            debug!(parent = %process.id(), child = %child.id(), "threaded child parked for dispatch");
                            self.handoff.push(child);
                        } else {
                            debug!(parent = %process.id(), child = %child.id(), "child process promoted");
                            self.staging.push(child);
                        }
                    }
                    if dead {
                        trace!(process = %process.id(), state = %process.state(), "dropping finished process");
                    } else {
                        self.staging.push(process);
                    }
                }
                Err(err) => {
                    self.staging.push(process);
                    result = Err(err);
                    break;
                }
            }
        }
        self.staging.extend(live);

        mem::swap(&mut self.processes, &mut self.staging);
        self.refresh_process_order();
        result
    }

    /// Run one full frame: due fixed steps, then update, late update and post update
    ///
    /// Returns the number of fixed steps taken.
    pub fn tick(&mut self, delta_seconds: f64, timestep: &mut FixedTimestep) -> ProcessResult<u32> {
        let steps = timestep.advance(delta_seconds);
        for _ in 0..steps {
            self.step(UpdatePhase::Fixed, timestep.interval())?;
        }
        self.step(UpdatePhase::Update, delta_seconds)?;
        self.step(UpdatePhase::LateUpdate, delta_seconds)?;
        self.step(UpdatePhase::PostUpdate, delta_seconds)?;
        Ok(steps)
    }

    /// Abort a process by id
    ///
    /// With `immediate`, `on_abort` runs now and the process is removed without
    /// waiting for a sweep. Returns false if the process is unknown or already done.
    pub fn abort_process(&mut self, id: ProcessId, immediate: bool) -> bool {
        let Some((in_staging, index)) = self.locate(id) else {
            return false;
        };
        let list = if in_staging {
            &mut self.staging
        } else {
            &mut self.processes
        };
        if !list[index].control().try_abort() {
            return false;
        }
        debug!(process = %id, immediate, "process aborted");
        if immediate {
            let mut process = list.remove(index);
            process.check_finished();
        }
        true
    }

    pub fn abort_all_processes(&mut self, immediate: bool) {
        for id in self.process_ids() {
            self.abort_process(id, immediate);
        }
    }

    /// Abort everything immediately and empty the queue
    pub fn clear_processes(&mut self) {
        self.abort_all_processes(true);
        self.processes.clear();
        self.staging.clear();
        self.handoff.clear();
    }

    /// Threaded children released by sweeps since the last call
    pub fn take_threaded_children(&mut self) -> Vec<Process> {
        mem::take(&mut self.handoff).into_iter().map(|child| *child).collect()
    }

    /// Threaded children waiting for `take_threaded_children`
    pub fn handoff_len(&self) -> usize {
        self.handoff.len()
    }

    /// Move a live process to staging so the next sweep re-sorts it
    ///
    /// Until that sweep the process skips `Update` and `LateUpdate`.
    pub fn reattach_process(&mut self, id: ProcessId) -> SchedulerResult<()> {
        let index = self
            .processes
            .iter()
            .position(|p| p.id() == id)
            .ok_or(SchedulerError::ProcessNotFound(id))?;
        if self.processes[index].is_threaded() {
            return Err(SchedulerError::ThreadedReattach(id));
        }
        let process = self.processes.remove(index);
        self.staging.push(process);
        Ok(())
    }

    pub fn add_sorting_layer(&mut self, name: impl Into<String>) -> SchedulerResult<SortingLayerId> {
        self.sorting_layers.add(name)
    }

    pub fn add_unnamed_sorting_layer(&mut self) -> SchedulerResult<SortingLayerId> {
        Ok(self.sorting_layers.add_unnamed()?.id)
    }

    /// Remove a layer, moving its processes to the default layer
    pub fn remove_sorting_layer(&mut self, name: &str) -> SchedulerResult<()> {
        let id = self.sorting_layers.remove(name)?;
        self.on_remove_sorting_layer(id);
        Ok(())
    }

    /// Reassign every process on `layer` to the default layer
    pub fn on_remove_sorting_layer(&mut self, layer: SortingLayerId) {
        for process in self.processes.iter().chain(self.staging.iter()) {
            if process.sorting_layer() == layer {
                process.control().set_sorting_layer(DEFAULT_SORTING_LAYER_ID);
            }
        }
        self.refresh_process_order();
    }

    /// Replace the sorting layers from their JSON form
    ///
    /// Processes left on a layer that no longer exists fall back to the default.
    pub fn load_sorting_layers(&mut self, json: &serde_json::Value) -> SchedulerResult<()> {
        self.sorting_layers.load_json(json)?;
        for process in self.processes.iter().chain(self.staging.iter()) {
            if self.sorting_layers.get_by_id(process.sorting_layer()).is_none() {
                process.control().set_sorting_layer(DEFAULT_SORTING_LAYER_ID);
            }
        }
        self.refresh_process_order();
        Ok(())
    }

    /// Stable sort of both lists by sorting layer id
    pub fn refresh_process_order(&mut self) {
        self.processes.sort_by_key(|p| p.sorting_layer());
        self.staging.sort_by_key(|p| p.sorting_layer());
    }

    pub fn sorting_layers(&self) -> &SortingLayers {
        &self.sorting_layers
    }

    pub fn sorting_layers_mut(&mut self) -> &mut SortingLayers {
        &mut self.sorting_layers
    }

    /// Live processes
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty() && self.staging.is_empty()
    }

    /// Processes waiting in staging for the next sweep
    pub fn staged_len(&self) -> usize {
        self.staging.len()
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.locate(id).is_some()
    }

    /// Live process ids in execution order, then staged ones
    pub fn process_ids(&self) -> Vec<ProcessId> {
        self.processes
            .iter()
            .chain(self.staging.iter())
            .map(|p| p.id())
            .collect()
    }

    pub fn process(&self, id: ProcessId) -> Option<&Process> {
        self.processes
            .iter()
            .chain(self.staging.iter())
            .find(|p| p.id() == id)
            .map(|p| &**p)
    }

    fn locate(&self, id: ProcessId) -> Option<(bool, usize)> {
        if let Some(index) = self.processes.iter().position(|p| p.id() == id) {
            return Some((false, index));
        }
        self.staging
            .iter()
            .position(|p| p.id() == id)
            .map(|index| (true, index))
    }
}
