/*!
 * Process Lifecycle
 *
 * A `Process` couples a behavior with its shared control block and drives the
 * state machine:
 *
 * ```text
 * Uninitialized --init--> Running <--pause/unpause--> Paused
 * Running | Paused --succeed--> Succeeded
 * Running | Paused --fail-----> Failed
 * Uninitialized | Running | Paused --abort--> Aborted
 * ```
 *
 * Terminal states are immutable. The first time a terminal state is observed by
 * `check_finished`, exactly one of `on_success`, `on_fail` or `on_abort` runs. A
 * succeeded process releases its chained child so the queue that drove it can
 * attach the child in its place.
 */

use super::control::{ProcessControl, ProcessHandle};
use super::traits::ProcessBehavior;
use super::types::{ProcessState, SchedulingKind, UpdatePhase};
use crate::core::{ProcessId, ProcessResult, SortingLayerId};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A schedulable unit of work
pub struct Process {
    control: Arc<ProcessControl>,
    behavior: Box<dyn ProcessBehavior>,
    child: Option<Box<Process>>,
    released_child: Option<Box<Process>>,
    outcome_dispatched: bool,
}

impl Process {
    /// Process driven phase by phase by a `ProcessQueue`
    pub fn queued(name: impl Into<String>, behavior: impl ProcessBehavior) -> Self {
        Self::with_kind(name.into(), SchedulingKind::Queued, Box::new(behavior))
    }

    /// Process that runs its whole lifecycle on a worker pool thread
    pub fn threaded(name: impl Into<String>, behavior: impl ProcessBehavior) -> Self {
        Self::with_kind(name.into(), SchedulingKind::Threaded, Box::new(behavior))
    }

    pub fn with_kind(
        name: String,
        kind: SchedulingKind,
        behavior: Box<dyn ProcessBehavior>,
    ) -> Self {
        Self {
            control: Arc::new(ProcessControl::new(name, kind)),
            behavior,
            child: None,
            released_child: None,
            outcome_dispatched: false,
        }
    }

    /// Builder form of [`ProcessControl::set_sorting_layer`]
    pub fn on_sorting_layer(self, layer: SortingLayerId) -> Self {
        self.control.set_sorting_layer(layer);
        self
    }

    /// Builder form of [`Process::attach_child`]
    pub fn then(mut self, child: Process) -> Self {
        self.attach_child(child);
        self
    }

    #[inline]
    pub fn id(&self) -> ProcessId {
        self.control.id()
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.control.name()
    }

    #[inline]
    pub fn kind(&self) -> SchedulingKind {
        self.control.kind()
    }

    #[inline]
    pub fn is_threaded(&self) -> bool {
        self.kind() == SchedulingKind::Threaded
    }

    #[inline]
    pub fn state(&self) -> ProcessState {
        self.control.state()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.control.is_alive()
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.control.is_dead()
    }

    #[inline]
    pub fn sorting_layer(&self) -> SortingLayerId {
        self.control.sorting_layer()
    }

    #[inline]
    pub fn control(&self) -> &Arc<ProcessControl> {
        &self.control
    }

    pub fn handle(&self) -> ProcessHandle {
        ProcessHandle::new(&self.control)
    }

    /// Chain a process to run after this one succeeds
    ///
    /// Ownership moves into the chain. When a child already exists the new
    /// process is appended to the end of the chain, so children form a list.
    ///
    /// # Panics
    /// If `child` is not uninitialized.
    pub fn attach_child(&mut self, child: Process) {
        match self.child {
            Some(ref mut existing) => existing.attach_child(child),
            None => {
                child
                    .control
                    .expect_transition(&[ProcessState::Uninitialized], ProcessState::Removed);
                self.child = Some(Box::new(child));
            }
        }
    }

    pub fn child(&self) -> Option<&Process> {
        self.child.as_deref()
    }

    /// Detach the chained child without running this process to success
    pub fn remove_child(&mut self) -> Option<Box<Process>> {
        let child = self.child.take()?;
        child
            .control
            .expect_transition(&[ProcessState::Removed], ProcessState::Uninitialized);
        Some(child)
    }

    /// Enter `Running` and run `on_init`
    ///
    /// # Panics
    /// If the process was already initialized.
    pub fn initialize(&mut self) -> ProcessResult<()> {
        self.control
            .expect_transition(&[ProcessState::Uninitialized], ProcessState::Running);
        debug!(process = %self.id(), name = self.name(), "process initialized");
        self.behavior.on_init(&self.control)
    }

    /// Drive one phase
    ///
    /// Returns whether the process is dead, which is only evaluated for the
    /// `Fixed` and `PostUpdate` phases; the others always return `false`.
    pub fn step(&mut self, phase: UpdatePhase, delta_seconds: f64) -> ProcessResult<bool> {
        if phase.initializes() && self.state() == ProcessState::Uninitialized {
            self.initialize()?;
        }

        if self.state() == ProcessState::Running {
            let ctl = &*self.control;
            match phase {
                UpdatePhase::Fixed => self.behavior.on_fixed_update(ctl, delta_seconds)?,
                UpdatePhase::Update => self.behavior.on_update(ctl, delta_seconds)?,
                UpdatePhase::LateUpdate => self.behavior.on_late_update(ctl, delta_seconds)?,
                UpdatePhase::PostUpdate => self.behavior.on_post_update(ctl, delta_seconds)?,
            }
        }

        if phase.evaluates_liveness() {
            Ok(self.check_finished())
        } else {
            Ok(false)
        }
    }

    /// Run one worker-side frame: update, late update, then post update
    ///
    /// All three hooks run once the frame starts in `Running`, even if an
    /// earlier hook finished the process. Returns whether the process is dead.
    pub fn run_frame(&mut self, delta_seconds: f64) -> ProcessResult<bool> {
        if self.state() == ProcessState::Running {
            let ctl = &*self.control;
            self.behavior.on_update(ctl, delta_seconds)?;
            self.behavior.on_late_update(ctl, delta_seconds)?;
            self.behavior.on_post_update(ctl, delta_seconds)?;
        }
        Ok(self.check_finished())
    }

    /// Whether the process reached a terminal state
    ///
    /// Dispatches the matching outcome hook the first time only.
    pub fn check_finished(&mut self) -> bool {
        let state = self.state();
        if !state.is_dead() {
            return false;
        }
        if self.outcome_dispatched {
            return true;
        }
        self.outcome_dispatched = true;

        debug!(process = %self.id(), name = self.name(), %state, "process finished");
        match state {
            ProcessState::Succeeded => {
                self.behavior.on_success(&self.control);
                self.released_child = self.remove_child();
            }
            ProcessState::Failed => self.behavior.on_fail(&self.control),
            ProcessState::Aborted => self.behavior.on_abort(&self.control),
            _ => unreachable!("checked is_dead above"),
        }
        true
    }

    /// Child released by a successful `check_finished`, ready to be attached
    pub fn take_released_child(&mut self) -> Option<Box<Process>> {
        self.released_child.take()
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("control", &self.control)
            .field("child", &self.child.as_ref().map(|c| c.id()))
            .field("outcome_dispatched", &self.outcome_dispatched)
            .finish()
    }
}
