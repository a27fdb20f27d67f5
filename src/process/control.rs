/*!
 * Process Control
 * Shared, thread-safe part of a process and the weak handle returned to callers
 */

use super::types::{AtomicProcessState, ProcessState, SchedulingKind};
use crate::core::limits::DEFAULT_SORTING_LAYER_ID;
use crate::core::{ProcessId, SortingLayerId};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// Identity, state and sorting layer of a process
///
/// Handed to every hook, and reachable from other threads through a
/// [`ProcessHandle`]. The state is the only field written from more than one
/// thread, so it lives in an atomic.
pub struct ProcessControl {
    id: ProcessId,
    name: String,
    kind: SchedulingKind,
    state: AtomicProcessState,
    sorting_layer: AtomicU32,
}

impl ProcessControl {
    pub(crate) fn new(name: String, kind: SchedulingKind) -> Self {
        Self {
            id: ProcessId::new(),
            name,
            kind,
            state: AtomicProcessState::new(ProcessState::Uninitialized),
            sorting_layer: AtomicU32::new(DEFAULT_SORTING_LAYER_ID),
        }
    }

    #[inline]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> SchedulingKind {
        self.kind
    }

    #[inline]
    pub fn state(&self) -> ProcessState {
        self.state.load()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.state().is_dead()
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.state() == ProcessState::Paused
    }

    #[inline]
    pub fn sorting_layer(&self) -> SortingLayerId {
        self.sorting_layer.load(Ordering::Relaxed)
    }

    /// Takes effect at the owning queue's next sweep
    pub fn set_sorting_layer(&self, layer: SortingLayerId) {
        self.sorting_layer.store(layer, Ordering::Relaxed);
    }

    /// Mark the process as succeeded
    ///
    /// # Panics
    /// If the process is not running or paused.
    pub fn succeed(&self) {
        self.expect_transition(
            &[ProcessState::Running, ProcessState::Paused],
            ProcessState::Succeeded,
        );
    }

    /// Mark the process as failed
    ///
    /// # Panics
    /// If the process is not running or paused.
    pub fn fail(&self) {
        self.expect_transition(
            &[ProcessState::Running, ProcessState::Paused],
            ProcessState::Failed,
        );
    }

    /// Mark the process as aborted
    ///
    /// # Panics
    /// If the process is not uninitialized, running or paused.
    pub fn abort(&self) {
        self.expect_transition(
            &[
                ProcessState::Uninitialized,
                ProcessState::Running,
                ProcessState::Paused,
            ],
            ProcessState::Aborted,
        );
    }

    /// # Panics
    /// If the process is not running.
    pub fn pause(&self) {
        self.expect_transition(&[ProcessState::Running], ProcessState::Paused);
    }

    /// # Panics
    /// If the process is not paused.
    pub fn unpause(&self) {
        self.expect_transition(&[ProcessState::Paused], ProcessState::Running);
    }

    /// Abort without the contract check, for queue-driven cancellation
    ///
    /// Returns false when the process already finished (or is a parked child).
    pub(crate) fn try_abort(&self) -> bool {
        self.state
            .transition(
                &[
                    ProcessState::Uninitialized,
                    ProcessState::Running,
                    ProcessState::Paused,
                ],
                ProcessState::Aborted,
            )
            .is_ok()
    }

    pub(crate) fn expect_transition(&self, allowed: &[ProcessState], to: ProcessState) {
        if let Err(current) = self.state.transition(allowed, to) {
            panic!(
                "invalid state transition for process '{}' ({}): {} -> {}",
                self.name, self.id, current, to
            );
        }
    }
}

impl fmt::Debug for ProcessControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessControl")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .field("sorting_layer", &self.sorting_layer())
            .finish()
    }
}

/// Weak reference to an attached process
///
/// Stays valid for id lookups forever; state queries return `None` once the
/// owning queue has dropped the process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    id: ProcessId,
    control: Weak<ProcessControl>,
}

impl ProcessHandle {
    pub(crate) fn new(control: &Arc<ProcessControl>) -> Self {
        Self {
            id: control.id(),
            control: Arc::downgrade(control),
        }
    }

    #[inline]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Upgrade to the shared control block while the process still exists
    pub fn control(&self) -> Option<Arc<ProcessControl>> {
        self.control.upgrade()
    }

    pub fn state(&self) -> Option<ProcessState> {
        self.control().map(|c| c.state())
    }

    /// True once the owning queue has destroyed the process
    pub fn is_expired(&self) -> bool {
        self.control.strong_count() == 0
    }
}
