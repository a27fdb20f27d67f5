/*!
 * Process Types
 * Lifecycle states, update phases and scheduling kinds
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Process lifecycle state
///
/// `Uninitialized → Running ⇄ Paused`, then one of the terminal states.
/// `Removed` marks a chained child that is owned by its parent and not scheduled.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Uninitialized = 0,
    Running = 1,
    Paused = 2,
    Succeeded = 3,
    Failed = 4,
    Aborted = 5,
    Removed = 6,
}

impl ProcessState {
    #[inline]
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Running,
            2 => Self::Paused,
            3 => Self::Succeeded,
            4 => Self::Failed,
            5 => Self::Aborted,
            _ => Self::Removed,
        }
    }

    /// Running or paused
    #[inline]
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Succeeded, failed or aborted
    #[inline]
    pub const fn is_dead(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Aborted)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free process state cell, readable from any thread
#[derive(Debug)]
pub struct AtomicProcessState(AtomicU8);

impl AtomicProcessState {
    pub const fn new(state: ProcessState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn load(&self) -> ProcessState {
        ProcessState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, state: ProcessState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move to `to` if the current state is one of `allowed`
    ///
    /// Returns the previous state on success, or the state that blocked the transition.
    pub fn transition(
        &self,
        allowed: &[ProcessState],
        to: ProcessState,
    ) -> Result<ProcessState, ProcessState> {
        let mut current = self.load();
        loop {
            if !allowed.contains(&current) {
                return Err(current);
            }
            match self.0.compare_exchange_weak(
                current as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(current),
                Err(actual) => current = ProcessState::from_u8(actual),
            }
        }
    }
}

/// Phase of a scheduler tick
///
/// Within one tick: `Fixed*` → `Update` → `LateUpdate` → `PostUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePhase {
    Fixed,
    Update,
    LateUpdate,
    PostUpdate,
}

impl UpdatePhase {
    /// Liveness is only evaluated after these phases, i.e. once per tick
    #[inline]
    pub const fn evaluates_liveness(self) -> bool {
        matches!(self, Self::Fixed | Self::PostUpdate)
    }

    /// Phases allowed to lazily initialize a process
    #[inline]
    pub const fn initializes(self) -> bool {
        matches!(self, Self::Fixed | Self::Update)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Update => "update",
            Self::LateUpdate => "late_update",
            Self::PostUpdate => "post_update",
        }
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a process is allowed to run, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingKind {
    /// Driven phase by phase by a `ProcessQueue` (main or dedicated thread)
    Queued,
    /// Runs its whole lifecycle on a worker pool thread
    Threaded,
}
