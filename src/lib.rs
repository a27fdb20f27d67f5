/*!
 * Reverie Scheduler Library
 * Cooperative process scheduling across a main queue, a worker pool and dedicated threads
 */

pub mod core;
pub mod monitoring;
pub mod process;
pub mod scheduler;

// Re-exports
pub use crate::core::{
    ProcessError, ProcessId, ProcessResult, SchedulerError, SchedulerResult, SortingLayerId,
};
pub use monitoring::init_tracing;
pub use process::{
    Process, ProcessBehavior, ProcessControl, ProcessFn, ProcessHandle, ProcessState,
    SchedulingKind, UpdatePhase,
};
pub use scheduler::{
    DedicatedThreadConfig, DedicatedThreadType, ProcessManager, ProcessManagerBuilder,
    ProcessQueue, SchedulerConfig, SchedulerStats,
};
