/*!
 * Process Module
 * Schedulable units of work and their lifecycle
 */

pub mod control;
pub mod lifecycle;
pub mod threaded;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use control::{ProcessControl, ProcessHandle};
pub use lifecycle::Process;
pub use threaded::ThreadedProcess;
pub use traits::{ProcessBehavior, ProcessFn};
pub use types::{AtomicProcessState, ProcessState, SchedulingKind, UpdatePhase};
