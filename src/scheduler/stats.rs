/*!
 * Scheduler Statistics
 */

use super::dedicated::DedicatedThreadType;
use serde::{Deserialize, Serialize};

/// Snapshot of one dedicated thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedicatedThreadStats {
    pub thread: DedicatedThreadType,
    pub running: bool,
    pub processes: usize,
    pub ticks: u64,
    pub has_error: bool,
}

/// Point-in-time view of every queue owned by a `ProcessManager`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub main_queue_processes: usize,
    pub main_queue_staged: usize,
    pub sorting_layers: usize,
    pub threaded_processes: usize,
    /// Chained children released but not yet moved to their own backend
    pub handoff_processes: usize,
    pub pending_jobs: usize,
    pub worker_threads: usize,
    pub busy_workers: usize,
    pub dedicated_threads: Vec<DedicatedThreadStats>,
}

impl SchedulerStats {
    /// Processes tracked across all queues
    pub fn total_processes(&self) -> usize {
        self.main_queue_processes
            + self.main_queue_staged
            + self.threaded_processes
            + self.handoff_processes
            + self
                .dedicated_threads
                .iter()
                .map(|t| t.processes)
                .sum::<usize>()
    }
}
