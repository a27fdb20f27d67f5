/*!
 * Scheduler Module
 * Queues, worker pool, dedicated threads and the manager that ties them together
 */

pub mod config;
pub mod dedicated;
pub mod manager;
pub mod multithreaded;
pub mod pool;
pub mod queue;
pub mod sorting;
pub mod stats;
pub mod timestep;

// Re-export public API
pub use config::{DedicatedThreadConfig, SchedulerConfig};
pub use dedicated::{DedicatedThreadType, ProcessQueueThread};
pub use manager::{ProcessManager, ProcessManagerBuilder};
pub use multithreaded::MultithreadedProcessQueue;
pub use pool::{Dispatcher, WorkerPool};
pub use queue::ProcessQueue;
pub use sorting::{SortingLayer, SortingLayers};
pub use stats::{DedicatedThreadStats, SchedulerStats};
pub use timestep::FixedTimestep;
