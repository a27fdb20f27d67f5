/*!
 * Scheduler Limits and Constants
 *
 * Default timings and sizes used by the queues and the worker pool.
 * Everything here can be overridden through `SchedulerConfig`.
 */

use std::time::Duration;

// =============================================================================
// TIMESTEP
// =============================================================================

/// Default fixed update interval (60 Hz)
pub const DEFAULT_FIXED_UPDATE_INTERVAL_SECS: f64 = 1.0 / 60.0;

/// Default minimum loop interval for dedicated threads (2ms)
/// Keeps an idle dedicated thread from busy-spinning
pub const DEFAULT_MIN_UPDATE_INTERVAL_SECS: f64 = 0.002;

/// Most fixed steps one frame may run; a larger backlog is dropped
pub const DEFAULT_MAX_FIXED_STEPS_PER_FRAME: u32 = 16;

/// Sleep between liveness checks while a threaded process is paused
pub const PAUSED_POLL_INTERVAL: Duration = Duration::from_millis(1);

// =============================================================================
// WORKER POOL
// =============================================================================

/// Smallest worker pool ever created when sizing from hardware concurrency
pub const MIN_WORKER_THREADS: usize = 2;

/// Threads held back from the pool for the main thread
pub const MAIN_THREAD_RESERVE: usize = 1;

/// Pending dispatches the worker pool accepts before reporting saturation
pub const DEFAULT_POOL_QUEUE_CAPACITY: usize = 1024;

/// Prefix for worker thread names
pub const WORKER_THREAD_PREFIX: &str = "process-worker";

// =============================================================================
// SORTING LAYERS
// =============================================================================

/// Name of the layer every process starts on
pub const DEFAULT_SORTING_LAYER: &str = "default";

/// Id of the default layer
pub const DEFAULT_SORTING_LAYER_ID: u32 = 0;

/// Prefix for generated layer names
pub const GENERATED_LAYER_PREFIX: &str = "layer_";
