/*!
 * Scheduler Configuration
 * Thread counts, timesteps and dedicated thread setup
 */

use super::dedicated::DedicatedThreadType;
use crate::core::limits::{
    DEFAULT_FIXED_UPDATE_INTERVAL_SECS, DEFAULT_MAX_FIXED_STEPS_PER_FRAME,
    DEFAULT_MIN_UPDATE_INTERVAL_SECS, DEFAULT_POOL_QUEUE_CAPACITY, MAIN_THREAD_RESERVE,
    MIN_WORKER_THREADS,
};
use crate::core::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::thread;
use tracing::warn;

fn check_interval(field: &str, secs: f64) -> SchedulerResult<()> {
    if secs.is_finite() && secs > 0.0 {
        Ok(())
    } else {
        Err(SchedulerError::Configuration(format!(
            "{} must be a positive number of seconds, got {}",
            field, secs
        )))
    }
}

fn check_max_steps(steps: u32) -> SchedulerResult<()> {
    if steps == 0 {
        return Err(SchedulerError::Configuration(
            "max_fixed_steps_per_frame must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Setup of one dedicated queue thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedicatedThreadConfig {
    pub thread: DedicatedThreadType,
    pub fixed_update_interval_secs: f64,
    /// Lower bound on the duration of one loop iteration
    pub min_update_interval_secs: f64,
    pub max_fixed_steps_per_frame: u32,
}

impl DedicatedThreadConfig {
    pub fn new(thread: DedicatedThreadType) -> Self {
        Self {
            thread,
            ..Self::default()
        }
    }

    pub fn with_fixed_update_interval(mut self, secs: f64) -> Self {
        self.fixed_update_interval_secs = secs;
        self
    }

    pub fn with_min_update_interval(mut self, secs: f64) -> Self {
        self.min_update_interval_secs = secs;
        self
    }

    pub fn with_max_fixed_steps(mut self, steps: u32) -> Self {
        self.max_fixed_steps_per_frame = steps;
        self
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        check_interval("fixed_update_interval_secs", self.fixed_update_interval_secs)?;
        check_interval("min_update_interval_secs", self.min_update_interval_secs)?;
        check_max_steps(self.max_fixed_steps_per_frame)
    }
}

impl Default for DedicatedThreadConfig {
    fn default() -> Self {
        Self {
            thread: DedicatedThreadType::Animation,
            fixed_update_interval_secs: DEFAULT_FIXED_UPDATE_INTERVAL_SECS,
            min_update_interval_secs: DEFAULT_MIN_UPDATE_INTERVAL_SECS,
            max_fixed_steps_per_frame: DEFAULT_MAX_FIXED_STEPS_PER_FRAME,
        }
    }
}

/// Scheduler configuration
///
/// Loadable from JSON; every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Explicit worker pool size; derived from hardware concurrency when unset
    pub worker_threads: Option<usize>,
    /// Cores kept free for non-pool threads; defaults to the main thread plus
    /// one per dedicated thread
    pub reserved_threads: Option<usize>,
    pub pool_queue_capacity: usize,
    pub fixed_update_interval_secs: f64,
    /// Cap on main queue fixed steps per frame
    pub max_fixed_steps_per_frame: u32,
    pub dedicated_threads: Vec<DedicatedThreadConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            reserved_threads: None,
            pool_queue_capacity: DEFAULT_POOL_QUEUE_CAPACITY,
            fixed_update_interval_secs: DEFAULT_FIXED_UPDATE_INTERVAL_SECS,
            max_fixed_steps_per_frame: DEFAULT_MAX_FIXED_STEPS_PER_FRAME,
            dedicated_threads: vec![DedicatedThreadConfig::default()],
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn with_reserved_threads(mut self, threads: usize) -> Self {
        self.reserved_threads = Some(threads);
        self
    }

    pub fn with_pool_queue_capacity(mut self, capacity: usize) -> Self {
        self.pool_queue_capacity = capacity;
        self
    }

    pub fn with_fixed_update_interval(mut self, secs: f64) -> Self {
        self.fixed_update_interval_secs = secs;
        self
    }

    pub fn with_max_fixed_steps(mut self, steps: u32) -> Self {
        self.max_fixed_steps_per_frame = steps;
        self
    }

    /// Add a dedicated thread, replacing any existing entry of the same type
    pub fn with_dedicated_thread(mut self, config: DedicatedThreadConfig) -> Self {
        self.dedicated_threads.retain(|t| t.thread != config.thread);
        self.dedicated_threads.push(config);
        self
    }

    pub fn without_dedicated_threads(mut self) -> Self {
        self.dedicated_threads.clear();
        self
    }

    pub fn reserved(&self) -> usize {
        self.reserved_threads
            .unwrap_or(MAIN_THREAD_RESERVE + self.dedicated_threads.len())
    }

    /// Worker pool size to use on this machine
    pub fn resolve_worker_threads(&self) -> usize {
        let available = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(MIN_WORKER_THREADS);
        let threads = match self.worker_threads {
            Some(threads) => threads,
            None => available.saturating_sub(self.reserved()).max(MIN_WORKER_THREADS),
        };
        if threads + self.reserved() > available {
            warn!(
                threads,
                reserved = self.reserved(),
                available,
                "scheduler threads oversubscribe available cores"
            );
        }
        threads
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.worker_threads == Some(0) {
            return Err(SchedulerError::Configuration(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.pool_queue_capacity == 0 {
            return Err(SchedulerError::Configuration(
                "pool_queue_capacity must be at least 1".into(),
            ));
        }
        check_interval("fixed_update_interval_secs", self.fixed_update_interval_secs)?;
        check_max_steps(self.max_fixed_steps_per_frame)?;
        for (index, dedicated) in self.dedicated_threads.iter().enumerate() {
            dedicated.validate()?;
            if self.dedicated_threads[..index]
                .iter()
                .any(|other| other.thread == dedicated.thread)
            {
                return Err(SchedulerError::Configuration(format!(
                    "dedicated thread '{}' configured twice",
                    dedicated.thread
                )));
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> SchedulerResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SchedulerError::Configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SchedulerResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            SchedulerError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}
