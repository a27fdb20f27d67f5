/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::id::ProcessId;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::any::Any;
use thiserror::Error;

/// Errors raised by process hooks
///
/// These are what a hook returns when it cannot continue. On the main thread they
/// propagate straight out of the frame driver; on worker and dedicated threads they
/// are captured and surfaced by the next `check_processes` call.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("Process failed: {0}")]
    #[diagnostic(
        code(process::failed),
        help("A process hook returned an error. Check the process implementation.")
    )]
    Failed(String),

    #[error("Panic in {origin}: {message}")]
    #[diagnostic(
        code(process::panicked),
        help("A hook panicked off the main thread. The panic was caught and deferred.")
    )]
    Panicked { origin: String, message: String },
}

impl ProcessError {
    pub fn failed(message: impl Into<String>) -> Self {
        ProcessError::Failed(message.into())
    }

    /// Convert a caught panic payload into an error value
    pub fn from_panic(origin: impl Into<String>, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        ProcessError::Panicked {
            origin: origin.into(),
            message,
        }
    }
}

/// Scheduler-related errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SchedulerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error("Process {0} is not a threaded process")]
    #[diagnostic(
        code(scheduler::not_threaded),
        help("Only processes built with Process::threaded can run on the worker pool.")
    )]
    NotThreaded(ProcessId),

    #[error("Cannot reattach threaded process {0}")]
    #[diagnostic(
        code(scheduler::threaded_reattach),
        help("Threaded processes are not ordered by sorting layer and cannot be reattached.")
    )]
    ThreadedReattach(ProcessId),

    #[error("Process {0} not found")]
    #[diagnostic(
        code(scheduler::process_not_found),
        help("The process may have finished or been removed already.")
    )]
    ProcessNotFound(ProcessId),

    #[error("Sorting layer not found: {0}")]
    #[diagnostic(code(scheduler::sorting_layer_not_found))]
    SortingLayerNotFound(String),

    #[error("Sorting layer already exists: {0}")]
    #[diagnostic(code(scheduler::sorting_layer_exists))]
    SortingLayerExists(String),

    #[error("The default sorting layer cannot be removed")]
    #[diagnostic(code(scheduler::default_sorting_layer))]
    DefaultSortingLayer,

    #[error("Worker pool saturated: {capacity} dispatches pending")]
    #[diagnostic(
        code(scheduler::pool_saturated),
        help("Too many threaded processes queued. Wait for running ones to finish or raise pool_queue_capacity.")
    )]
    PoolSaturated { capacity: usize },

    #[error("Worker pool has been shut down")]
    #[diagnostic(code(scheduler::pool_shutdown))]
    PoolShutdown,

    #[error("Failed to spawn thread: {0}")]
    #[diagnostic(
        code(scheduler::thread_spawn),
        help("The OS refused to create a thread. Check system resource limits.")
    )]
    ThreadSpawn(String),

    #[error("Dedicated thread not configured: {0}")]
    #[diagnostic(
        code(scheduler::dedicated_thread_unavailable),
        help("Add the thread to SchedulerConfig::dedicated_threads.")
    )]
    DedicatedThreadUnavailable(String),

    #[error("Dedicated {thread} thread failed: {source}")]
    #[diagnostic(code(scheduler::dedicated_thread_failed))]
    DedicatedThread {
        thread: String,
        #[source]
        source: ProcessError,
    },

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(scheduler::configuration),
        help("Invalid configuration. Review configuration parameters.")
    )]
    Configuration(String),
}

/// Result type for process hooks
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Result type for queue and manager operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
