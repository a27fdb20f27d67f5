/*!
 * Threaded Process
 * A process that runs its entire lifecycle on a worker pool thread
 */

use super::control::ProcessControl;
use super::lifecycle::Process;
use super::types::ProcessState;
use crate::core::limits::PAUSED_POLL_INTERVAL;
use crate::core::{ProcessError, ProcessId, ProcessResult, SchedulerError, SchedulerResult};
use crate::monitoring::RunSpan;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::error;

/// Worker-side wrapper around a threaded [`Process`]
///
/// The process itself sits behind a mutex that the worker takes once per loop
/// iteration, so an immediate abort from the owning thread can interleave.
/// Errors and panics raised while running are parked in `error` until the
/// owning queue collects them.
pub struct ThreadedProcess {
    control: Arc<ProcessControl>,
    process: Mutex<Process>,
    error: Mutex<Option<ProcessError>>,
    finished: AtomicBool,
}

impl ThreadedProcess {
    /// Wrap a process built with [`Process::threaded`]
    pub fn new(process: Process) -> SchedulerResult<Self> {
        if !process.is_threaded() {
            return Err(SchedulerError::NotThreaded(process.id()));
        }
        Ok(Self {
            control: Arc::clone(process.control()),
            process: Mutex::new(process),
            error: Mutex::new(None),
            finished: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn id(&self) -> ProcessId {
        self.control.id()
    }

    #[inline]
    pub fn control(&self) -> &Arc<ProcessControl> {
        &self.control
    }

    #[inline]
    pub fn state(&self) -> ProcessState {
        self.control.state()
    }

    /// Whether `run` has returned
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn has_error(&self) -> bool {
        self.error.lock().is_some()
    }

    /// Take the captured error, leaving the slot empty
    pub fn take_error(&self) -> Option<ProcessError> {
        self.error.lock().take()
    }

    /// Initialize on the calling thread ahead of dispatch
    pub(crate) fn initialize(&self) -> ProcessResult<()> {
        let mut process = self.process.lock();
        if process.state() == ProcessState::Uninitialized {
            process.initialize()?;
        }
        Ok(())
    }

    /// Worker entry point
    ///
    /// Never unwinds: hook errors and panics are captured into the error slot.
    /// Returns the child released on success, if any.
    pub fn run(&self) -> Option<Box<Process>> {
        let span = RunSpan::new(self.id(), self.control.name());
        let _entered = span.enter();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_loop()));
        let child = match outcome {
            Ok(Ok(child)) => child,
            Ok(Err(err)) => {
                self.capture(err);
                None
            }
            Err(payload) => {
                self.capture(ProcessError::from_panic(
                    format!("threaded process '{}'", self.control.name()),
                    payload,
                ));
                None
            }
        };
        self.finished.store(true, Ordering::Release);
        child
    }

    fn run_loop(&self) -> ProcessResult<Option<Box<Process>>> {
        let mut last_tick = Instant::now();
        self.initialize()?;

        loop {
            let mut process = self.process.lock();
            let now = Instant::now();
            let delta_seconds = now.duration_since(last_tick).as_secs_f64();
            last_tick = now;

            if process.run_frame(delta_seconds)? {
                break;
            }

            let paused = process.state() == ProcessState::Paused;
            drop(process);
            if paused {
                thread::sleep(PAUSED_POLL_INTERVAL);
            }
        }

        // Guarantees the outcome hook ran even if the loop body never did
        let mut process = self.process.lock();
        process.check_finished();
        Ok(process.take_released_child())
    }

    /// Abort from the owning thread
    ///
    /// With `immediate`, `on_abort` has run by the time this returns. Returns
    /// false if the process had already finished.
    pub(crate) fn abort(&self, immediate: bool) -> bool {
        if !self.control.try_abort() {
            return false;
        }
        if immediate {
            self.process.lock().check_finished();
        }
        true
    }

    fn capture(&self, err: ProcessError) {
        error!(process = %self.id(), name = self.control.name(), error = %err, "threaded process failed");
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}
