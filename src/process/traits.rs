/*!
 * Process Traits
 * Hooks a unit of work implements to be scheduled
 */

use super::control::ProcessControl;
use crate::core::ProcessResult;

/// Behavior of a schedulable process
///
/// Phase hooks only run while the process is `Running`. Returning an error
/// from a hook is an unexpected failure: it unwinds the main-thread frame, or is
/// captured and surfaced later for threaded and dedicated-thread processes.
/// Expected failures should call [`ProcessControl::fail`] instead.
pub trait ProcessBehavior: Send + 'static {
    /// Runs once, right after the process enters `Running`
    fn on_init(&mut self, _ctl: &ProcessControl) -> ProcessResult<()> {
        Ok(())
    }

    fn on_update(&mut self, ctl: &ProcessControl, delta_seconds: f64) -> ProcessResult<()>;

    fn on_late_update(&mut self, _ctl: &ProcessControl, _delta_seconds: f64) -> ProcessResult<()> {
        Ok(())
    }

    fn on_post_update(&mut self, _ctl: &ProcessControl, _delta_seconds: f64) -> ProcessResult<()> {
        Ok(())
    }

    fn on_fixed_update(&mut self, _ctl: &ProcessControl, _delta_seconds: f64) -> ProcessResult<()> {
        Ok(())
    }

    fn on_success(&mut self, _ctl: &ProcessControl) {}

    fn on_fail(&mut self, _ctl: &ProcessControl) {}

    fn on_abort(&mut self, _ctl: &ProcessControl) {}
}

/// Function-backed process
///
/// Wraps an `FnMut(&ProcessControl, f64)` closure as the `on_update` hook.
pub struct ProcessFn<F> {
    update: F,
}

impl<F> ProcessFn<F>
where
    F: FnMut(&ProcessControl, f64) -> ProcessResult<()> + Send + 'static,
{
    pub fn new(update: F) -> Self {
        Self { update }
    }
}

impl<F> ProcessBehavior for ProcessFn<F>
where
    F: FnMut(&ProcessControl, f64) -> ProcessResult<()> + Send + 'static,
{
    fn on_update(&mut self, ctl: &ProcessControl, delta_seconds: f64) -> ProcessResult<()> {
        (self.update)(ctl, delta_seconds)
    }
}
