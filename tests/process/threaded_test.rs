/*!
 * Threaded Process Tests
 * Worker-side loop, error capture and cross-thread abort
 */

use super::common::{wait_until, Recorder};
use pretty_assertions::assert_eq;
use reverie_scheduler::process::ThreadedProcess;
use reverie_scheduler::{Process, ProcessError, ProcessFn, ProcessState, SchedulerError};
use std::sync::Arc;
use std::thread;

#[test]
fn test_runs_all_frame_hooks_until_success() {
    let (recorder, calls) = Recorder::new();
    let threaded = ThreadedProcess::new(Process::threaded("t", recorder.succeed_after(4))).unwrap();

    assert!(threaded.run().is_none());
    let calls = calls.lock().clone();
    assert_eq!(calls.init, 1);
    assert_eq!(calls.update, 4);
    assert_eq!(calls.late_update, 4);
    assert_eq!(calls.post_update, 4);
    assert_eq!(calls.fixed_update, 0);
    assert_eq!(calls.success, 1);
}

#[test]
fn test_releases_child_on_success() {
    let child = Process::queued("child", ProcessFn::new(|_, _| Ok(())));
    let child_id = child.id();
    let (recorder, _) = Recorder::new();
    let parent = Process::threaded("parent", recorder.succeed_after(1)).then(child);

    let threaded = ThreadedProcess::new(parent).unwrap();
    let released = threaded.run().unwrap();
    assert_eq!(released.id(), child_id);
    assert_eq!(released.state(), ProcessState::Uninitialized);
}

#[test]
fn test_hook_error_is_captured_not_propagated() {
    let (recorder, calls) = Recorder::new();
    let threaded = ThreadedProcess::new(Process::threaded(
        "t",
        recorder.failing(ProcessError::failed("disk full")),
    ))
    .unwrap();

    assert!(threaded.run().is_none());
    assert!(threaded.is_finished());
    assert_eq!(calls.lock().update, 1);
    assert_eq!(threaded.take_error(), Some(ProcessError::failed("disk full")));
    assert_eq!(threaded.take_error(), None);
}

#[test]
fn test_abort_from_owner_thread_stops_worker() {
    let threaded = Arc::new(
        ThreadedProcess::new(Process::threaded("spin", ProcessFn::new(|_, _| Ok(())))).unwrap(),
    );
    let worker = {
        let threaded = Arc::clone(&threaded);
        thread::spawn(move || threaded.run())
    };

    assert!(wait_until(|| threaded.state() == ProcessState::Running));
    threaded.control().abort();
    assert!(worker.join().unwrap().is_none());
    assert_eq!(threaded.state(), ProcessState::Aborted);
    assert!(!threaded.has_error());
}

#[test]
fn test_paused_process_resumes() {
    let (recorder, calls) = Recorder::new();
    let threaded = Arc::new(
        ThreadedProcess::new(Process::threaded("t", recorder.succeed_after(1_000_000))).unwrap(),
    );
    let worker = {
        let threaded = Arc::clone(&threaded);
        thread::spawn(move || threaded.run())
    };

    assert!(wait_until(|| calls.lock().update > 0));
    threaded.control().pause();
    let paused_at = calls.lock().update;
    thread::sleep(std::time::Duration::from_millis(20));
    // At most the iteration in flight when pausing completes
    assert!(calls.lock().update <= paused_at + 1);

    threaded.control().unpause();
    assert!(wait_until(|| calls.lock().update > paused_at + 1));
    threaded.control().fail();
    worker.join().unwrap();
    assert_eq!(calls.lock().fail, 1);
}

#[test]
fn test_queued_process_rejected() {
    let process = Process::queued("q", ProcessFn::new(|_, _| Ok(())));
    let id = process.id();
    assert_eq!(
        ThreadedProcess::new(process).err(),
        Some(SchedulerError::NotThreaded(id))
    );
}
