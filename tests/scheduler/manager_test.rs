/*!
 * Process Manager Tests
 * Routing, frame drivers and cross-thread error surfacing
 */

use super::common::{wait_until, Recorder};
use pretty_assertions::assert_eq;
use reverie_scheduler::{
    DedicatedThreadConfig, DedicatedThreadType, Process, ProcessError, ProcessFn, ProcessManager,
    ProcessState, SchedulerError,
};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn manager() -> ProcessManager {
    ProcessManager::builder()
        .with_worker_threads(2)
        .with_dedicated_thread(
            DedicatedThreadConfig::new(DedicatedThreadType::Animation)
                .with_fixed_update_interval(0.001)
                .with_min_update_interval(0.001),
        )
        .build()
        .unwrap()
}

#[test]
fn test_phase_drivers_step_main_queue() {
    let mut manager = manager();
    let (recorder, calls) = Recorder::new();
    manager.attach_process(Process::queued("p", recorder), false).unwrap();

    manager.on_fixed_update(0.016).unwrap();
    manager.on_update(0.016).unwrap();
    manager.on_late_update(0.016).unwrap();
    manager.on_post_update(0.016).unwrap();

    let calls = calls.lock().clone();
    assert_eq!(calls.init, 1);
    assert_eq!(calls.fixed_update, 1);
    assert_eq!(calls.update, 1);
    assert_eq!(calls.late_update, 1);
    assert_eq!(calls.post_update, 1);
}

#[test]
fn test_main_thread_error_propagates_immediately() {
    let mut manager = manager();
    let (recorder, _) = Recorder::new();
    manager
        .attach_process(
            Process::queued("bad", recorder.failing(ProcessError::failed("nan position"))),
            false,
        )
        .unwrap();

    assert_eq!(
        manager.on_update(0.016),
        Err(SchedulerError::Process(ProcessError::failed("nan position")))
    );
}

#[test]
fn test_worker_error_surfaces_on_next_check() {
    let mut manager = manager();
    let (recorder, _) = Recorder::new();
    let handle = manager
        .attach_process(
            Process::threaded("bad", recorder.failing(ProcessError::failed("decode"))),
            false,
        )
        .unwrap();

    assert!(wait_until(|| !manager
        .threaded_queue()
        .finished_process_ids()
        .is_empty()));
    assert_eq!(
        manager.tick(0.016),
        Err(SchedulerError::Process(ProcessError::failed("decode")))
    );
    assert!(manager.tick(0.016).is_ok());
    assert_eq!(manager.stats().threaded_processes, 1);

    assert_eq!(manager.reclaim_finished_processes(), vec![handle.id()]);
    assert_eq!(manager.stats().threaded_processes, 0);
}

#[test]
fn test_finished_threaded_process_reclaimed_by_id() {
    let mut manager = manager();
    let (recorder, calls) = Recorder::new();
    let handle = manager
        .attach_process(Process::threaded("voice", recorder.succeed_after(3)), false)
        .unwrap();

    assert!(wait_until(|| manager.threaded_queue().finished_process_ids() == vec![handle.id()]));
    manager.tick(0.016).unwrap();
    assert_eq!(manager.stats().threaded_processes, 1);
    assert_eq!(calls.lock().success, 1);

    for id in manager.threaded_queue().finished_process_ids() {
        assert!(manager.delete_threaded_process(id));
    }
    assert_eq!(manager.stats().threaded_processes, 0);
    assert!(!manager.delete_threaded_process(handle.id()));
}

#[test]
fn test_dedicated_error_is_wrapped() {
    let manager = manager();
    let (recorder, _) = Recorder::new();
    manager
        .attach_to_thread(
            DedicatedThreadType::Animation,
            Process::queued("bad", recorder.failing(ProcessError::failed("rig"))),
            false,
        )
        .unwrap();

    let thread = manager.dedicated_thread(DedicatedThreadType::Animation).unwrap();
    assert!(wait_until(|| thread.has_error()));
    assert_eq!(
        manager.check_processes(),
        Err(SchedulerError::DedicatedThread {
            thread: "animation".into(),
            source: ProcessError::failed("rig"),
        })
    );
    assert_eq!(manager.check_processes(), Ok(()));
}

#[test]
fn test_threaded_child_adopted_by_main_queue() {
    let mut manager = manager();
    let (child_recorder, child_calls) = Recorder::new();
    let (parent_recorder, _) = Recorder::new();
    let child = Process::queued("child", child_recorder);
    let child_id = child.id();
    manager
        .attach_process(Process::threaded("loader", parent_recorder.succeed_after(1)).then(child), false)
        .unwrap();

    assert!(wait_until(|| manager.stats().handoff_processes == 1));
    manager.tick(0.016).unwrap();
    assert!(manager.main_queue().contains(child_id));
    assert_eq!(child_calls.lock().update, 1);
}

#[test]
fn test_threaded_child_of_queued_parent_goes_to_pool() {
    let mut manager = manager();
    let (tx, rx) = mpsc::channel();
    let child = Process::threaded(
        "upload",
        ProcessFn::new(move |ctl, _| {
            tx.send(thread::current().id()).ok();
            ctl.succeed();
            Ok(())
        }),
    );
    let child_id = child.id();
    let (parent_recorder, _) = Recorder::new();
    manager
        .attach_process(Process::queued("bake", parent_recorder.succeed_after(1)).then(child), false)
        .unwrap();

    manager.tick(0.016).unwrap();
    assert!(!manager.main_queue().contains(child_id));
    assert!(manager.threaded_queue().contains(child_id));
    assert_eq!(manager.stats().handoff_processes, 0);

    let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_ne!(worker, thread::current().id());
}

#[test]
fn test_threaded_child_of_dedicated_parent_goes_to_pool() {
    let mut manager = manager();
    let (child_recorder, child_calls) = Recorder::new();
    let child = Process::threaded("stream", child_recorder.succeed_after(1));
    let child_id = child.id();
    let (parent_recorder, _) = Recorder::new();
    manager
        .attach_to_thread(
            DedicatedThreadType::Animation,
            Process::queued("clip", parent_recorder.succeed_after(1)).then(child),
            false,
        )
        .unwrap();

    assert!(wait_until(|| manager.stats().handoff_processes == 1));
    manager.tick(0.016).unwrap();
    assert!(manager.threaded_queue().contains(child_id));
    assert!(wait_until(|| child_calls.lock().success == 1));
    let thread = manager.dedicated_thread(DedicatedThreadType::Animation).unwrap();
    assert!(!thread.contains(child_id));
}

#[test]
fn test_queued_child_stays_on_dedicated_thread() {
    let manager = manager();
    let (child_recorder, child_calls) = Recorder::new();
    let child = Process::queued("blend", child_recorder);
    let child_id = child.id();
    let (parent_recorder, _) = Recorder::new();
    manager
        .attach_to_thread(
            DedicatedThreadType::Animation,
            Process::queued("clip", parent_recorder.succeed_after(1)).then(child),
            false,
        )
        .unwrap();

    let thread = manager.dedicated_thread(DedicatedThreadType::Animation).unwrap();
    assert!(wait_until(|| child_calls.lock().update > 0));
    assert!(thread.contains(child_id));
    assert!(!manager.main_queue().contains(child_id));
    assert_eq!(child_calls.lock().init, 1);
}

#[test]
fn test_abort_of_finished_process_is_not_a_miss() {
    let mut manager = manager();
    let handle = manager
        .attach_process(Process::queued("done", ProcessFn::new(|_, _| Ok(()))), true)
        .unwrap();
    handle.control().unwrap().succeed();

    assert_eq!(manager.abort_process(handle.id(), true), Ok(false));
    assert_eq!(handle.state(), Some(ProcessState::Succeeded));
    manager.tick(0.016).unwrap();
    assert!(!manager.main_queue().contains(handle.id()));
}

#[test]
fn test_abort_finds_process_in_any_queue() {
    let mut manager = manager();
    let main = manager
        .attach_process(Process::queued("main", ProcessFn::new(|_, _| Ok(()))), true)
        .unwrap();
    let anim = manager
        .attach_to_thread(
            DedicatedThreadType::Animation,
            Process::queued("anim", ProcessFn::new(|_, _| Ok(()))),
            true,
        )
        .unwrap();
    let worker = manager
        .attach_process(Process::threaded("worker", ProcessFn::new(|_, _| Ok(()))), true)
        .unwrap();

    assert_eq!(manager.abort_process(main.id(), true), Ok(true));
    assert_eq!(manager.abort_process(anim.id(), true), Ok(true));
    assert_eq!(manager.abort_process(worker.id(), true), Ok(true));
    assert_eq!(manager.abort_process(worker.id(), true), Ok(false));
    assert_eq!(manager.stats().total_processes(), 0);
}

#[test]
fn test_sorting_layers_round_trip() {
    let mut manager = ProcessManager::builder()
        .with_worker_threads(2)
        .without_dedicated_threads()
        .with_sorting_layer("world")
        .with_sorting_layer("hud")
        .build()
        .unwrap();
    let json = manager.sorting_layers_json();
    assert_eq!(
        json,
        serde_json::json!({ "sorting_layers": [
            { "id": 1, "name": "world" },
            { "id": 2, "name": "hud" },
        ]})
    );

    manager.remove_sorting_layer("world").unwrap();
    assert_eq!(manager.add_sorting_layer("hud"), Err(SchedulerError::SortingLayerExists("hud".into())));
    assert_eq!(manager.remove_sorting_layer("default"), Err(SchedulerError::DefaultSortingLayer));

    manager.load_sorting_layers_json(&json).unwrap();
    assert_eq!(manager.main_queue().sorting_layers().id_of("world"), Some(1));
    assert_eq!(manager.main_queue().sorting_layers().len(), 3);
}

#[test]
fn test_stats_snapshot() {
    let mut manager = manager();
    manager
        .attach_process(Process::queued("p", ProcessFn::new(|_, _| Ok(()))), false)
        .unwrap();
    let stats = manager.stats();
    assert_eq!(stats.main_queue_processes, 1);
    assert_eq!(stats.worker_threads, 2);
    assert_eq!(stats.dedicated_threads.len(), 1);
    assert_eq!(stats.dedicated_threads[0].thread, DedicatedThreadType::Animation);
    assert!(stats.dedicated_threads[0].running);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["main_queue_processes"], 1);
}

#[test]
fn test_shutdown_stops_threads() {
    let mut manager = manager();
    let (recorder, calls) = Recorder::new();
    manager.attach_process(Process::threaded("spin", recorder), true).unwrap();

    manager.shutdown().unwrap();
    assert_eq!(calls.lock().abort, 1);
    let stats = manager.stats();
    assert_eq!(stats.total_processes(), 0);
    assert!(!stats.dedicated_threads[0].running);
}
