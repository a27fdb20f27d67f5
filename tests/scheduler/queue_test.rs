/*!
 * Process Queue Tests
 * Phase driving, sweeps, ordering and chaining on a single queue
 */

use super::common::Recorder;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use reverie_scheduler::scheduler::FixedTimestep;
use reverie_scheduler::{
    Process, ProcessError, ProcessFn, ProcessQueue, ProcessState, SchedulerError, UpdatePhase,
};
use std::sync::Arc;

fn idle(name: &str) -> Process {
    Process::queued(name, ProcessFn::new(|_, _| Ok(())))
}

fn full_tick(queue: &mut ProcessQueue, delta_seconds: f64) {
    queue.step(UpdatePhase::Update, delta_seconds).unwrap();
    queue.step(UpdatePhase::LateUpdate, delta_seconds).unwrap();
    queue.step(UpdatePhase::PostUpdate, delta_seconds).unwrap();
}

#[test]
fn test_hooks_called_once_per_tick() {
    let mut queue = ProcessQueue::new();
    let (recorder, calls) = Recorder::new();
    let handle = queue.attach_process(Process::queued("p", recorder), false).unwrap();

    for _ in 0..7 {
        full_tick(&mut queue, 0.016);
    }

    assert!(queue.contains(handle.id()));
    let calls = calls.lock().clone();
    assert_eq!(calls.init, 1);
    assert_eq!(calls.update, 7);
    assert_eq!(calls.late_update, 7);
    assert_eq!(calls.post_update, 7);
}

#[test]
fn test_runaway_delta_is_bounded() {
    let mut queue = ProcessQueue::new();
    let mut timestep = FixedTimestep::new(0.001).with_max_steps(8);
    let (recorder, calls) = Recorder::new();
    queue.attach_process(Process::queued("x", recorder), false).unwrap();

    assert_eq!(queue.tick(f64::INFINITY, &mut timestep).unwrap(), 0);
    assert_eq!(queue.tick(1e9, &mut timestep).unwrap(), 8);
    let calls = calls.lock().clone();
    assert_eq!(calls.fixed_update, 8);
    assert_eq!(calls.update, 2);
}

#[test]
fn test_fixed_steps_follow_accumulator() {
    let mut queue = ProcessQueue::new();
    let mut timestep = FixedTimestep::new(0.1);
    let (recorder, calls) = Recorder::new();
    queue.attach_process(Process::queued("x", recorder), false).unwrap();

    assert_eq!(queue.tick(0.25, &mut timestep).unwrap(), 3);
    assert_eq!(calls.lock().fixed_update, 3);
    assert!((timestep.accumulator() + 0.05).abs() < 1e-9);

    assert_eq!(queue.tick(0.06, &mut timestep).unwrap(), 0);
    assert_eq!(calls.lock().fixed_update, 3);

    assert_eq!(queue.tick(0.01, &mut timestep).unwrap(), 0);
    let calls = calls.lock().clone();
    assert_eq!(calls.fixed_update, 3);
    assert_eq!(calls.update, 3);
    assert_eq!(calls.init, 1);
}

#[test]
fn test_sweep_sorts_by_layer() {
    let mut queue = ProcessQueue::new();
    let first = queue.add_sorting_layer("first").unwrap();
    let second = queue.add_sorting_layer("second").unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for (layer, label) in [(second, "two"), (0, "zero"), (first, "one")] {
        let (recorder, _) = Recorder::new();
        let process = Process::queued(label, recorder.tracing_order(Arc::clone(&order), label))
            .on_sorting_layer(layer);
        queue.attach_process(process, true).unwrap();
    }

    // Insertion order until the first sweep
    queue.step(UpdatePhase::Update, 0.1).unwrap();
    assert_eq!(*order.lock(), vec!["two", "zero", "one"]);

    queue.step(UpdatePhase::PostUpdate, 0.1).unwrap();
    order.lock().clear();
    queue.step(UpdatePhase::Update, 0.1).unwrap();
    assert_eq!(*order.lock(), vec!["zero", "one", "two"]);
}

#[test]
fn test_removing_layer_moves_processes_to_default() {
    let mut queue = ProcessQueue::new();
    let fx = queue.add_sorting_layer("fx").unwrap();
    let handle = queue.attach_process(idle("p").on_sorting_layer(fx), false).unwrap();

    queue.remove_sorting_layer("fx").unwrap();
    assert_eq!(handle.control().unwrap().sorting_layer(), 0);
    assert_eq!(
        queue.remove_sorting_layer("fx"),
        Err(SchedulerError::SortingLayerNotFound("fx".into()))
    );
}

#[test]
fn test_child_promoted_into_same_queue() {
    let mut queue = ProcessQueue::new();
    let (parent_recorder, parent_calls) = Recorder::new();
    let (child_recorder, child_calls) = Recorder::new();
    let child = Process::queued("child", child_recorder);
    let child_id = child.id();
    let parent = Process::queued("parent", parent_recorder.succeed_after(1)).then(child);
    let parent_handle = queue.attach_process(parent, false).unwrap();

    full_tick(&mut queue, 0.1);
    assert_eq!(parent_calls.lock().success, 1);
    assert!(parent_handle.is_expired());
    assert!(queue.contains(child_id));
    assert_eq!(queue.process(child_id).unwrap().state(), ProcessState::Uninitialized);

    full_tick(&mut queue, 0.1);
    full_tick(&mut queue, 0.1);
    let child_calls = child_calls.lock().clone();
    assert_eq!(child_calls.init, 1);
    assert_eq!(child_calls.update, 2);
}

#[test]
fn test_failed_parent_drops_child() {
    let mut queue = ProcessQueue::new();
    let child = idle("child");
    let child_id = child.id();
    let handle = queue.attach_process(idle("parent").then(child), true).unwrap();

    handle.control().unwrap().fail();
    full_tick(&mut queue, 0.1);
    assert!(queue.is_empty());
    assert!(!queue.contains(child_id));
}

#[test]
fn test_immediate_abort_runs_hook_synchronously() {
    let mut queue = ProcessQueue::new();
    let (recorder, calls) = Recorder::new();
    let handle = queue.attach_process(Process::queued("y", recorder), true).unwrap();

    assert!(queue.abort_process(handle.id(), true));
    assert_eq!(calls.lock().abort, 1);
    assert!(!queue.contains(handle.id()));
    assert!(handle.is_expired());
}

#[test]
fn test_deferred_abort_resolves_on_sweep() {
    let mut queue = ProcessQueue::new();
    let (recorder, calls) = Recorder::new();
    let handle = queue.attach_process(Process::queued("y", recorder), true).unwrap();

    assert!(queue.abort_process(handle.id(), false));
    assert_eq!(handle.state(), Some(ProcessState::Aborted));
    assert_eq!(calls.lock().abort, 0);
    assert!(queue.contains(handle.id()));

    queue.step(UpdatePhase::PostUpdate, 0.1).unwrap();
    assert_eq!(calls.lock().abort, 1);
    assert!(!queue.contains(handle.id()));
}

#[test]
fn test_hook_error_propagates_without_losing_processes() {
    let mut queue = ProcessQueue::new();
    queue.attach_process(idle("a"), false).unwrap();
    let (recorder, _) = Recorder::new();
    queue
        .attach_process(
            Process::queued("bad", recorder.failing(ProcessError::failed("boom"))),
            false,
        )
        .unwrap();
    queue.attach_process(idle("c"), false).unwrap();

    assert_eq!(
        queue.step(UpdatePhase::Update, 0.1),
        Err(ProcessError::failed("boom"))
    );
    assert_eq!(queue.len(), 3);
    queue.step(UpdatePhase::PostUpdate, 0.1).unwrap();
    assert_eq!(queue.len(), 3);
}

#[test]
fn test_clear_aborts_everything() {
    let mut queue = ProcessQueue::new();
    let (recorder, calls) = Recorder::new();
    queue.attach_process(Process::queued("a", recorder), true).unwrap();
    queue.attach_process(idle("b"), false).unwrap();

    queue.clear_processes();
    assert!(queue.is_empty());
    assert_eq!(calls.lock().abort, 1);
}

#[test]
fn test_reattach_unknown_process() {
    let mut queue = ProcessQueue::new();
    let stray = idle("stray");
    assert_eq!(
        queue.reattach_process(stray.id()),
        Err(SchedulerError::ProcessNotFound(stray.id()))
    );
}

proptest! {
    #[test]
    fn prop_sweep_is_stable_sort_by_layer(layers in prop::collection::vec(0u32..4, 0..24)) {
        let mut queue = ProcessQueue::new();
        let mut attached = Vec::new();
        for (index, layer) in layers.iter().enumerate() {
            let process = idle(&format!("p{}", index)).on_sorting_layer(*layer);
            attached.push((*layer, process.id()));
            queue.attach_process(process, false).unwrap();
        }

        queue.step(UpdatePhase::PostUpdate, 0.1).unwrap();

        attached.sort_by_key(|(layer, _)| *layer);
        let expected: Vec<_> = attached.into_iter().map(|(_, id)| id).collect();
        prop_assert_eq!(queue.process_ids(), expected);
    }
}
