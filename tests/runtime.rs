use framestep::task::{
    AsyncRoutine, Producer, Step, StepFn, StepFuture, SyncTask, TaskHandle, from_fn, from_iter,
    step_fn,
};
use framestep::{CancellationToken, RuntimeBuilder, TaskError, yield_now, yield_ticks};

use futures::FutureExt;

use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_update_drives_sync_task_to_completion() {
    let mut runtime = RuntimeBuilder::new().build();
    let handle = runtime.spawn_sync::<u32, _>(|| Producer::Sequence(from_iter([1, 2, 3])), None);
    let id = handle.id().unwrap();

    for frame in 1..=3 {
        let report = runtime.update();
        assert_eq!(report.frame, frame);
        assert!(report.completed.is_empty());
        assert!(!handle.is_done());
    }

    let report = runtime.update();
    assert_eq!(report.completed, vec![id]);
    assert!(report.faulted.is_empty());
    assert_eq!(handle.value(), Some(3));

    // Freed at the end of the completing tick.
    assert!(!runtime.contains(id));
    assert!(runtime.is_empty());
    assert!(handle.in_the_pool());
    assert!(!handle.is_valid());
}

#[test]
fn test_manual_free_keeps_finished_tasks() {
    let mut runtime = RuntimeBuilder::new().auto_free(false).build();
    let handle = runtime.spawn_sync::<u32, _>(|| Producer::Sequence(from_iter([9])), None);
    let id = handle.id().unwrap();
    assert!(!handle.auto_free());

    runtime.update();
    let report = runtime.update();
    assert_eq!(report.completed, vec![id]);
    assert!(runtime.contains(id));
    assert!(handle.is_valid());

    // A finished task is not stepped or reported again.
    let report = runtime.update();
    assert!(report.completed.is_empty());

    assert!(runtime.free_task(id));
    assert!(!runtime.free_task(id));
    assert!(handle.in_the_pool());
    assert_eq!(handle.value(), Some(9));
}

#[test]
fn test_handle_can_opt_out_of_auto_free() {
    let mut runtime = RuntimeBuilder::new().build();
    let handle = runtime.spawn_sync::<u32, _>(|| Producer::Sequence(from_iter([1])), None);
    handle.set_auto_free(false);

    runtime.update();
    runtime.update();

    assert!(handle.is_done());
    assert!(runtime.contains(handle.id().unwrap()));
}

#[test]
fn test_freed_slot_is_reused_with_a_new_generation() {
    let mut runtime = RuntimeBuilder::new().initial_capacity(1).build();
    let first = runtime.wait_next_frame(None);
    let first_id = first.id().unwrap();

    runtime.update();
    assert!(!runtime.contains(first_id));

    let second = runtime.wait_next_frame(None);
    let second_id = second.id().unwrap();

    assert_eq!(first_id.index(), second_id.index());
    assert_ne!(first_id.generation(), second_id.generation());
    assert!(runtime.contains(second_id));
    assert!(!runtime.free_task(first_id));
    assert!(runtime.contains(second_id));
}

#[test]
fn test_pool_grows_past_initial_capacity() {
    let mut runtime = RuntimeBuilder::new().initial_capacity(2).build();
    let handles: Vec<_> = (0..5).map(|_| runtime.wait_delay_frame(2, None)).collect();
    assert_eq!(runtime.len(), 5);

    runtime.update();
    let report = runtime.update();

    assert_eq!(report.completed.len(), 5);
    assert!(handles.iter().all(TaskHandle::is_done));
    assert!(runtime.is_empty());
}

#[test]
fn test_wait_next_frame_completes_on_next_update() {
    let mut runtime = RuntimeBuilder::new().build();
    runtime.update();

    let handle = runtime.wait_next_frame(None);
    runtime.update();

    assert!(handle.is_done());
    assert_eq!(handle.value(), Some(2));
}

#[test]
fn test_wait_delay_frame_counts_updates() {
    let mut runtime = RuntimeBuilder::new().build();
    let handle = runtime.wait_delay_frame(3, None);

    runtime.update();
    runtime.update();
    assert!(!handle.is_done());

    runtime.update();
    assert!(handle.is_done());
    assert_eq!(handle.value(), Some(3));
}

#[test]
fn test_wait_delay_zero_acts_like_next_frame() {
    let mut runtime = RuntimeBuilder::new().build();
    let handle = runtime.wait_delay_frame(0, None);

    runtime.update();

    assert_eq!(handle.value(), Some(1));
}

#[test]
fn test_wait_until_checks_once_per_update() {
    let mut runtime = RuntimeBuilder::new().build();
    let ready = Rc::new(Cell::new(false));
    let checks = Rc::new(Cell::new(0));

    let handle = {
        let ready = ready.clone();
        let checks = checks.clone();
        runtime.wait_until(
            move || {
                checks.set(checks.get() + 1);
                ready.get()
            },
            None,
        )
    };

    runtime.update();
    runtime.update();
    assert!(!handle.is_done());
    assert_eq!(checks.get(), 2);

    ready.set(true);
    runtime.update();
    assert_eq!(handle.value(), Some(3));
    assert_eq!(checks.get(), 3);
}

#[test]
fn test_cancelled_wait_resolves_awaiters_with_none() {
    let mut runtime = RuntimeBuilder::new().build();
    let token = CancellationToken::new();
    let handle = runtime.wait_delay_frame(10, Some(token.clone()));
    let id = handle.id().unwrap();

    runtime.update();
    token.cancel();
    let report = runtime.update();

    assert_eq!(report.completed, vec![id]);
    assert!(!handle.is_done());
    assert!(handle.in_the_pool());
    assert_eq!(handle.clone().now_or_never(), Some(None));
}

#[test]
fn test_faulted_task_is_reported_and_freed() {
    let mut runtime = RuntimeBuilder::new().auto_free(false).build();
    let handle = runtime.spawn_sync::<u32, _>(
        || {
            Producer::Sequence(from_fn(|| -> framestep::Result<Step<u32>> {
                Err(TaskError::step("no such asset"))
            }))
        },
        None,
    );
    let healthy = runtime.wait_delay_frame(2, None);
    let id = handle.id().unwrap();

    let report = runtime.update();

    assert_eq!(report.faulted.len(), 1);
    let (faulted_id, error) = &report.faulted[0];
    assert_eq!(*faulted_id, id);
    assert!(matches!(error, TaskError::Step(_)));

    assert!(!runtime.contains(id));
    assert!(handle.in_the_pool());
    assert_eq!(handle.clone().now_or_never(), Some(None));

    // The failure does not stall the other tasks.
    runtime.update();
    assert!(healthy.is_done());
}

#[test]
fn test_run_sync_binds_a_pooled_handle() {
    let mut runtime = RuntimeBuilder::new().build();
    let task = SyncTask::<u32, _>::new(runtime.handle(), None, || {
        Producer::Sequence(from_iter([4, 5]))
    });

    let handle = runtime.run_sync(task);
    assert!(handle.id().is_some());
    assert!(runtime.contains(handle.id().unwrap()));

    while !handle.is_done() {
        runtime.update();
    }
    assert_eq!(handle.value(), Some(5));
}

#[test]
fn test_on_done_fires_from_update_and_after_the_fact() {
    let mut runtime = RuntimeBuilder::new().build();
    let handle = runtime.wait_next_frame(None);

    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    handle.on_done(move |h| {
        assert_eq!(h.value(), Some(1));
        counter.set(counter.get() + 1);
    });

    runtime.update();
    assert_eq!(fired.get(), 1);

    let counter = fired.clone();
    handle.on_done(move |_| counter.set(counter.get() + 10));
    assert_eq!(fired.get(), 11);
}

#[test]
fn test_invoke_done_keeps_the_first_value() {
    let handle = TaskHandle::detached();
    handle.invoke_done(Some(1));
    handle.invoke_done(Some(2));

    assert!(handle.is_done());
    assert_eq!(handle.value(), Some(1));
    assert_eq!(handle.take_value(), Some(1));
    assert_eq!(handle.value(), None);
}

#[test]
fn test_dropping_the_runtime_releases_handles() {
    let mut runtime = RuntimeBuilder::new().build();
    let handle = runtime.wait_delay_frame(5, None);

    drop(runtime);

    assert!(handle.in_the_pool());
    assert!(!handle.is_done());
    assert_eq!(handle.now_or_never(), Some(None));
}

/// Async routine that counts its per-tick updates.
struct Ticking {
    updates: Rc<Cell<u32>>,
}

impl AsyncRoutine<u32> for Ticking {
    type Seq = StepFn<Box<dyn FnMut() -> StepFuture<u32>>>;

    fn task(&mut self) -> Producer<Self::Seq> {
        let mut n = 0;
        let next: Box<dyn FnMut() -> StepFuture<u32>> = Box::new(move || {
            let current = n;
            n += 1;
            async move {
                yield_now().await;
                Ok::<_, TaskError>(if current < 2 {
                    Step::Yield(current)
                } else {
                    Step::Complete(Some(current))
                })
            }
            .boxed_local()
        });
        Producer::Sequence(step_fn(next))
    }

    fn update(&mut self) {
        self.updates.set(self.updates.get() + 1);
    }
}

#[test]
fn test_async_task_keeps_one_step_in_flight_across_ticks() {
    let mut runtime = RuntimeBuilder::new().build();
    let updates = Rc::new(Cell::new(0));
    let handle = runtime.spawn_async(
        Ticking {
            updates: updates.clone(),
        },
        None,
    );

    let mut ticks = 0;
    while !handle.is_done() {
        runtime.update();
        ticks += 1;
        assert!(ticks <= 6, "task did not finish in time");
    }

    // Each of the three steps yields once, so it takes two ticks.
    assert_eq!(ticks, 6);
    assert_eq!(updates.get(), 3);
    assert_eq!(handle.value(), Some(2));
    assert!(runtime.is_empty());
}

#[test]
fn test_async_task_with_closure_routine() {
    let mut runtime = RuntimeBuilder::new().build();
    let handle = runtime.spawn_async::<&'static str, _>(
        || {
            Producer::Sequence(step_fn(|| async {
                yield_ticks(3).await;
                Ok::<_, TaskError>(Step::Complete(Some("loaded")))
            }))
        },
        None,
    );

    for _ in 0..3 {
        runtime.update();
        assert!(!handle.is_done());
    }
    runtime.update();

    assert_eq!(handle.value(), Some("loaded"));
}

#[test]
fn test_cancelled_async_task_finishes_after_its_step() {
    let mut runtime = RuntimeBuilder::new().build();
    let token = CancellationToken::new();
    let handle = runtime.spawn_async(
        Ticking {
            updates: Rc::new(Cell::new(0)),
        },
        Some(token.clone()),
    );
    let id = handle.id().unwrap();

    runtime.update();
    token.cancel();

    // The in-flight step resolves; the next call observes cancellation.
    let report = runtime.update();
    assert!(report.completed.is_empty());
    let report = runtime.update();
    assert_eq!(report.completed, vec![id]);

    assert!(!handle.is_done());
    assert!(handle.in_the_pool());
}

#[test]
#[should_panic(expected = "initial_capacity must be > 0")]
fn test_zero_capacity_is_rejected() {
    let _ = RuntimeBuilder::new().initial_capacity(0);
}
