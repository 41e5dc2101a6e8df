use framestep::task::{
    Iter, Producer, Step, SyncRoutine, SyncTask, TaskHandle, TaskState, from_fn, from_iter,
};
use framestep::{CancellationToken, RuntimeBuilder, TaskError};

use std::cell::Cell;
use std::rc::Rc;

/// Routine that counts how often its sequence is created.
struct Counted {
    items: Vec<i32>,
    created: Rc<Cell<u32>>,
}

impl SyncRoutine<i32> for Counted {
    type Seq = Iter<std::vec::IntoIter<i32>>;

    fn task(&mut self) -> Producer<Self::Seq> {
        self.created.set(self.created.get() + 1);
        if self.items.is_empty() {
            return Producer::Empty;
        }
        Producer::Sequence(from_iter(self.items.clone()))
    }
}

fn counted(items: Vec<i32>) -> (Counted, Rc<Cell<u32>>) {
    let created = Rc::new(Cell::new(0));
    let routine = Counted {
        items,
        created: created.clone(),
    };
    (routine, created)
}

#[test]
fn test_yields_each_element_then_completes_with_the_last() {
    let runtime = RuntimeBuilder::new().build();
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, || {
        Producer::Sequence(from_iter([1, 2, 3]))
    });
    let handle = TaskHandle::detached();
    task.set_handle(handle.clone());

    let fired = Rc::new(Cell::new(None));
    let seen = fired.clone();
    handle.on_done(move |h| seen.set(Some(h.value())));

    for _ in 0..3 {
        task.move_next().unwrap();
        assert!(!task.is_done());
        assert_eq!(task.state(), TaskState::Running);
    }
    assert_eq!(fired.get(), None);

    task.move_next().unwrap();

    assert!(task.is_done());
    assert_eq!(task.state(), TaskState::Done);
    assert_eq!(handle.value(), Some(3));
    assert_eq!(fired.get(), Some(Some(3)));
}

#[test]
fn test_explicit_completion_value_wins_over_last_yield() {
    let runtime = RuntimeBuilder::new().build();
    let mut n = 0;
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, move || {
        Producer::Sequence(from_fn(move || -> framestep::Result<Step<i32>> {
            n += 1;
            Ok(if n < 3 {
                Step::Yield(n)
            } else {
                Step::Complete(Some(100))
            })
        }))
    });
    let handle = TaskHandle::detached();
    task.set_handle(handle.clone());

    while !task.is_done() {
        task.move_next().unwrap();
    }

    assert_eq!(handle.value(), Some(100));
}

#[test]
fn test_pre_cancelled_token_finishes_without_creating_the_sequence() {
    let runtime = RuntimeBuilder::new().build();
    let token = CancellationToken::new();
    token.cancel();

    let (routine, created) = counted(vec![1, 2]);
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), Some(token), routine);
    let handle = TaskHandle::detached();
    task.set_handle(handle.clone());

    task.move_next().unwrap();

    assert!(task.is_done());
    assert_eq!(created.get(), 0);
    assert!(!handle.is_done());
    assert_eq!(handle.value(), None);
}

#[test]
fn test_cancellation_between_steps_stops_without_completion() {
    let runtime = RuntimeBuilder::new().build();
    let token = CancellationToken::new();

    let (routine, _) = counted(vec![1, 2, 3]);
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), Some(token.child()), routine);
    let handle = TaskHandle::detached();
    task.set_handle(handle.clone());

    task.move_next().unwrap();
    assert!(!task.is_done());

    // Cancelling the parent does not reach the task's child token.
    token.cancel();
    task.move_next().unwrap();
    assert!(!task.is_done());
    assert!(!task.is_cancellation_requested());

    task.token().unwrap().cancel();
    task.move_next().unwrap();

    assert!(task.is_done());
    assert!(!handle.is_done());
}

#[test]
fn test_empty_producer_is_done_and_never_asked_again() {
    let runtime = RuntimeBuilder::new().build();
    let (routine, created) = counted(Vec::new());
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, routine);
    let handle = TaskHandle::detached();
    task.set_handle(handle.clone());

    task.move_next().unwrap();
    task.move_next().unwrap();

    assert!(task.is_done());
    assert_eq!(created.get(), 1);
    assert!(!handle.is_done());
}

#[test]
fn test_sequence_is_created_once() {
    let runtime = RuntimeBuilder::new().build();
    let (routine, created) = counted(vec![1, 2, 3]);
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, routine);
    task.set_handle(TaskHandle::detached());

    for _ in 0..4 {
        task.move_next().unwrap();
    }

    assert!(task.is_done());
    assert_eq!(created.get(), 1);
}

#[test]
fn test_completion_fires_once() {
    let runtime = RuntimeBuilder::new().build();
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, || {
        Producer::Sequence(from_iter([7]))
    });
    let handle = TaskHandle::detached();
    task.set_handle(handle.clone());

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    handle.on_done(move |_| counter.set(counter.get() + 1));

    for _ in 0..5 {
        task.move_next().unwrap();
    }

    assert_eq!(calls.get(), 1);
    assert_eq!(handle.value(), Some(7));
}

#[test]
fn test_dispose_reads_not_done_and_never_recreates() {
    let runtime = RuntimeBuilder::new().build();
    let (routine, created) = counted(vec![1, 2, 3]);
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, routine);
    let handle = TaskHandle::detached();
    task.set_handle(handle.clone());

    task.move_next().unwrap();
    task.dispose();

    assert!(!task.is_done());
    assert!(task.is_disposed());
    assert_eq!(task.state(), TaskState::Disposed);
    assert!(task.handle().is_none());
    assert!(task.runtime().is_none());

    assert!(matches!(task.move_next(), Err(TaskError::Disposed)));
    assert_eq!(created.get(), 1);
    assert!(!handle.is_done());
}

#[test]
fn test_dispose_after_completion_reads_not_done() {
    let runtime = RuntimeBuilder::new().build();
    let (routine, _) = counted(vec![1]);
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, routine);
    task.set_handle(TaskHandle::detached());

    task.move_next().unwrap();
    task.move_next().unwrap();
    assert!(task.is_done());

    task.dispose();
    assert!(!task.is_done());
}

#[test]
fn test_dispose_twice_is_harmless() {
    let runtime = RuntimeBuilder::new().build();
    let (routine, created) = counted(vec![1, 2]);
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, routine);

    task.dispose();
    task.dispose();

    assert!(task.is_disposed());
    assert!(!task.is_done());
    assert!(matches!(task.move_next(), Err(TaskError::Disposed)));
    assert_eq!(created.get(), 0);
}

#[test]
fn test_step_error_propagates_then_faults() {
    let runtime = RuntimeBuilder::new().build();
    let mut calls = 0;
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, move || {
        Producer::Sequence(from_fn(move || {
            calls += 1;
            if calls == 1 {
                Ok(Step::Yield(1))
            } else {
                Err(TaskError::step("sequence broke"))
            }
        }))
    });
    let handle = TaskHandle::detached();
    task.set_handle(handle.clone());

    task.move_next().unwrap();

    let err = task.move_next().unwrap_err();
    assert!(matches!(err, TaskError::Step(_)));
    assert_eq!(err.to_string(), "sequence step failed: sequence broke");

    assert!(matches!(task.move_next(), Err(TaskError::Faulted)));
    assert_eq!(task.state(), TaskState::Faulted);
    assert!(!task.is_done());
    assert!(!handle.is_done());
}

#[test]
fn test_completes_without_a_bound_handle() {
    let runtime = RuntimeBuilder::new().build();
    let (routine, _) = counted(vec![1]);
    let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, routine);

    task.move_next().unwrap();
    task.move_next().unwrap();

    assert!(task.is_done());
    assert!(task.handle().is_none());
}
