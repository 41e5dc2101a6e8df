//! Step-wise task primitives.
//!
//! This module defines the abstractions the runtime uses to represent and
//! advance frame-driven tasks.
//!
//! It includes:
//! - the lazy step producer contract ([`Sequence`], [`AsyncSequence`],
//!   [`SyncRoutine`], [`AsyncRoutine`]),
//! - [`SyncTask`], advanced one element per call,
//! - [`AsyncTask`], whose steps may be pending, with at most one in flight,
//! - [`TaskHandle`], the one-shot completion side of a task,
//! - [`TaskState`], the observable task lifecycle.
//!
//! Tasks can be stepped by hand, or handed to a
//! [`TaskRuntime`](crate::TaskRuntime) which steps them once per tick.

pub(crate) mod core;

mod async_task;
mod handle;
mod sequence;
mod state;
mod sync_task;

pub(crate) use self::core::{AsyncDriver, Runnable};

pub use async_task::{AsyncTask, MoveNext};
pub use handle::{HandleId, TaskHandle};
pub use sequence::{
    AsyncRoutine, AsyncSequence, FromFn, Iter, Producer, Sequence, Step, StepFn, StepFuture,
    SyncRoutine, from_fn, from_iter, step_fn,
};
pub use state::TaskState;
pub use sync_task::SyncTask;
