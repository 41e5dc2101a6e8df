use super::async_task::{AsyncTask, MoveNext};
use super::sequence::{AsyncRoutine, SyncRoutine};
use super::sync_task::SyncTask;
use crate::error::Result;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A unit of work the runtime can step once per tick.
///
/// The `Runnable` trait erases a task's value and routine types, so the
/// runtime can keep sync and async tasks of any type in one pool as
/// `Box<dyn Runnable>`.
pub(crate) trait Runnable {
    /// Advances the task by one tick.
    fn run(&mut self, cx: &mut Context<'_>) -> Result<()>;

    fn is_done(&self) -> bool;

    /// Whether the task's handle asks to be recycled on completion.
    fn auto_free(&self) -> bool;

    /// Releases the handle back to the pool and disposes the task.
    fn free(&mut self);
}

impl<T, R> Runnable for SyncTask<T, R>
where
    R: SyncRoutine<T>,
{
    fn run(&mut self, _cx: &mut Context<'_>) -> Result<()> {
        self.move_next()
    }

    fn is_done(&self) -> bool {
        SyncTask::is_done(self)
    }

    fn auto_free(&self) -> bool {
        self.handle().is_none_or(|handle| handle.auto_free())
    }

    fn free(&mut self) {
        if let Some(handle) = self.handle() {
            handle.release();
        }
        self.dispose();
    }
}

/// Drives an [`AsyncTask`] from the tick loop.
///
/// Holds the single in-flight [`MoveNext`] between ticks. While it is
/// pending, each tick still calls `move_next` so the routine's `update`
/// hook runs, then polls the in-flight step.
pub(crate) struct AsyncDriver<T, R: AsyncRoutine<T>> {
    task: AsyncTask<T, R>,
    in_flight: Option<MoveNext<T>>,
}

impl<T, R> AsyncDriver<T, R>
where
    T: Clone + 'static,
    R: AsyncRoutine<T>,
{
    pub(crate) fn new(task: AsyncTask<T, R>) -> Self {
        Self {
            task,
            in_flight: None,
        }
    }
}

impl<T, R> Runnable for AsyncDriver<T, R>
where
    T: Clone + 'static,
    R: AsyncRoutine<T>,
{
    fn run(&mut self, cx: &mut Context<'_>) -> Result<()> {
        if self.in_flight.is_some() {
            // Placeholder call: resolves immediately, runs the update hook.
            drop(self.task.move_next());
        } else {
            self.in_flight = Some(self.task.move_next());
        }

        let Some(step) = self.in_flight.as_mut() else {
            return Ok(());
        };

        match Pin::new(step).poll(cx) {
            Poll::Pending => Ok(()),
            Poll::Ready(result) => {
                self.in_flight = None;
                result.map(drop)
            }
        }
    }

    fn is_done(&self) -> bool {
        self.task.is_done()
    }

    fn auto_free(&self) -> bool {
        self.task.handle().is_none_or(|handle| handle.auto_free())
    }

    fn free(&mut self) {
        if let Some(handle) = self.task.handle() {
            handle.release();
        }
        // Dispose first so dropping the in-flight step is not an abandon.
        self.task.dispose();
        self.in_flight = None;
    }
}
