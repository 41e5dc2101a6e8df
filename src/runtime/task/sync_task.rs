use super::handle::TaskHandle;
use super::sequence::{Producer, Sequence, Step, SyncRoutine};
use super::state::{SeqState, TaskState};
use crate::error::{Result, TaskError};
use crate::runtime::core::RuntimeHandle;
use crate::sync::CancellationToken;

use tracing::{debug, trace, warn};

/// A task that advances a synchronous lazy sequence by one element per
/// [`move_next`](Self::move_next).
///
/// The sequence is created from the routine on the first step, never
/// earlier and never twice. `move_next` never suspends.
///
/// ```rust
/// use framestep::task::{Producer, SyncTask, TaskHandle, from_iter};
/// use framestep::RuntimeBuilder;
///
/// let runtime = RuntimeBuilder::new().build();
/// let mut task = SyncTask::<i32, _>::new(runtime.handle(), None, || {
///     Producer::Sequence(from_iter([1, 2]))
/// });
/// let handle = TaskHandle::detached();
/// task.set_handle(handle.clone());
///
/// while !task.is_done() {
///     task.move_next().unwrap();
/// }
/// assert_eq!(handle.value(), Some(2));
/// ```
pub struct SyncTask<T, R: SyncRoutine<T>> {
    runtime: Option<RuntimeHandle>,
    token: Option<CancellationToken>,
    routine: Option<R>,
    seq: SeqState<R::Seq>,
    /// Last yielded value, used when the sequence completes without one.
    last: Option<T>,
    handle: Option<TaskHandle<T>>,
    done: bool,
    disposed: bool,
}

impl<T, R: SyncRoutine<T>> SyncTask<T, R> {
    pub fn new(runtime: RuntimeHandle, token: Option<CancellationToken>, routine: R) -> Self {
        Self {
            runtime: Some(runtime),
            token,
            routine: Some(routine),
            seq: SeqState::Unstarted,
            last: None,
            handle: None,
            done: false,
            disposed: false,
        }
    }

    /// Advances the task by one element.
    ///
    /// - Observing cancellation marks the task done without consuming an
    ///   element or delivering a completion value.
    /// - The first call creates the sequence; an empty producer marks the
    ///   task done.
    /// - When the sequence completes, the bound handle receives the final
    ///   value. This happens once; calls after the task is done are no-ops.
    ///
    /// # Errors
    ///
    /// [`TaskError::Disposed`] after [`dispose`](Self::dispose), the
    /// sequence's own error on the step that fails, and
    /// [`TaskError::Faulted`] on every call after that.
    pub fn move_next(&mut self) -> Result<()> {
        if self.disposed {
            return Err(TaskError::Disposed);
        }
        if self.done {
            return Ok(());
        }

        if self.is_cancellation_requested() {
            trace!("sync task observed cancellation");
            self.done = true;
            return Ok(());
        }

        if self.seq.is_unstarted() {
            let Some(routine) = self.routine.as_mut() else {
                return Err(TaskError::Disposed);
            };

            match routine.task() {
                Producer::Empty => {
                    trace!("sync task produced no sequence");
                    self.seq = SeqState::Exhausted;
                    self.done = true;
                    return Ok(());
                }
                Producer::Sequence(seq) => self.seq = SeqState::Running(seq),
            }
        }

        let seq = match &mut self.seq {
            SeqState::Running(seq) => seq,
            SeqState::Faulted => return Err(TaskError::Faulted),
            SeqState::Unstarted | SeqState::Exhausted => return Ok(()),
        };

        match seq.resume() {
            Ok(Step::Yield(value)) => {
                self.last = Some(value);
                Ok(())
            }
            Ok(Step::Complete(value)) => {
                self.seq = SeqState::Exhausted;
                self.done = true;
                let value = value.or_else(|| self.last.take());
                self.complete(value);
                Ok(())
            }
            Err(error) => {
                self.seq = SeqState::Faulted;
                Err(error)
            }
        }
    }

    fn complete(&mut self, value: Option<T>) {
        match &self.handle {
            Some(handle) => handle.invoke_done(value),
            None => warn!("sync task completed with no bound handle"),
        }
    }

    /// Releases the runtime, handle, routine, and sequence.
    ///
    /// Idempotent. A disposed task reads as not done: it no longer stands
    /// for any task, finished or otherwise.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        debug!("sync task disposed");
        self.disposed = true;
        self.done = false;
        self.runtime = None;
        self.handle = None;
        self.routine = None;
        self.seq = SeqState::Exhausted;
        self.last = None;
    }

    pub fn set_handle(&mut self, handle: TaskHandle<T>) {
        self.handle = Some(handle);
    }

    pub fn handle(&self) -> Option<&TaskHandle<T>> {
        self.handle.as_ref()
    }

    pub fn runtime(&self) -> Option<&RuntimeHandle> {
        self.runtime.as_ref()
    }

    pub fn token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(CancellationToken::is_cancellation_requested)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn state(&self) -> TaskState {
        if self.disposed {
            return TaskState::Disposed;
        }
        if self.done {
            return TaskState::Done;
        }

        match self.seq {
            SeqState::Unstarted => TaskState::Uninitialized,
            SeqState::Running(_) => TaskState::Running,
            SeqState::Faulted => TaskState::Faulted,
            SeqState::Exhausted => TaskState::Done,
        }
    }
}
