use super::handle::TaskHandle;
use super::sequence::{AsyncRoutine, AsyncSequence, Producer, Step, StepFuture};
use super::state::{SeqState, TaskState};
use crate::error::{Result, TaskError};
use crate::runtime::core::RuntimeHandle;
use crate::sync::CancellationToken;

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use tracing::{debug, trace, warn};

/// Why a sequence stopped being resumable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Failed,
    Abandoned,
}

/// Bookkeeping shared between an [`AsyncTask`] and its in-flight
/// [`MoveNext`] future, which writes the step's outcome back.
struct StepCore<T> {
    /// Set while a step future is outstanding.
    pending: bool,
    done: bool,
    disposed: bool,
    fault: Option<Fault>,
    /// Last yielded value, used when the sequence completes without one.
    last: Option<T>,
    handle: Option<TaskHandle<T>>,
}

/// A task whose steps may each be pending.
///
/// At most one step is ever in flight. While a step is outstanding,
/// further [`move_next`](Self::move_next) calls do not start a new one;
/// they run the routine's [`update`](AsyncRoutine::update) hook and
/// resolve immediately to `None`. Callers can therefore poll every tick
/// without awaiting.
///
/// Cancellation is observed only when a new step is about to start. An
/// in-flight step always runs to completion.
pub struct AsyncTask<T, R: AsyncRoutine<T>> {
    runtime: Option<RuntimeHandle>,
    token: Option<CancellationToken>,
    routine: Option<R>,
    seq: SeqState<R::Seq>,
    core: Rc<RefCell<StepCore<T>>>,
    disposed: bool,
}

impl<T, R> AsyncTask<T, R>
where
    T: Clone + 'static,
    R: AsyncRoutine<T>,
{
    pub fn new(runtime: RuntimeHandle, token: Option<CancellationToken>, routine: R) -> Self {
        Self {
            runtime: Some(runtime),
            token,
            routine: Some(routine),
            seq: SeqState::Unstarted,
            core: Rc::new(RefCell::new(StepCore {
                pending: false,
                done: false,
                disposed: false,
                fault: None,
                last: None,
                handle: None,
            })),
            disposed: false,
        }
    }

    /// Requests cancellation on the task's token.
    ///
    /// Does nothing if the task is disposed, already cancelled, or has no
    /// token. A step already in flight is not interrupted.
    pub fn cancel(&self) {
        if self.disposed || self.is_cancellation_requested() {
            return;
        }
        if let Some(token) = &self.token {
            token.cancel();
        }
    }

    /// Starts the next step, or returns a placeholder if one is in flight.
    ///
    /// Everything up to starting the step happens now, at call time:
    /// creating the sequence, the in-flight check, the cancellation check,
    /// and pulling the step future. The returned future only drives that
    /// step. It resolves to the yielded value, to the final value when the
    /// step completes the sequence, or to `None` for placeholders and
    /// cancellation.
    ///
    /// Dropping the returned future before it resolves abandons the step:
    /// the task can no longer advance.
    pub fn move_next(&mut self) -> MoveNext<T> {
        if self.disposed {
            return MoveNext::ready(Err(TaskError::Disposed));
        }

        {
            let mut core = self.core.borrow_mut();
            if core.done {
                return MoveNext::ready(Ok(None));
            }

            if core.pending {
                drop(core);
                if let Some(routine) = self.routine.as_mut() {
                    routine.update();
                }
                return MoveNext::ready(Ok(None));
            }

            if let Some(fault) = core.fault {
                self.seq = SeqState::Faulted;
                return MoveNext::ready(Err(match fault {
                    Fault::Failed => TaskError::Faulted,
                    Fault::Abandoned => TaskError::Abandoned,
                }));
            }

            if self
                .token
                .as_ref()
                .is_some_and(CancellationToken::is_cancellation_requested)
            {
                trace!("async task observed cancellation");
                core.done = true;
                return MoveNext::ready(Ok(None));
            }
        }

        if self.seq.is_unstarted() {
            let Some(routine) = self.routine.as_mut() else {
                return MoveNext::ready(Err(TaskError::Disposed));
            };

            match routine.task() {
                Producer::Empty => {
                    trace!("async task produced no sequence");
                    self.seq = SeqState::Exhausted;
                    self.core.borrow_mut().done = true;
                    return MoveNext::ready(Ok(None));
                }
                Producer::Sequence(seq) => self.seq = SeqState::Running(seq),
            }
        }

        let step = match &mut self.seq {
            SeqState::Running(seq) => seq.resume(),
            SeqState::Faulted => return MoveNext::ready(Err(TaskError::Faulted)),
            SeqState::Unstarted | SeqState::Exhausted => return MoveNext::ready(Ok(None)),
        };

        trace!("async task step started");
        self.core.borrow_mut().pending = true;

        MoveNext {
            state: MoveNextState::Step {
                step,
                core: Rc::downgrade(&self.core),
            },
        }
    }

    /// Releases the runtime, handle, routine, sequence, and any in-flight
    /// step bookkeeping.
    ///
    /// Idempotent. An outstanding [`MoveNext`] resolves to
    /// [`TaskError::Disposed`] and writes nothing back.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        debug!("async task disposed");
        self.disposed = true;
        self.runtime = None;
        self.routine = None;
        self.seq = SeqState::Exhausted;

        let mut core = self.core.borrow_mut();
        core.disposed = true;
        core.pending = false;
        core.done = false;
        core.fault = None;
        core.last = None;
        core.handle = None;
    }

    pub fn set_handle(&mut self, handle: TaskHandle<T>) {
        self.core.borrow_mut().handle = Some(handle);
    }

    pub fn handle(&self) -> Option<TaskHandle<T>> {
        self.core.borrow().handle.clone()
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
        self.core.borrow().done
    }

    pub fn is_step_pending(&self) -> bool {
        self.core.borrow().pending
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn state(&self) -> TaskState {
        if self.disposed {
            return TaskState::Disposed;
        }

        let core = self.core.borrow();
        if core.done {
            return TaskState::Done;
        }
        if core.pending {
            return TaskState::StepPending;
        }
        if core.fault.is_some() {
            return TaskState::Faulted;
        }

        match self.seq {
            SeqState::Unstarted => TaskState::Uninitialized,
            SeqState::Running(_) => TaskState::Running,
            SeqState::Faulted => TaskState::Faulted,
            SeqState::Exhausted => TaskState::Done,
        }
    }
}

enum MoveNextState<T> {
    Ready(Result<Option<T>>),
    Step {
        step: StepFuture<T>,
        core: Weak<RefCell<StepCore<T>>>,
    },
    Complete,
}

/// Future returned by [`AsyncTask::move_next`].
#[must_use = "dropping an in-flight MoveNext abandons the step"]
pub struct MoveNext<T> {
    state: MoveNextState<T>,
}

// The output is only ever moved out, never pinned.
impl<T> Unpin for MoveNext<T> {}

impl<T> MoveNext<T> {
    fn ready(output: Result<Option<T>>) -> Self {
        Self {
            state: MoveNextState::Ready(output),
        }
    }

    /// Whether this call started a step (as opposed to returning a
    /// placeholder or an immediate outcome).
    pub fn is_step(&self) -> bool {
        matches!(self.state, MoveNextState::Step { .. })
    }
}

impl<T: Clone> Future for MoveNext<T> {
    type Output = Result<Option<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match mem::replace(&mut this.state, MoveNextState::Complete) {
            MoveNextState::Ready(output) => Poll::Ready(output),
            MoveNextState::Step { mut step, core } => match step.as_mut().poll(cx) {
                Poll::Pending => {
                    this.state = MoveNextState::Step { step, core };
                    Poll::Pending
                }
                Poll::Ready(result) => Poll::Ready(settle(&core, result)),
            },
            MoveNextState::Complete => panic!("`MoveNext` polled after completion"),
        }
    }
}

/// Writes a resolved step back into its task.
fn settle<T: Clone>(core: &Weak<RefCell<StepCore<T>>>, result: Result<Step<T>>) -> Result<Option<T>> {
    let Some(core) = core.upgrade() else {
        return Err(TaskError::Disposed);
    };

    let mut state = core.borrow_mut();
    if state.disposed {
        trace!("async step resolved after dispose, discarding");
        return Err(TaskError::Disposed);
    }
    state.pending = false;

    match result {
        Ok(Step::Yield(value)) => {
            trace!("async task step yielded");
            state.last = Some(value.clone());
            Ok(Some(value))
        }
        Ok(Step::Complete(value)) => {
            state.done = true;
            let value = value.or_else(|| state.last.take());
            let handle = state.handle.clone();
            // Listeners may read the task back.
            drop(state);

            match handle {
                Some(handle) => handle.invoke_done(value.clone()),
                None => warn!("async task completed with no bound handle"),
            }
            Ok(value)
        }
        Err(error) => {
            state.fault = Some(Fault::Failed);
            Err(error)
        }
    }
}

impl<T> Drop for MoveNext<T> {
    fn drop(&mut self) {
        let MoveNextState::Step { core, .. } = &self.state else {
            return;
        };
        let Some(core) = core.upgrade() else {
            return;
        };

        let Ok(mut state) = core.try_borrow_mut() else {
            return;
        };
        if state.pending && !state.disposed {
            warn!("in-flight async step dropped before it resolved");
            state.pending = false;
            state.fault = Some(Fault::Abandoned);
        }
    }
}

impl<T> fmt::Debug for MoveNext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            MoveNextState::Ready(_) => "ready",
            MoveNextState::Step { .. } => "step",
            MoveNextState::Complete => "complete",
        };
        f.debug_struct("MoveNext").field("state", &state).finish()
    }
}
