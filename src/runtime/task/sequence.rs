//! The lazy step producer contract.
//!
//! A task author supplies a *routine*: an object whose `task()` operation
//! creates, at most once per task, a lazy sequence of values. The runtime
//! then pulls the sequence one [`Step`] at a time. A sequence keeps its own
//! progress between pulls and is never restarted from the top.

use std::future::Future;

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;

use crate::error::Result;

/// Outcome of pulling one element from a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// An intermediate value; the sequence has more to give.
    Yield(T),
    /// The sequence is finished.
    ///
    /// The payload is the final value. With `None`, the task completes
    /// with the last yielded value instead.
    Complete(Option<T>),
}

/// Result of a routine's `task()` operation.
///
/// `Empty` is a deliberate "nothing to run": the task completes
/// immediately, and the routine is never asked again.
#[derive(Debug)]
pub enum Producer<S> {
    Empty,
    Sequence(S),
}

impl<S> Producer<S> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Producer::Empty)
    }
}

impl<S> From<Option<S>> for Producer<S> {
    fn from(sequence: Option<S>) -> Self {
        match sequence {
            Some(sequence) => Producer::Sequence(sequence),
            None => Producer::Empty,
        }
    }
}

/// A synchronous lazy sequence.
pub trait Sequence<T> {
    /// Produces the next step.
    ///
    /// Errors propagate unchanged to the caller of the owning task's
    /// `move_next`; the sequence is not resumed afterwards.
    fn resume(&mut self) -> Result<Step<T>>;
}

impl<T, S: Sequence<T> + ?Sized> Sequence<T> for Box<S> {
    fn resume(&mut self) -> Result<Step<T>> {
        (**self).resume()
    }
}

/// Boxed future resolving to the next step of an [`AsyncSequence`].
pub type StepFuture<T> = LocalBoxFuture<'static, Result<Step<T>>>;

/// A lazy sequence whose steps may each be pending.
///
/// `resume` is called only after the previous step's future resolved, so
/// implementations never see two outstanding steps.
pub trait AsyncSequence<T> {
    fn resume(&mut self) -> StepFuture<T>;
}

impl<T, S: AsyncSequence<T> + ?Sized> AsyncSequence<T> for Box<S> {
    fn resume(&mut self) -> StepFuture<T> {
        (**self).resume()
    }
}

/// Sequence adapter over an iterator. See [`from_iter`].
#[derive(Debug, Clone)]
pub struct Iter<I> {
    iter: I,
}

/// Turns an iterator into a sequence that yields each item, then
/// completes with the last one.
///
/// ```rust
/// use framestep::task::{Sequence, Step, from_iter};
///
/// let mut seq = from_iter([1, 2]);
/// assert_eq!(seq.resume().unwrap(), Step::Yield(1));
/// assert_eq!(seq.resume().unwrap(), Step::Yield(2));
/// assert_eq!(seq.resume().unwrap(), Step::Complete(None));
/// ```
pub fn from_iter<I: IntoIterator>(iter: I) -> Iter<I::IntoIter> {
    Iter {
        iter: iter.into_iter(),
    }
}

impl<I: Iterator> Sequence<I::Item> for Iter<I> {
    fn resume(&mut self) -> Result<Step<I::Item>> {
        Ok(match self.iter.next() {
            Some(item) => Step::Yield(item),
            None => Step::Complete(None),
        })
    }
}

/// Sequence adapter over a closure. See [`from_fn`].
#[derive(Debug, Clone)]
pub struct FromFn<F> {
    f: F,
}

/// Builds a sequence from a closure called once per step.
///
/// The closure holds the sequence state in its captures.
pub fn from_fn<F>(f: F) -> FromFn<F> {
    FromFn { f }
}

impl<T, F> Sequence<T> for FromFn<F>
where
    F: FnMut() -> Result<Step<T>>,
{
    fn resume(&mut self) -> Result<Step<T>> {
        (self.f)()
    }
}

/// Async sequence adapter over a closure. See [`step_fn`].
#[derive(Debug, Clone)]
pub struct StepFn<F> {
    f: F,
}

/// Builds an async sequence from a closure returning one step future per
/// call.
///
/// Anything the step future needs across its await points must be moved
/// or shared into it, since it outlives the call that created it.
pub fn step_fn<F>(f: F) -> StepFn<F> {
    StepFn { f }
}

impl<T, F, Fut> AsyncSequence<T> for StepFn<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Step<T>>> + 'static,
{
    fn resume(&mut self) -> StepFuture<T> {
        (self.f)().boxed_local()
    }
}

/// The author-supplied part of a synchronous task.
///
/// Closures returning a [`Producer`] implement this trait.
pub trait SyncRoutine<T> {
    type Seq: Sequence<T>;

    /// Creates the sequence. Called at most once, on the task's first step.
    fn task(&mut self) -> Producer<Self::Seq>;
}

impl<T, S, F> SyncRoutine<T> for F
where
    F: FnMut() -> Producer<S>,
    S: Sequence<T>,
{
    type Seq = S;

    fn task(&mut self) -> Producer<S> {
        self()
    }
}

/// The author-supplied part of an asynchronous task.
///
/// Closures returning a [`Producer`] implement this trait, with a no-op
/// [`update`](Self::update).
pub trait AsyncRoutine<T> {
    type Seq: AsyncSequence<T>;

    /// Creates the sequence. Called at most once, on the task's first step.
    fn task(&mut self) -> Producer<Self::Seq>;

    /// Per-tick hook, called by `move_next` while a step is still in flight.
    fn update(&mut self) {}
}

impl<T, S, F> AsyncRoutine<T> for F
where
    F: FnMut() -> Producer<S>,
    S: AsyncSequence<T>,
{
    type Seq = S;

    fn task(&mut self) -> Producer<S> {
        self()
    }
}
