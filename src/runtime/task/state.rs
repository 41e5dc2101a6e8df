/// Observable lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// No step has run; the sequence has not been created.
    Uninitialized,

    /// The sequence exists and no step is outstanding.
    Running,

    /// An async step has started and not yet resolved.
    ///
    /// Further `move_next` calls return a placeholder until it does.
    StepPending,

    /// The sequence finished, produced nothing, or cancellation was
    /// observed.
    Done,

    /// A step failed or was abandoned; the sequence has been dropped.
    Faulted,

    /// The task was disposed and no longer represents any work.
    Disposed,
}

/// Where a task's lazily created sequence is in its life.
pub(crate) enum SeqState<S> {
    /// `task()` has not been called yet.
    Unstarted,
    /// The sequence is alive and can be resumed.
    Running(S),
    /// The sequence completed or was never produced. Never re-created.
    Exhausted,
    /// A step failed; the sequence was dropped.
    Faulted,
}

impl<S> SeqState<S> {
    pub(crate) fn is_unstarted(&self) -> bool {
        matches!(self, SeqState::Unstarted)
    }
}
