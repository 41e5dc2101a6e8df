use crate::utils::Key;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use tracing::{debug, warn};

/// Identifier of a pooled handle slot.
///
/// Ids are generational: once a handle is freed, its id no longer
/// resolves, even after the slot is reused by another task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    index: usize,
    generation: u32,
}

impl HandleId {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn key(self) -> Key {
        Key {
            index: self.index,
            generation: self.generation,
        }
    }
}

impl From<Key> for HandleId {
    fn from(key: Key) -> Self {
        Self {
            index: key.index,
            generation: key.generation,
        }
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

type Listener<T> = Box<dyn FnOnce(&TaskHandle<T>)>;

struct HandleState<T> {
    id: Option<HandleId>,
    value: RefCell<Option<T>>,
    done: Cell<bool>,
    auto_free: Cell<bool>,
    in_the_pool: Cell<bool>,
    listeners: RefCell<Vec<Listener<T>>>,
    waiters: RefCell<Vec<Waker>>,
}

/// The completion side of a task.
///
/// A handle is bound to exactly one task. The task writes the final value
/// and fires the completion notification once, when it finishes. Callers
/// observe completion by checking [`is_done`](Self::is_done), registering
/// an [`on_done`](Self::on_done) listener, or awaiting the handle.
///
/// Handles are single-threaded and cheap to clone; clones share state.
///
/// Awaiting resolves with the completion value, or with `None` if the
/// handle goes back to the pool without completing (the task was
/// cancelled, produced nothing, or failed).
pub struct TaskHandle<T> {
    state: Rc<HandleState<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn pooled(id: HandleId, auto_free: bool) -> Self {
        Self::with_id(Some(id), auto_free)
    }

    /// Creates a handle that belongs to no pool.
    ///
    /// Useful when stepping a task by hand instead of through a
    /// [`TaskRuntime`](crate::TaskRuntime).
    pub fn detached() -> Self {
        Self::with_id(None, false)
    }

    fn with_id(id: Option<HandleId>, auto_free: bool) -> Self {
        Self {
            state: Rc::new(HandleState {
                id,
                value: RefCell::new(None),
                done: Cell::new(false),
                auto_free: Cell::new(auto_free),
                in_the_pool: Cell::new(false),
                listeners: RefCell::new(Vec::new()),
                waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The pool slot id; `None` for detached handles.
    pub fn id(&self) -> Option<HandleId> {
        self.state.id
    }

    pub fn is_done(&self) -> bool {
        self.state.done.get()
    }

    /// Whether the runtime frees this handle as soon as its task completes.
    pub fn auto_free(&self) -> bool {
        self.state.auto_free.get()
    }

    pub fn set_auto_free(&self, auto_free: bool) {
        self.state.auto_free.set(auto_free);
    }

    /// Whether the handle has been released back to its pool.
    pub fn in_the_pool(&self) -> bool {
        self.state.in_the_pool.get()
    }

    /// A handle is valid until it is released back to its pool.
    pub fn is_valid(&self) -> bool {
        !self.in_the_pool()
    }

    pub fn set_value(&self, value: Option<T>) {
        *self.state.value.borrow_mut() = value;
    }

    pub fn take_value(&self) -> Option<T> {
        self.state.value.borrow_mut().take()
    }

    /// Stores the completion value and fires the completion notification.
    ///
    /// Only the first call has an effect; the value of later calls is
    /// dropped.
    pub fn invoke_done(&self, value: Option<T>) {
        if self.state.done.replace(true) {
            warn!(handle = ?self.state.id, "completion already delivered, ignoring");
            return;
        }

        self.set_value(value);
        debug!(handle = ?self.state.id, "task handle completed");

        let listeners = mem::take(&mut *self.state.listeners.borrow_mut());
        for listener in listeners {
            listener(self);
        }

        self.wake_waiters();
    }

    /// Registers a one-shot completion listener.
    ///
    /// Registered after completion, the listener runs immediately. A
    /// handle released without completing drops its listeners unrun.
    pub fn on_done(&self, listener: impl FnOnce(&TaskHandle<T>) + 'static) {
        if self.is_done() {
            listener(self);
            return;
        }

        if self.in_the_pool() {
            return;
        }

        self.state.listeners.borrow_mut().push(Box::new(listener));
    }

    /// Marks the handle as returned to its pool and wakes any awaiter.
    pub(crate) fn release(&self) {
        if self.state.in_the_pool.replace(true) {
            return;
        }

        self.state.listeners.borrow_mut().clear();
        self.wake_waiters();
    }

    fn wake_waiters(&self) {
        let waiters = mem::take(&mut *self.state.waiters.borrow_mut());
        for waker in waiters {
            waker.wake();
        }
    }
}

impl<T: Clone> TaskHandle<T> {
    pub fn value(&self) -> Option<T> {
        self.state.value.borrow().clone()
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone> Future for TaskHandle<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if self.is_done() {
            return Poll::Ready(self.value());
        }

        if self.in_the_pool() {
            return Poll::Ready(None);
        }

        let mut waiters = self.state.waiters.borrow_mut();
        if !waiters.iter().any(|w| w.will_wake(cx.waker())) {
            waiters.push(cx.waker().clone());
        }

        Poll::Pending
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.state.id)
            .field("done", &self.is_done())
            .field("in_the_pool", &self.in_the_pool())
            .finish()
    }
}
