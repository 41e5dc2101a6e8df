use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::collections::hash_set;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use tracing::trace;

/// Collections that consumers can block on until producers signal them.
pub trait AsyncCollection {
    /// Terminal signal: no more producers. Releases any pending waiter.
    fn done(&mut self);

    /// Teardown: forgets the pending waiter without releasing it.
    fn clear(&mut self);
}

/// A set that a consumer can await until a producer adds to it.
///
/// The set holds at most one pending waiter. It is edge-triggered: a call
/// to [`wait`](Self::wait) is released by the next [`add`](Self::add) or
/// [`done`](Self::done), never by elements added before the wait began.
/// Consumers are expected to re-check the contents after waking.
///
/// Calling `wait` again while a wait is pending returns a future tied to
/// the same waiter, so two concurrent consumers wake together on a single
/// `add`.
pub struct AsyncSet<T> {
    items: HashSet<T>,
    waiter: Option<Rc<Rendezvous>>,
}

impl<T> AsyncSet<T> {
    pub fn new() -> Self {
        Self {
            items: HashSet::new(),
            waiter: None,
        }
    }

    /// Returns a future that resolves on the next `add` or `done`.
    ///
    /// If a wait is already pending, the returned future shares its
    /// resolution.
    pub fn wait(&mut self) -> Wait {
        let rendezvous = self.waiter.get_or_insert_with(|| {
            trace!("async set waiter armed");
            Rc::new(Rendezvous::default())
        });

        Wait {
            rendezvous: rendezvous.clone(),
        }
    }

    /// Releases any pending waiter and empties the set.
    pub fn done(&mut self) {
        if let Some(waiter) = self.waiter.take() {
            waiter.resolve();
        }
        self.items.clear();
    }

    /// Forgets the pending waiter without releasing it.
    ///
    /// Elements are kept. A consumer still awaiting the dropped waiter
    /// never wakes, so this is only for teardown with no consumer left.
    pub fn clear(&mut self) {
        self.waiter = None;
    }

    pub fn has_waiter(&self) -> bool {
        self.waiter.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> hash_set::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: Eq + Hash> AsyncSet<T> {
    /// Inserts `item` and releases the pending waiter, if any.
    ///
    /// The waiter is released even when `item` was already present; it
    /// does not receive the element. Returns whether the item was new.
    pub fn add(&mut self, item: T) -> bool {
        let inserted = self.items.insert(item);

        if let Some(waiter) = self.waiter.take() {
            waiter.resolve();
        }

        inserted
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn remove(&mut self, item: &T) -> bool {
        self.items.remove(item)
    }
}

impl<T> AsyncCollection for AsyncSet<T> {
    fn done(&mut self) {
        AsyncSet::done(self);
    }

    fn clear(&mut self) {
        AsyncSet::clear(self);
    }
}

impl<T> Default for AsyncSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for AsyncSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSet")
            .field("items", &self.items)
            .field("waiting", &self.waiter.is_some())
            .finish()
    }
}

impl<'a, T> IntoIterator for &'a AsyncSet<T> {
    type Item = &'a T;
    type IntoIter = hash_set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Shared resolution point between an `AsyncSet` and its `Wait` futures.
#[derive(Default)]
struct Rendezvous {
    resolved: Cell<bool>,
    wakers: RefCell<Vec<Waker>>,
}

impl Rendezvous {
    fn resolve(&self) {
        self.resolved.set(true);

        let wakers = std::mem::take(&mut *self.wakers.borrow_mut());
        trace!(waiters = wakers.len(), "async set waiter released");
        for waker in wakers {
            waker.wake();
        }
    }
}

/// Future returned by [`AsyncSet::wait`].
pub struct Wait {
    rendezvous: Rc<Rendezvous>,
}

impl Wait {
    /// Whether the waiter has been released.
    pub fn is_resolved(&self) -> bool {
        self.rendezvous.resolved.get()
    }
}

impl Future for Wait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.rendezvous.resolved.get() {
            return Poll::Ready(());
        }

        let mut wakers = self.rendezvous.wakers.borrow_mut();
        if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
            wakers.push(cx.waker().clone());
        }

        Poll::Pending
    }
}

impl fmt::Debug for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
