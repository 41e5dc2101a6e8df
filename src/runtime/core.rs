use super::task::{
    AsyncDriver, AsyncRoutine, AsyncTask, HandleId, Runnable, SyncRoutine, SyncTask, TaskHandle,
};
use super::wait::{WaitFrames, WaitUntil};
use crate::error::TaskError;
use crate::sync::CancellationToken;
use crate::utils::Slab;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::task::Context;

use futures_util::task::noop_waker_ref;
use tracing::{debug, error, trace};

/// The opaque runtime reference every task is constructed with.
///
/// Cheap to clone. Exposes the frame counter, which advances once per
/// [`TaskRuntime::update`].
#[derive(Clone)]
pub struct RuntimeHandle {
    shared: Rc<Shared>,
}

struct Shared {
    frame: Cell<u64>,
}

impl RuntimeHandle {
    fn new() -> Self {
        Self {
            shared: Rc::new(Shared {
                frame: Cell::new(0),
            }),
        }
    }

    /// Number of completed [`TaskRuntime::update`] calls.
    pub fn frame(&self) -> u64 {
        self.shared.frame.get()
    }

    fn advance(&self) -> u64 {
        let frame = self.shared.frame.get() + 1;
        self.shared.frame.set(frame);
        frame
    }

    /// Whether two handles refer to the same runtime.
    pub fn same_runtime(&self, other: &RuntimeHandle) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("frame", &self.frame())
            .finish()
    }
}

/// Outcome of one [`TaskRuntime::update`].
#[derive(Debug, Default)]
pub struct TickReport {
    /// The frame this tick ran as.
    pub frame: u64,
    /// Tasks that finished during this tick.
    pub completed: Vec<HandleId>,
    /// Tasks whose step failed during this tick. They have been freed.
    pub faulted: Vec<(HandleId, TaskError)>,
}

/// The tick-driven task runtime.
///
/// `TaskRuntime` is responsible for:
/// - pooling task slots and handing out [`TaskHandle`]s for them,
/// - stepping every live task once per [`update`](Self::update),
/// - recycling handles of finished tasks.
///
/// It is single-threaded. Call `update` once per frame from the host loop.
pub struct TaskRuntime {
    handle: RuntimeHandle,
    slots: Slab<Box<dyn Runnable>>,
    auto_free: bool,
}

impl TaskRuntime {
    /// Creates a runtime. Use [`RuntimeBuilder`](super::builder::RuntimeBuilder).
    pub(crate) fn new(capacity: usize, auto_free: bool) -> Self {
        Self {
            handle: RuntimeHandle::new(),
            slots: Slab::with_capacity(capacity),
            auto_free,
        }
    }

    /// The reference tasks of this runtime are constructed with.
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn frame(&self) -> u64 {
        self.handle.frame()
    }

    /// Binds a pooled handle to `task` and schedules it.
    pub fn run_sync<T, R>(&mut self, mut task: SyncTask<T, R>) -> TaskHandle<T>
    where
        T: 'static,
        R: SyncRoutine<T> + 'static,
        R::Seq: 'static,
    {
        let auto_free = self.auto_free;
        let (_, handle) = self.slots.insert_with(|key| {
            let handle = TaskHandle::pooled(HandleId::from(key), auto_free);
            task.set_handle(handle.clone());
            (Box::new(task) as Box<dyn Runnable>, handle)
        });

        debug!(id = ?handle.id(), kind = "sync", "task scheduled");
        handle
    }

    /// Binds a pooled handle to `task` and schedules it.
    pub fn run_async<T, R>(&mut self, mut task: AsyncTask<T, R>) -> TaskHandle<T>
    where
        T: Clone + 'static,
        R: AsyncRoutine<T> + 'static,
        R::Seq: 'static,
    {
        let auto_free = self.auto_free;
        let (_, handle) = self.slots.insert_with(|key| {
            let handle = TaskHandle::pooled(HandleId::from(key), auto_free);
            task.set_handle(handle.clone());
            (Box::new(AsyncDriver::new(task)) as Box<dyn Runnable>, handle)
        });

        debug!(id = ?handle.id(), kind = "async", "task scheduled");
        handle
    }

    /// Builds a [`SyncTask`] on this runtime and schedules it.
    pub fn spawn_sync<T, R>(&mut self, routine: R, token: Option<CancellationToken>) -> TaskHandle<T>
    where
        T: 'static,
        R: SyncRoutine<T> + 'static,
        R::Seq: 'static,
    {
        let task = SyncTask::new(self.handle(), token, routine);
        self.run_sync(task)
    }

    /// Builds an [`AsyncTask`] on this runtime and schedules it.
    pub fn spawn_async<T, R>(
        &mut self,
        routine: R,
        token: Option<CancellationToken>,
    ) -> TaskHandle<T>
    where
        T: Clone + 'static,
        R: AsyncRoutine<T> + 'static,
        R::Seq: 'static,
    {
        let task = AsyncTask::new(self.handle(), token, routine);
        self.run_async(task)
    }

    /// Completes on the next [`update`](Self::update).
    pub fn wait_next_frame(&mut self, token: Option<CancellationToken>) -> TaskHandle<u64> {
        self.wait_delay_frame(0, token)
    }

    /// Completes `frames` updates from now; `0` behaves like
    /// [`wait_next_frame`](Self::wait_next_frame).
    ///
    /// The handle's value is the frame the wait completed on.
    pub fn wait_delay_frame(
        &mut self,
        frames: u64,
        token: Option<CancellationToken>,
    ) -> TaskHandle<u64> {
        let routine = WaitFrames::new(self.handle(), frames.max(1));
        self.spawn_sync(routine, token)
    }

    /// Completes on the first update where `condition` returns `true`.
    pub fn wait_until<F>(&mut self, condition: F, token: Option<CancellationToken>) -> TaskHandle<u64>
    where
        F: FnMut() -> bool + 'static,
    {
        let routine = WaitUntil::new(self.handle(), condition);
        self.spawn_sync(routine, token)
    }

    /// Advances one frame, stepping every live task that is not done.
    ///
    /// Finished tasks with `auto_free` set are freed at the end of their
    /// tick. Tasks whose step fails are always freed, and the error is
    /// reported rather than returned, so one failing task does not stall
    /// the others.
    pub fn update(&mut self) -> TickReport {
        let frame = self.handle.advance();
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut report = TickReport {
            frame,
            ..TickReport::default()
        };

        for key in self.slots.keys() {
            let id = HandleId::from(key);
            let Some(task) = self.slots.get_mut(key) else {
                continue;
            };
            if task.is_done() {
                continue;
            }

            if let Err(error) = task.run(&mut cx) {
                error!(%id, frame, %error, "task step failed");
                report.faulted.push((id, error));
                self.free_task(id);
                continue;
            }

            if task.is_done() {
                trace!(%id, frame, "task completed");
                report.completed.push(id);
                if task.auto_free() {
                    self.free_task(id);
                }
            }
        }

        report
    }

    /// Disposes the task behind `id` and releases its handle.
    ///
    /// Returns `false` if `id` is stale or unknown.
    pub fn free_task(&mut self, id: HandleId) -> bool {
        match self.slots.remove(id.key()) {
            Some(mut task) => {
                task.free();
                debug!(%id, "task freed");
                true
            }
            None => {
                debug!(%id, "free requested for unknown or stale handle");
                false
            }
        }
    }

    pub fn contains(&self, id: HandleId) -> bool {
        self.slots.contains(id.key())
    }

    /// Number of tasks currently holding a slot.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() == 0
    }
}

impl fmt::Debug for TaskRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRuntime")
            .field("frame", &self.frame())
            .field("tasks", &self.len())
            .field("auto_free", &self.auto_free)
            .finish()
    }
}

impl Drop for TaskRuntime {
    /// Frees every remaining task so pending awaiters resolve.
    fn drop(&mut self) {
        for mut task in self.slots.drain() {
            task.free();
        }
    }
}
