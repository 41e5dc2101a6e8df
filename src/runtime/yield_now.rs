use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that stays pending for a fixed number of polls.
///
/// Each pending poll wakes its own waker, so an executor re-polls it
/// promptly. Under a [`TaskRuntime`](crate::TaskRuntime) every tick polls
/// in-flight steps once, so a step awaiting `yield_ticks(n)` resolves `n`
/// ticks after it starts.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct YieldTicks {
    remaining: u32,
}

impl Future for YieldTicks {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.remaining == 0 {
            return Poll::Ready(());
        }

        self.remaining -= 1;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Yields back to the driver `ticks` times before resolving.
pub fn yield_ticks(ticks: u32) -> YieldTicks {
    YieldTicks { remaining: ticks }
}

/// Yields back to the driver exactly once.
///
/// # Examples
///
/// ```rust,ignore
/// let step = async {
///     // Let the rest of this tick's tasks run first.
///     yield_now().await;
///     Ok(Step::Complete(Some(1)))
/// };
/// ```
pub fn yield_now() -> YieldTicks {
    yield_ticks(1)
}
