//! Built-in sync routines for frame-based waiting.
//!
//! Each routine yields the current frame number while it waits and
//! completes with the frame it finished on.

use super::core::RuntimeHandle;
use super::task::{Producer, Sequence, Step, SyncRoutine};
use crate::error::Result;

/// Waits until the runtime reaches a target frame.
pub(crate) struct WaitFrames {
    runtime: RuntimeHandle,
    target: u64,
}

impl WaitFrames {
    /// Targets `frames` updates after the current frame.
    pub(crate) fn new(runtime: RuntimeHandle, frames: u64) -> Self {
        let target = runtime.frame().saturating_add(frames);
        Self { runtime, target }
    }
}

impl SyncRoutine<u64> for WaitFrames {
    type Seq = FrameCountdown;

    fn task(&mut self) -> Producer<FrameCountdown> {
        Producer::Sequence(FrameCountdown {
            runtime: self.runtime.clone(),
            target: self.target,
        })
    }
}

pub(crate) struct FrameCountdown {
    runtime: RuntimeHandle,
    target: u64,
}

impl Sequence<u64> for FrameCountdown {
    fn resume(&mut self) -> Result<Step<u64>> {
        let frame = self.runtime.frame();
        if frame >= self.target {
            Ok(Step::Complete(Some(frame)))
        } else {
            Ok(Step::Yield(frame))
        }
    }
}

/// Waits until a condition holds, checked once per step.
pub(crate) struct WaitUntil<F> {
    runtime: RuntimeHandle,
    condition: Option<F>,
}

impl<F: FnMut() -> bool> WaitUntil<F> {
    pub(crate) fn new(runtime: RuntimeHandle, condition: F) -> Self {
        Self {
            runtime,
            condition: Some(condition),
        }
    }
}

impl<F: FnMut() -> bool> SyncRoutine<u64> for WaitUntil<F> {
    type Seq = Until<F>;

    fn task(&mut self) -> Producer<Until<F>> {
        match self.condition.take() {
            Some(condition) => Producer::Sequence(Until {
                runtime: self.runtime.clone(),
                condition,
            }),
            None => Producer::Empty,
        }
    }
}

pub(crate) struct Until<F> {
    runtime: RuntimeHandle,
    condition: F,
}

impl<F: FnMut() -> bool> Sequence<u64> for Until<F> {
    fn resume(&mut self) -> Result<Step<u64>> {
        let frame = self.runtime.frame();
        if (self.condition)() {
            Ok(Step::Complete(Some(frame)))
        } else {
            Ok(Step::Yield(frame))
        }
    }
}
