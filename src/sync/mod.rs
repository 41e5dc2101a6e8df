//! Cross-task coordination primitives.
//!
//! These are the structures independently stepped tasks use to talk to
//! each other:
//! - [`CancellationToken`]: a one-way cancellation flag whose
//!   cancellation propagates from child to parent.
//! - [`AsyncSet`]: a set with an edge-triggered, single-waiter
//!   "something changed or finished" rendezvous.
//!
//! ## Design notes
//!
//! - `AsyncSet` and its [`Wait`] futures are single-threaded (`!Send`),
//!   matching the cooperative tick model of the runtime.
//! - `CancellationToken` is `Send + Sync` so a token can be handed to
//!   code outside the tick loop (for example a loader thread) that needs
//!   to request cancellation.

mod async_set;
mod cancel;

pub use async_set::{AsyncCollection, AsyncSet, Wait};
pub use cancel::CancellationToken;
