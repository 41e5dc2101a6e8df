//! # framestep
//!
//! **framestep** is a frame-driven cooperative task runtime. It is the
//! scheduling core behind scripted sequencing in a game loop: work that
//! spans many frames is written as a lazy sequence and advanced one step
//! per tick.
//!
//! Everything runs on one thread. "Concurrency" here means interleaving
//! independently stepped tasks across ticks, never parallel execution.
//!
//! The crate offers:
//!
//! - **[`SyncTask`]**: advances a synchronous sequence one element per
//!   step and never suspends
//! - **[`AsyncTask`]**: advances a sequence whose steps may be pending,
//!   with at most one step in flight
//! - **[`CancellationToken`]**: cooperative cancellation that propagates
//!   from child to parent only
//! - **[`AsyncSet`]**: a set with an edge-triggered single-waiter
//!   rendezvous for producer/consumer hand-off
//! - **[`TaskRuntime`]**: a pooled tick driver that steps every task once
//!   per [`update`](TaskRuntime::update)
//!
//! ## Quick Start
//!
//! ```rust
//! use framestep::RuntimeBuilder;
//! use framestep::task::{Producer, from_iter};
//!
//! let mut runtime = RuntimeBuilder::new().build();
//!
//! let handle = runtime.spawn_sync::<u32, _>(|| Producer::Sequence(from_iter([1, 2, 3])), None);
//!
//! while !handle.is_done() {
//!     runtime.update();
//! }
//! assert_eq!(handle.value(), Some(3));
//! ```
//!
//! ## Modules
//!
//! - [`task`]: the step producer contract, task types and handles
//! - [`sync`]: cancellation tokens and the async rendezvous set

mod error;
mod runtime;
mod utils;

pub mod sync;

pub use error::{BoxError, Result, TaskError};
pub use runtime::builder::RuntimeBuilder;
pub use runtime::core::{RuntimeHandle, TaskRuntime, TickReport};
pub use runtime::task;
pub use runtime::task::{AsyncTask, SyncTask, TaskHandle};
pub use runtime::yield_now::{YieldTicks, yield_now, yield_ticks};
pub use sync::{AsyncSet, CancellationToken};
