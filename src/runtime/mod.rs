//! Core runtime components.
//!
//! This module contains the building blocks of the frame-driven runtime:
//! step-wise tasks, their handles, the tick driver that advances them,
//! and cooperative yielding.
//!
//! It is responsible for:
//! - advancing sync and async tasks one step per tick,
//! - pooling handle slots and recycling them on completion,
//! - providing frame-based waits on top of the stepping primitive.

pub(crate) mod builder;
pub(crate) mod core;
pub(crate) mod wait;
pub(crate) mod yield_now;

pub mod task;
