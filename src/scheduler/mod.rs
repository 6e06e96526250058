//! Pluggable time scheduling: Actions and the Scheduler family.
//!
//! A [`Scheduler`] executes [`Action`]s according to a time model:
//!
//! - [`RuntimeScheduler`]: real time, driven by host sleeps
//! - [`ImmediateScheduler`]: a FIFO trampoline that drains as soon as the
//!   current flush completes
//! - [`VirtualScheduler`]: an explicit integer clock for deterministic
//!   tests
//!
//! All variants share the same guarantees: Actions scheduled with equal
//! delay execute in the order they were scheduled, and a panicking
//! Action never corrupts the queue — the flush loop cancels it, drains
//! and cancels everything still queued, then resumes the panic to the
//! flush caller. Execution is single-threaded and cooperative per
//! scheduler instance; "concurrency" means interleaved time-ordered
//! work, not parallelism.

mod action;
mod immediate;
mod runtime;
mod virtual_time;

pub use action::{Action, ActionContext, WorkFn};
pub use immediate::ImmediateScheduler;
pub use runtime::RuntimeScheduler;
pub use virtual_time::{VirtualScheduler, DEFAULT_MAX_FRAMES};

use std::time::Duration;

/// An abstraction over *when* work runs.
pub trait Scheduler {
    /// Time elapsed since this scheduler's epoch.
    fn now(&self) -> Duration;

    /// Schedules `work` to run after `delay`, returning its [`Action`].
    ///
    /// `work` may call [`ActionContext::reschedule`] to run again; the
    /// Action is then recycled rather than duplicated. Disposing the
    /// Action's handle cancels any pending execution.
    fn schedule(&self, delay: Duration, work: WorkFn) -> Action;

    /// Runs queued work to completion under this scheduler's time model.
    ///
    /// For the virtual variant this is the explicit test driver; for the
    /// real-time variant it blocks until the queue is idle.
    fn flush(&self);
}
