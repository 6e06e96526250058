//! Rivulet: a push-based reactive stream runtime with pluggable,
//! deterministic scheduling.
//!
//! # Overview
//!
//! Rivulet models asynchronous sequences as [`Observable`] values: lazy,
//! reusable producer descriptions that deliver zero or more values to a
//! subscriber, then at most one terminal notification. Disposal is a
//! first-class protocol: every subscription owns a tree of teardown
//! logic and child subscriptions, and unsubscribing the root stops the
//! whole chain at once.
//!
//! # Core Guarantees
//!
//! - **Termination guard**: After `error` or `complete`, a subscriber
//!   delivers nothing further, enforced centrally rather than per
//!   operator
//! - **Cascading disposal**: Unsubscribing a subscription disposes its
//!   teardowns and children; disposal is idempotent
//! - **Panic isolation**: Panics in producers and user closures become
//!   `error` notifications instead of unwinding through the chain;
//!   panics in scheduled work cancel the queue and then resurface
//! - **Deterministic testing**: The virtual scheduler advances a frame
//!   clock instead of wall time, so timing-sensitive operators are
//!   testable tick by tick
//!
//! # Module Structure
//!
//! - [`observable`]: The stream type, `lift`, and creation factories
//! - [`observer`]: The observer trait and the guarded subscriber
//! - [`subscription`]: Resource handles and teardown trees
//! - [`scheduler`]: Immediate, runtime, and virtual-time schedulers
//! - [`ops`]: The operator catalogue
//! - [`error`]: The stream error taxonomy

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod scheduler;
pub mod subscription;
#[doc(hidden)]
pub mod test_utils;

pub use error::{StreamError, TeardownError};
pub use observable::{defer, empty, from_iter, interval, never, of, throw, timer, Observable};
pub use observable::InnerSource;
pub use observer::{Observer, Subscriber};
pub use ops::fork_join;
pub use scheduler::{
    Action, ImmediateScheduler, RuntimeScheduler, Scheduler, VirtualScheduler,
};
pub use subscription::{Subscription, Teardown};
