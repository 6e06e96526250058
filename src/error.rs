//! Error types and error handling strategy for Rivulet.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Errors are terminal: at most one `error` notification reaches a
//!   subscriber, after which no further notifications are delivered and
//!   all owned resources are disposed
//! - User-code panics (projections, accumulators, comparators, producers)
//!   are isolated at the point of invocation and converted into an
//!   `error` notification instead of unwinding through the runtime
//! - Teardown failures never mask one another: every teardown runs, and
//!   the failures are aggregated into a single [`TeardownError`]
//!
//! # Error Categories
//!
//! - **Timeout**: raised by the `timeout` operator when no fallback is
//!   configured
//! - **Index**: raised by position-based operators when a requested index
//!   has no corresponding emission and no default was supplied
//! - **Teardown**: aggregated failures from resource disposal
//! - **User**: payload-carrying errors raised by producers or by panicking
//!   user closures

use std::any::Any;
use std::rc::Rc;

use thiserror::Error;

/// The error delivered on a subscriber's error channel.
///
/// `StreamError` is cheap to clone so that operators which fan a single
/// failure out to several consumers (windows, joined sources) can do so
/// without re-boxing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Upstream stayed silent past the configured due time and no
    /// fallback stream was supplied.
    #[error("stream timed out")]
    Timeout,

    /// A position-based operator was asked for an index the stream never
    /// reached, and no default value was supplied.
    #[error("index {index} out of range")]
    IndexOutOfRange {
        /// The requested emission index.
        index: usize,
    },

    /// One or more teardowns failed while a subscription was closing.
    #[error(transparent)]
    Teardown(#[from] TeardownError),

    /// An error raised by user code: a failing producer, a `throw`
    /// factory, or a panicking projection/accumulator/comparator.
    #[error("{0}")]
    User(Rc<str>),
}

impl StreamError {
    /// Creates a user error from any displayable payload.
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(Rc::from(message.into()))
    }

    /// Creates a user error from a captured panic payload.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::User(Rc::from(panic_message(&*payload)))
    }

    /// Returns true if this error is the timeout error kind.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Aggregated failures captured while a subscription tree was closing.
///
/// A single failing teardown must not prevent the remaining teardowns
/// from running, so close drains the whole tree first and reports every
/// captured failure here at the end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} teardown(s) failed while unsubscribing: {}", .failures.len(), .failures.join("; "))]
pub struct TeardownError {
    failures: Vec<String>,
}

impl TeardownError {
    pub(crate) fn new(failures: Vec<String>) -> Self {
        debug_assert!(!failures.is_empty());
        Self { failures }
    }

    /// The individual failure messages, in teardown order.
    #[must_use]
    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}

/// Extracts a human-readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
