//! Test utilities for Rivulet.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - A notification recorder for asserting on stream output
//! - Virtual-clock source constructors
//!
//! # Example
//! ```
//! use rivulet::test_utils::{init_test_logging, Recorder};
//! use rivulet::observable::of;
//!
//! init_test_logging();
//! let recorder = Recorder::new();
//! recorder.subscribe_to(&of(1));
//! assert_eq!(recorder.values(), vec![1]);
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use crate::scheduler::Scheduler;
use crate::subscription::{Subscription, Teardown};

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom default level.
///
/// `RUST_LOG` overrides the default when set. The first call wins;
/// later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// One observed notification, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<T> {
    /// A delivered value.
    Next(T),
    /// The failure terminal.
    Error(StreamError),
    /// The success terminal.
    Complete,
}

/// Records every notification a stream delivers.
///
/// Cheap to clone; clones share the same log.
pub struct Recorder<T> {
    log: Rc<RefCell<Vec<Notification<T>>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
        }
    }
}

impl<T: 'static> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Recorder<T> {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A subscriber that writes into this recorder's log.
    #[must_use]
    pub fn subscriber(&self) -> Subscriber<T> {
        let next_log = self.log.clone();
        let error_log = self.log.clone();
        let complete_log = self.log.clone();
        Subscriber::new(
            Some(Box::new(move |value| {
                next_log.borrow_mut().push(Notification::Next(value));
            })),
            Some(Box::new(move |err| {
                error_log.borrow_mut().push(Notification::Error(err));
            })),
            Some(Box::new(move || {
                complete_log.borrow_mut().push(Notification::Complete);
            })),
        )
    }

    /// Subscribes to `source`, returning the subscription handle.
    pub fn subscribe_to(&self, source: &Observable<T>) -> Subscription {
        source.subscribe_with(self.subscriber())
    }

    /// Every notification seen so far.
    #[must_use]
    pub fn events(&self) -> Vec<Notification<T>>
    where
        T: Clone,
    {
        self.log.borrow().clone()
    }

    /// The values delivered so far, in order.
    #[must_use]
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.log
            .borrow()
            .iter()
            .filter_map(|n| match n {
                Notification::Next(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether a completion notification arrived.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.log
            .borrow()
            .iter()
            .any(|n| matches!(n, Notification::Complete))
    }

    /// The error notification, if one arrived.
    #[must_use]
    pub fn error(&self) -> Option<StreamError> {
        self.log.borrow().iter().find_map(|n| match n {
            Notification::Error(err) => Some(err.clone()),
            _ => None,
        })
    }
}

/// A cold stream that emits each `(at_ms, value)` pair at the given
/// virtual/real offset from subscription, optionally completing at
/// `complete_at_ms`.
///
/// Every scheduled action is tied to the subscriber's handle, so
/// unsubscribing cancels all pending emissions.
pub fn scheduled_values<T: Clone + 'static>(
    scheduler: Rc<dyn Scheduler>,
    pairs: Vec<(u64, T)>,
    complete_at_ms: Option<u64>,
) -> Observable<T> {
    Observable::new(move |subscriber: Subscriber<T>| {
        for (at_ms, value) in pairs.clone() {
            let target = subscriber.clone();
            let action = scheduler.schedule(
                Duration::from_millis(at_ms),
                Box::new(move |_ctx| target.next(value.clone())),
            );
            subscriber.subscription().add(action.handle().clone());
        }
        if let Some(at_ms) = complete_at_ms {
            let target = subscriber.clone();
            let action = scheduler.schedule(
                Duration::from_millis(at_ms),
                Box::new(move |_ctx| target.complete()),
            );
            subscriber.subscription().add(action.handle().clone());
        }
        Teardown::None
    })
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
