//! The three-channel consumer contract and its termination guard.
//!
//! A [`Subscriber`] is the single concrete observer type of the runtime:
//! a dispatch table of three callbacks plus an owned [`Subscription`].
//! Operator stages are built by wrapping a downstream subscriber's
//! callbacks, not by subclassing, so the termination guard lives in one
//! place and every stage inherits it for free.
//!
//! # Invariants
//!
//! - After the first `error` or `complete`, the subscriber is stopped:
//!   further notifications are discarded and the owned subscription is
//!   closed, cascading to any secondary subscriptions attached to it.
//!   A [`Subscriber::wrap_deferred`] stage stops but leaves the shared
//!   handle open until it delivers its own downstream terminal
//! - A subscriber whose subscription was unsubscribed externally stops
//!   delivering values even if the producer keeps pushing

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::StreamError;
use crate::subscription::Subscription;

/// A consumer of a stream's three notification channels.
///
/// Implement this to subscribe with a stateful value instead of three
/// separate closures.
pub trait Observer {
    /// The value type pushed on the next channel.
    type Item;

    /// Called once per emitted value.
    fn next(&mut self, value: Self::Item);

    /// Called at most once, terminally, on failure.
    fn error(&mut self, err: StreamError) {
        tracing::error!(error = %err, "unhandled stream error");
    }

    /// Called at most once, terminally, on successful completion.
    fn complete(&mut self) {}
}

/// Boxed value callback.
pub type NextFn<T> = Box<dyn Fn(T)>;
/// Boxed error callback.
pub type ErrorFn = Box<dyn Fn(StreamError)>;
/// Boxed completion callback.
pub type CompleteFn = Box<dyn Fn()>;

struct Core<T> {
    stopped: Cell<bool>,
    /// False for stages that keep inner work running past the upstream
    /// terminal; they close the shared handle themselves, by delivering
    /// their own downstream terminal.
    closes_on_terminal: bool,
    on_next: Option<NextFn<T>>,
    on_error: Option<ErrorFn>,
    on_complete: Option<CompleteFn>,
    subscription: Subscription,
}

/// The concrete observer the runtime pushes into.
///
/// Cloning shares the guard state and the owned subscription; callbacks
/// are installed once at construction. Callbacks are `Fn`, which keeps
/// re-entrant delivery sound: an operator whose reaction to a value
/// synchronously produces another value (recursive expansion, inner
/// streams completing inline) re-enters `next` on a live shared
/// reference instead of fighting over a unique borrow.
pub struct Subscriber<T> {
    core: Rc<Core<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: 'static> Subscriber<T> {
    /// Creates a subscriber owning a fresh subscription.
    #[must_use]
    pub fn new(
        on_next: Option<NextFn<T>>,
        on_error: Option<ErrorFn>,
        on_complete: Option<CompleteFn>,
    ) -> Self {
        Self::wrap(Subscription::new(), on_next, on_error, on_complete)
    }

    /// Creates a subscriber bound to an existing subscription handle.
    ///
    /// Operator stages use this to share the downstream chain's handle,
    /// so one outer unsubscribe stops every stage at once.
    #[must_use]
    pub fn wrap(
        subscription: Subscription,
        on_next: Option<NextFn<T>>,
        on_error: Option<ErrorFn>,
        on_complete: Option<CompleteFn>,
    ) -> Self {
        Self::build(subscription, true, on_next, on_error, on_complete)
    }

    /// Creates a stage subscriber that reports a terminal without
    /// closing the shared handle.
    ///
    /// Operators whose inner streams may outlive the upstream terminal
    /// (queued or in-flight inner work) use this: the terminal callback
    /// still fires exactly once and further upstream notifications are
    /// discarded, but the shared subscription stays open until the
    /// stage delivers its own downstream terminal.
    #[must_use]
    pub fn wrap_deferred(
        subscription: Subscription,
        on_next: Option<NextFn<T>>,
        on_error: Option<ErrorFn>,
        on_complete: Option<CompleteFn>,
    ) -> Self {
        Self::build(subscription, false, on_next, on_error, on_complete)
    }

    fn build(
        subscription: Subscription,
        closes_on_terminal: bool,
        on_next: Option<NextFn<T>>,
        on_error: Option<ErrorFn>,
        on_complete: Option<CompleteFn>,
    ) -> Self {
        Self {
            core: Rc::new(Core {
                stopped: Cell::new(false),
                closes_on_terminal,
                on_next,
                on_error,
                on_complete,
                subscription,
            }),
        }
    }

    /// Wraps an [`Observer`] value into a subscriber.
    #[must_use]
    pub fn from_observer<O>(observer: O) -> Self
    where
        O: Observer<Item = T> + 'static,
    {
        let observer = Rc::new(RefCell::new(observer));
        let for_next = observer.clone();
        let for_error = observer.clone();
        let for_complete = observer;
        Self::new(
            Some(Box::new(move |value| for_next.borrow_mut().next(value))),
            Some(Box::new(move |err| for_error.borrow_mut().error(err))),
            Some(Box::new(move || for_complete.borrow_mut().complete())),
        )
    }

    /// The subscription this subscriber owns.
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.core.subscription
    }

    /// Returns true once a terminal notification was delivered or the
    /// owned subscription was closed.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.core.stopped.get() || self.core.subscription.is_closed()
    }

    /// Delivers a value, unless this subscriber is stopped.
    pub fn next(&self, value: T) {
        if self.is_stopped() {
            return;
        }
        if let Some(on_next) = &self.core.on_next {
            on_next(value);
        }
    }

    /// Delivers the terminal error notification.
    ///
    /// The first terminal notification wins; this one is discarded if a
    /// terminal was already delivered. An error with no installed
    /// handler surfaces as an unhandled-error log rather than being
    /// silently dropped.
    pub fn error(&self, err: StreamError) {
        if self.is_stopped() {
            return;
        }
        self.core.stopped.set(true);
        match &self.core.on_error {
            Some(on_error) => on_error(err),
            None => tracing::error!(error = %err, "unhandled stream error"),
        }
        if self.core.closes_on_terminal {
            self.core.subscription.unsubscribe();
        }
    }

    /// Delivers the terminal completion notification.
    pub fn complete(&self) {
        if self.is_stopped() {
            return;
        }
        self.core.stopped.set(true);
        if let Some(on_complete) = &self.core.on_complete {
            on_complete();
        }
        if self.core.closes_on_terminal {
            self.core.subscription.unsubscribe();
        }
    }

    /// Stops delivery and closes the owned subscription without a
    /// terminal notification.
    pub fn unsubscribe(&self) {
        self.core.stopped.set(true);
        self.core.subscription.unsubscribe();
    }
}

impl<T> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("stopped", &self.core.stopped.get())
            .field("subscription", &self.core.subscription)
            .finish()
    }
}
