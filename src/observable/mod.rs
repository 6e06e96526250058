//! The stream description type and its composition mechanism.
//!
//! An [`Observable`] is a reusable description of a producer function.
//! Nothing runs until [`Observable::subscribe`] is called; each subscribe
//! invokes the producer with a fresh [`Subscriber`] and returns that
//! subscriber's [`Subscription`]. Two subscribes run the producer twice —
//! there is no implicit sharing or multicast.
//!
//! Operators are built with [`Observable::lift`]: a derived stream whose
//! subscribe wraps the downstream subscriber in a stage-specific one and
//! then subscribes the original source with the wrapped subscriber.
//! Chains therefore execute top-to-bottom at subscribe time while data
//! flows bottom-to-top at emission time.

mod factory;
mod source;

pub use factory::{defer, empty, from_iter, interval, never, of, throw, timer};
pub use source::InnerSource;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::error::StreamError;
use crate::observer::{CompleteFn, ErrorFn, NextFn, Observer, Subscriber};
use crate::subscription::{Subscription, Teardown};

/// A reusable description of an asynchronous sequence of values.
///
/// Cloning an `Observable` clones the description, not a running
/// subscription; clones are freely re-subscribable.
pub struct Observable<T> {
    producer: Rc<dyn Fn(Subscriber<T>)>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
        }
    }
}

impl<T: 'static> Observable<T> {
    /// Wraps a producer function into a stream.
    ///
    /// The producer receives the fresh subscriber for each subscribe call
    /// and returns teardown logic, which is registered on the
    /// subscriber's subscription so that unsubscribing cancels whatever
    /// the producer started. A producer that panics while subscribing is
    /// delivered as an `error` notification instead of propagating to
    /// the `subscribe` caller.
    pub fn new(producer: impl Fn(Subscriber<T>) -> Teardown + 'static) -> Self {
        Self {
            producer: Rc::new(move |subscriber: Subscriber<T>| {
                match catch_unwind(AssertUnwindSafe(|| producer(subscriber.clone()))) {
                    Ok(teardown) => subscriber.subscription().attach(teardown),
                    Err(payload) => subscriber.error(StreamError::from_panic(payload)),
                }
            }),
        }
    }

    pub(crate) fn from_raw(producer: Rc<dyn Fn(Subscriber<T>)>) -> Self {
        Self { producer }
    }

    /// Derives a stream by wrapping the downstream subscriber.
    ///
    /// `operator` maps the downstream subscriber to the stage subscriber
    /// handed to this stream's producer. Purely descriptive: no side
    /// effects until the derived stream is subscribed.
    pub fn lift<Out: 'static>(
        &self,
        operator: impl Fn(Subscriber<Out>) -> Subscriber<T> + 'static,
    ) -> Observable<Out> {
        let source = self.producer.clone();
        Observable::from_raw(Rc::new(move |downstream: Subscriber<Out>| {
            let upstream = operator(downstream);
            source(upstream);
        }))
    }

    /// Subscribes with a value callback only.
    ///
    /// An error on a subscription made this way is logged as unhandled.
    pub fn subscribe(&self, on_next: impl Fn(T) + 'static) -> Subscription {
        self.subscribe_with(Subscriber::new(Some(Box::new(on_next)), None, None))
    }

    /// Subscribes with all three channel callbacks.
    pub fn subscribe_all(
        &self,
        on_next: impl Fn(T) + 'static,
        on_error: impl Fn(StreamError) + 'static,
        on_complete: impl Fn() + 'static,
    ) -> Subscription {
        self.subscribe_with(Subscriber::new(
            Some(Box::new(on_next)),
            Some(Box::new(on_error)),
            Some(Box::new(on_complete)),
        ))
    }

    /// Subscribes with an [`Observer`] value.
    pub fn subscribe_observer<O>(&self, observer: O) -> Subscription
    where
        O: Observer<Item = T> + 'static,
    {
        self.subscribe_with(Subscriber::from_observer(observer))
    }

    /// Subscribes with optional per-channel callbacks.
    pub fn subscribe_partial(
        &self,
        on_next: Option<NextFn<T>>,
        on_error: Option<ErrorFn>,
        on_complete: Option<CompleteFn>,
    ) -> Subscription {
        self.subscribe_with(Subscriber::new(on_next, on_error, on_complete))
    }

    /// Runs the producer against an already-built subscriber.
    pub(crate) fn subscribe_with(&self, subscriber: Subscriber<T>) -> Subscription {
        let handle = subscriber.subscription().clone();
        (self.producer)(subscriber);
        handle
    }
}

impl<T> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Observable")
    }
}
