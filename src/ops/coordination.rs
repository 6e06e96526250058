//! The outer/inner coordination protocol.
//!
//! Used by every operator that subscribes to secondary streams while
//! remaining subscribed to a primary one (merging, windowing, joining).
//! Each inner subscription carries a correlation record — which outer
//! emission spawned it, and at what indices — so the handler can map
//! inner notifications back to outer state (per-window buffers, the
//! running accumulator, a pending debounce value).
//!
//! Failure semantics: an inner error is fail-fast — the handler is
//! expected to error the shared downstream immediately. An inner
//! completion is operator-specific.

use std::cell::Cell;

use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use crate::subscription::Subscription;

/// Receiver of correlated inner-stream notifications.
pub(crate) trait InnerHandler<O, I> {
    /// An inner value, correlated to the outer emission that spawned it.
    fn notify_next(
        &self,
        outer_value: &O,
        inner_value: I,
        outer_index: usize,
        inner_index: usize,
        inner: &Subscription,
    );

    /// The inner stream failed; fail-fast to the shared downstream.
    fn notify_error(&self, err: StreamError, inner: &Subscription);

    /// The inner stream completed.
    fn notify_complete(&self, inner: &Subscription);
}

/// Subscribes `source` on behalf of an outer subscription.
///
/// The caller supplies the `subscription` handle that will own the
/// inner link — created ahead of the subscribe so the handler can
/// recognize it even when the inner source emits synchronously — and is
/// responsible for adding it as a child of the outer subscription so
/// one outer unsubscribe tears down every live inner one.
pub(crate) fn subscribe_inner<O, I, H>(
    source: Observable<I>,
    outer_value: O,
    outer_index: usize,
    handler: H,
    subscription: Subscription,
) where
    O: 'static,
    I: 'static,
    H: InnerHandler<O, I> + Clone + 'static,
{
    let inner_index = Cell::new(0_usize);
    let next_handler = handler.clone();
    let next_sub = subscription.clone();
    let error_handler = handler.clone();
    let error_sub = subscription.clone();
    let complete_handler = handler;
    let complete_sub = subscription.clone();

    let subscriber = Subscriber::wrap(
        subscription,
        Some(Box::new(move |value: I| {
            let index = inner_index.get();
            inner_index.set(index + 1);
            next_handler.notify_next(&outer_value, value, outer_index, index, &next_sub);
        })),
        Some(Box::new(move |err| {
            error_handler.notify_error(err, &error_sub);
        })),
        Some(Box::new(move || {
            complete_handler.notify_complete(&complete_sub);
        })),
    );
    source.subscribe_with(subscriber);
}
