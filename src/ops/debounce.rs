//! Emit the last value of a burst once its quiet period fires.

use std::cell::RefCell;
use std::rc::Rc;

use super::coordination::{subscribe_inner, InnerHandler};
use super::{stage_with_complete, try_or_error};
use crate::error::StreamError;
use crate::observable::{InnerSource, Observable};
use crate::observer::Subscriber;
use crate::subscription::Subscription;

struct DebounceState<T> {
    value: Option<T>,
    duration: Option<Subscription>,
    index: usize,
}

struct DebounceShared<T> {
    state: RefCell<DebounceState<T>>,
    downstream: Subscriber<T>,
}

impl<T: 'static> DebounceShared<T> {
    /// Emits the held value if `inner` is still the live duration
    /// subscription.
    fn flush(&self, inner: &Subscription) {
        let value = {
            let mut state = self.state.borrow_mut();
            let live = state
                .duration
                .as_ref()
                .is_some_and(|current| current.same_handle(inner));
            if !live {
                return;
            }
            state.duration = None;
            state.value.take()
        };
        self.downstream.subscription().remove(inner);
        inner.unsubscribe();
        if let Some(value) = value {
            self.downstream.next(value);
        }
    }

    /// Drops the duration slot without emitting.
    fn clear(&self, inner: &Subscription) {
        let mut state = self.state.borrow_mut();
        let live = state
            .duration
            .as_ref()
            .is_some_and(|current| current.same_handle(inner));
        if live {
            state.duration = None;
        }
        drop(state);
        self.downstream.subscription().remove(inner);
    }
}

impl<T: 'static, D: 'static> InnerHandler<T, D> for Rc<DebounceShared<T>> {
    fn notify_next(
        &self,
        _outer_value: &T,
        _inner_value: D,
        _outer_index: usize,
        _inner_index: usize,
        inner: &Subscription,
    ) {
        self.flush(inner);
    }

    fn notify_error(&self, err: StreamError, _inner: &Subscription) {
        self.downstream.error(err);
    }

    // Emission-only rule: a duration stream that completes silently does
    // not flush; the held value survives until the next value replaces
    // it or upstream completes.
    fn notify_complete(&self, inner: &Subscription) {
        self.clear(inner);
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Holds the most recent value and emits it only once the stream
    /// returned by `duration_selector` for that value emits.
    ///
    /// A newer value cancels the pending duration and replaces the held
    /// value. Upstream completion flushes the held value, then
    /// completes. A duration stream that *completes* without emitting
    /// does not flush — only an emission ends the quiet period.
    pub fn debounce<D, S>(
        &self,
        duration_selector: impl Fn(&T) -> S + 'static,
    ) -> Observable<T>
    where
        D: Clone + 'static,
        S: Into<InnerSource<D>>,
    {
        let duration_selector = Rc::new(duration_selector);
        self.lift(move |downstream: Subscriber<T>| {
            let shared = Rc::new(DebounceShared {
                state: RefCell::new(DebounceState {
                    value: None,
                    duration: None,
                    index: 0,
                }),
                downstream: downstream.clone(),
            });
            let selector = duration_selector.clone();

            let on_next = {
                let shared = shared.clone();
                move |value: T| {
                    let Some(duration) =
                        try_or_error(&shared.downstream, || selector(&value).into())
                    else {
                        return;
                    };
                    let duration = duration.into_observable();

                    // Replace any pending duration before subscribing the
                    // new one.
                    let (previous, outer_index) = {
                        let mut state = shared.state.borrow_mut();
                        let previous = state.duration.take();
                        state.value = Some(value.clone());
                        let index = state.index;
                        state.index += 1;
                        (previous, index)
                    };
                    if let Some(previous) = previous {
                        shared.downstream.subscription().remove(&previous);
                        previous.unsubscribe();
                    }

                    let inner = Subscription::new();
                    shared.state.borrow_mut().duration = Some(inner.clone());
                    shared.downstream.subscription().add(inner.clone());
                    subscribe_inner(duration, value, outer_index, shared.clone(), inner);
                }
            };

            let on_complete = {
                let shared = shared.clone();
                move || {
                    let (value, duration) = {
                        let mut state = shared.state.borrow_mut();
                        (state.value.take(), state.duration.take())
                    };
                    if let Some(duration) = duration {
                        shared.downstream.subscription().remove(&duration);
                        duration.unsubscribe();
                    }
                    if let Some(value) = value {
                        shared.downstream.next(value);
                    }
                    shared.downstream.complete();
                }
            };

            stage_with_complete(&downstream, on_next, on_complete)
        })
    }
}
