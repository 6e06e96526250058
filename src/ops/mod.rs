//! The operator catalogue.
//!
//! Every operator is a pure `Observable<A> -> Observable<B>`
//! transformation built on [`Observable::lift`]: wrap the downstream
//! subscriber in a stage-specific one, re-subscribe the source. Stages
//! forward (or suppress) notifications; the termination guard is
//! enforced centrally by the subscriber, never per operator.
//!
//! User closures (projections, predicates, accumulators, comparators,
//! selectors) are isolated at the point of invocation: a panic becomes
//! an `error` notification downstream instead of unwinding through the
//! chain.

pub(crate) mod coordination;

mod buffer_toggle;
mod debounce;
mod element_at;
mod expand;
mod filter;
mod fork_join;
mod map;
mod merge_scan;
mod scan;
mod sequence_equal;
mod take;
mod tap;
mod timeout;
mod window;
mod window_toggle;

pub use fork_join::fork_join;

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::StreamError;
use crate::observer::Subscriber;

/// Builds an operator-stage subscriber that forwards errors and
/// completion downstream unchanged.
///
/// The stage shares the downstream subscription handle, so the whole
/// chain is one disposal tree.
pub(crate) fn stage<In: 'static, Out: 'static>(
    downstream: &Subscriber<Out>,
    on_next: impl Fn(In) + 'static,
) -> Subscriber<In> {
    let complete_target = downstream.clone();
    stage_with_complete(downstream, on_next, move || complete_target.complete())
}

/// Builds an operator-stage subscriber with a stage-specific completion
/// reaction; errors still forward unchanged.
pub(crate) fn stage_with_complete<In: 'static, Out: 'static>(
    downstream: &Subscriber<Out>,
    on_next: impl Fn(In) + 'static,
    on_complete: impl Fn() + 'static,
) -> Subscriber<In> {
    let error_target = downstream.clone();
    Subscriber::wrap(
        downstream.subscription().clone(),
        Some(Box::new(on_next)),
        Some(Box::new(move |err| error_target.error(err))),
        Some(Box::new(on_complete)),
    )
}

/// Builds an operator-stage subscriber whose completion reaction owns
/// terminal delivery: the shared handle stays open across the upstream
/// terminal so queued and in-flight inner subscriptions survive, and is
/// closed when the stage pushes its own downstream terminal.
pub(crate) fn stage_deferring_complete<In: 'static, Out: 'static>(
    downstream: &Subscriber<Out>,
    on_next: impl Fn(In) + 'static,
    on_complete: impl Fn() + 'static,
) -> Subscriber<In> {
    let error_target = downstream.clone();
    Subscriber::wrap_deferred(
        downstream.subscription().clone(),
        Some(Box::new(on_next)),
        Some(Box::new(move |err| error_target.error(err))),
        Some(Box::new(on_complete)),
    )
}

/// Runs a user closure, converting a panic into a downstream error.
///
/// Returns `None` when the closure panicked; the stage must then stop
/// processing the current notification.
pub(crate) fn try_or_error<Out: 'static, R>(
    downstream: &Subscriber<Out>,
    f: impl FnOnce() -> R,
) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            downstream.error(StreamError::from_panic(payload));
            None
        }
    }
}
