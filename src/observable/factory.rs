//! Construction API: factories that wrap producers into streams.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use super::Observable;
use crate::error::StreamError;
use crate::scheduler::Scheduler;
use crate::subscription::Teardown;

/// A stream that emits one value, then completes.
pub fn of<T: Clone + 'static>(value: T) -> Observable<T> {
    Observable::new(move |subscriber| {
        subscriber.next(value.clone());
        subscriber.complete();
        Teardown::None
    })
}

/// A stream that synchronously emits each item of `values`, then
/// completes.
pub fn from_iter<T: Clone + 'static>(values: impl IntoIterator<Item = T>) -> Observable<T> {
    let values: Vec<T> = values.into_iter().collect();
    Observable::new(move |subscriber| {
        for value in &values {
            subscriber.next(value.clone());
        }
        subscriber.complete();
        Teardown::None
    })
}

/// A stream that completes immediately without emitting.
pub fn empty<T: 'static>() -> Observable<T> {
    Observable::new(|subscriber| {
        subscriber.complete();
        Teardown::None
    })
}

/// A stream that never emits and never terminates.
pub fn never<T: 'static>() -> Observable<T> {
    Observable::new(|_subscriber| Teardown::None)
}

/// A stream that errors immediately.
pub fn throw<T: 'static>(err: StreamError) -> Observable<T> {
    Observable::new(move |subscriber| {
        subscriber.error(err.clone());
        Teardown::None
    })
}

/// A stream built fresh by `factory` at every subscribe.
pub fn defer<T: 'static>(factory: impl Fn() -> Observable<T> + 'static) -> Observable<T> {
    Observable::new(move |subscriber| {
        factory().subscribe_with(subscriber);
        Teardown::None
    })
}

/// Emits `0` once after `delay` on `scheduler`, then completes.
pub fn timer(delay: Duration, scheduler: Rc<dyn Scheduler>) -> Observable<u64> {
    Observable::new(move |subscriber| {
        let emit = subscriber.clone();
        let action = scheduler.schedule(
            delay,
            Box::new(move |_ctx| {
                emit.next(0);
                emit.complete();
            }),
        );
        Teardown::Handle(action.handle().clone())
    })
}

/// Emits an ascending counter every `period` on `scheduler`, forever.
pub fn interval(period: Duration, scheduler: Rc<dyn Scheduler>) -> Observable<u64> {
    Observable::new(move |subscriber| {
        let emit = subscriber.clone();
        let count = Cell::new(0_u64);
        let action = scheduler.schedule(
            period,
            Box::new(move |ctx| {
                let n = count.get();
                count.set(n + 1);
                emit.next(n);
                ctx.reschedule(period);
            }),
        );
        Teardown::Handle(action.handle().clone())
    })
}
