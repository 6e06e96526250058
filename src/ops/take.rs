//! Limit a stream to its first `n` values.

use std::cell::Cell;
use std::rc::Rc;

use super::stage;
use crate::observable::{empty, Observable};
use crate::observer::Subscriber;

impl<T: 'static> Observable<T> {
    /// Emits the first `count` values, then completes and unsubscribes
    /// upstream.
    pub fn take(&self, count: usize) -> Observable<T> {
        if count == 0 {
            return empty();
        }
        self.lift(move |downstream: Subscriber<T>| {
            let remaining = Rc::new(Cell::new(count));
            let target = downstream.clone();
            stage(&downstream, move |value: T| {
                let left = remaining.get();
                if left == 0 {
                    return;
                }
                remaining.set(left - 1);
                target.next(value);
                if left == 1 {
                    target.complete();
                }
            })
        })
    }
}
