//! Running fold emitting each intermediate accumulator.

use std::cell::RefCell;
use std::rc::Rc;

use super::{stage, try_or_error};
use crate::observable::Observable;
use crate::observer::Subscriber;

impl<T: 'static> Observable<T> {
    /// Folds values into a running accumulator, emitting every step.
    pub fn scan<Acc>(
        &self,
        seed: Acc,
        accumulator: impl Fn(Acc, T) -> Acc + 'static,
    ) -> Observable<Acc>
    where
        Acc: Clone + 'static,
    {
        let accumulator = Rc::new(accumulator);
        self.lift(move |downstream: Subscriber<Acc>| {
            let accumulator = accumulator.clone();
            let state = Rc::new(RefCell::new(seed.clone()));
            let target = downstream.clone();
            stage(&downstream, move |value: T| {
                let current = state.borrow().clone();
                if let Some(next) = try_or_error(&target, || accumulator(current, value)) {
                    *state.borrow_mut() = next.clone();
                    target.next(next);
                }
            })
        })
    }
}
