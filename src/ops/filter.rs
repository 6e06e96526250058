//! Keep only values matching a predicate.

use std::rc::Rc;

use super::{stage, try_or_error};
use crate::observable::Observable;
use crate::observer::Subscriber;

impl<T: 'static> Observable<T> {
    /// Yields only the values for which `predicate` returns true.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Observable<T> {
        let predicate = Rc::new(predicate);
        self.lift(move |downstream: Subscriber<T>| {
            let predicate = predicate.clone();
            let target = downstream.clone();
            stage(&downstream, move |value: T| {
                match try_or_error(&target, || predicate(&value)) {
                    Some(true) => target.next(value),
                    Some(false) | None => {}
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::from_iter;
    use crate::test_utils::Recorder;

    #[test]
    fn keeps_matching_values() {
        let recorder = Recorder::new();
        recorder.subscribe_to(&from_iter([1, 2, 3, 4, 5, 6]).filter(|v| v % 2 == 0));
        assert_eq!(recorder.values(), vec![2, 4, 6]);
        assert!(recorder.completed());
    }
}
