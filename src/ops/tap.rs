//! Observe values without consuming them.

use std::rc::Rc;

use super::{stage, try_or_error};
use crate::observable::Observable;
use crate::observer::Subscriber;

impl<T: 'static> Observable<T> {
    /// Runs `observe` on each value, then forwards it unchanged.
    pub fn tap(&self, observe: impl Fn(&T) + 'static) -> Observable<T> {
        let observe = Rc::new(observe);
        self.lift(move |downstream: Subscriber<T>| {
            let observe = observe.clone();
            let target = downstream.clone();
            stage(&downstream, move |value: T| {
                if try_or_error(&target, || observe(&value)).is_some() {
                    target.next(value);
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
    use std::cell::RefCell;

    #[test]
    fn observes_without_altering_the_stream() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let recorder = Recorder::new();
        recorder.subscribe_to(&from_iter([1, 2, 3]).tap(move |v| sink.borrow_mut().push(*v)));
        assert_eq!(recorder.values(), vec![1, 2, 3]);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }
}
