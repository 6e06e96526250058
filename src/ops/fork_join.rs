//! Join the final values of several streams.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use crate::subscription::{Subscription, Teardown};

/// Subscribes every source and waits for all of them to finish,
/// emitting one `Vec` holding each source's last value, in source
/// order.
///
/// A source that completes without ever emitting makes the join empty:
/// the output completes immediately with no value. The first error
/// from any source is forwarded at once. An empty input set completes
/// immediately.
pub fn fork_join<T: Clone + 'static>(sources: Vec<Observable<T>>) -> Observable<Vec<T>> {
    Observable::new(move |subscriber: Subscriber<Vec<T>>| {
        if sources.is_empty() {
            subscriber.complete();
            return Teardown::None;
        }

        let lasts: Rc<RefCell<Vec<Option<T>>>> =
            Rc::new(RefCell::new(vec![None; sources.len()]));
        let remaining = Rc::new(Cell::new(sources.len()));

        for (slot, source) in sources.iter().enumerate() {
            let child = Subscription::new();
            subscriber.subscription().add(child.clone());

            let on_next = {
                let lasts = lasts.clone();
                move |value: T| {
                    lasts.borrow_mut()[slot] = Some(value);
                }
            };
            let on_error = {
                let subscriber = subscriber.clone();
                move |err: StreamError| subscriber.error(err)
            };
            let on_complete = {
                let lasts = lasts.clone();
                let remaining = remaining.clone();
                let subscriber = subscriber.clone();
                move || {
                    if lasts.borrow()[slot].is_none() {
                        // One silent source empties the whole join.
                        subscriber.complete();
                        return;
                    }
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        let joined: Option<Vec<T>> =
                            lasts.borrow_mut().drain(..).collect();
                        if let Some(joined) = joined {
                            subscriber.next(joined);
                        }
                        subscriber.complete();
                    }
                }
            };
            source.subscribe_with(Subscriber::wrap(
                child,
                Some(Box::new(on_next)),
                Some(Box::new(on_error)),
                Some(Box::new(on_complete)),
            ));
        }
        Teardown::None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::{empty, from_iter, of, throw};
    use crate::test_utils::Recorder;

    #[test]
    fn joins_last_values_in_source_order() {
        let recorder = Recorder::new();
        recorder.subscribe_to(&fork_join(vec![from_iter([1, 2, 3]), of(5)]));
        assert_eq!(recorder.values(), vec![vec![3, 5]]);
        assert!(recorder.completed());
    }

    #[test]
    fn one_silent_source_empties_the_join() {
        let recorder = Recorder::new();
        recorder.subscribe_to(&fork_join(vec![of(1), empty()]));
        assert!(recorder.values().is_empty());
        assert!(recorder.completed());
    }

    #[test]
    fn no_sources_completes_immediately() {
        let recorder = Recorder::new();
        recorder.subscribe_to(&fork_join::<i32>(Vec::new()));
        assert!(recorder.values().is_empty());
        assert!(recorder.completed());
    }

    #[test]
    fn first_error_wins() {
        let recorder = Recorder::new();
        recorder.subscribe_to(&fork_join(vec![
            of(1),
            throw(StreamError::user("join failed")),
        ]));
        assert_eq!(recorder.error(), Some(StreamError::user("join failed")));
        assert!(!recorder.completed());
    }
}
