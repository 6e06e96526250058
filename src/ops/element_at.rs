//! Select a single emission by position.

use std::cell::Cell;
use std::rc::Rc;

use super::stage_with_complete;
use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;

impl<T: Clone + 'static> Observable<T> {
    /// Emits only the value at emission index `index`, then completes.
    ///
    /// If the stream completes before reaching `index`, emits `default`
    /// when supplied, otherwise errors with
    /// [`StreamError::IndexOutOfRange`].
    pub fn element_at(&self, index: usize, default: Option<T>) -> Observable<T> {
        self.lift(move |downstream: Subscriber<T>| {
            let seen = Rc::new(Cell::new(0_usize));
            let emitted = Rc::new(Cell::new(false));
            let target = downstream.clone();
            let done_target = downstream.clone();
            let done_emitted = emitted.clone();
            let fallback = default.clone();
            stage_with_complete(
                &downstream,
                move |value: T| {
                    let position = seen.get();
                    seen.set(position + 1);
                    if position == index {
                        emitted.set(true);
                        target.next(value);
                        target.complete();
                    }
                },
                move || {
                    if done_emitted.get() {
                        return;
                    }
                    match &fallback {
                        Some(value) => {
                            done_target.next(value.clone());
                            done_target.complete();
                        }
                        None => done_target.error(StreamError::IndexOutOfRange { index }),
                    }
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::from_iter;
    use crate::test_utils::Recorder;

    #[test]
    fn picks_the_requested_position() {
        let recorder = Recorder::new();
        recorder.subscribe_to(&from_iter([10, 20, 30]).element_at(1, None));
        assert_eq!(recorder.values(), vec![20]);
        assert!(recorder.completed());
    }

    #[test]
    fn short_stream_without_default_errors() {
        let recorder = Recorder::new();
        recorder.subscribe_to(&from_iter([10]).element_at(4, None));
        assert_eq!(recorder.error(), Some(StreamError::IndexOutOfRange { index: 4 }));
    }

    #[test]
    fn short_stream_with_default_emits_it() {
        let recorder = Recorder::new();
        recorder.subscribe_to(&from_iter([10]).element_at(4, Some(-1)));
        assert_eq!(recorder.values(), vec![-1]);
        assert!(recorder.completed());
    }
}
