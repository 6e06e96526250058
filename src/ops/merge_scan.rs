//! Accumulate across concurrently merged inner streams.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::coordination::{subscribe_inner, InnerHandler};
use super::stage_deferring_complete;
use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use crate::subscription::Subscription;

struct MergeScanState<T, Acc> {
    acc: Acc,
    has_value: bool,
    buffer: VecDeque<T>,
    active: usize,
    index: usize,
    upstream_done: bool,
}

struct MergeScanShared<T, Acc> {
    state: RefCell<MergeScanState<T, Acc>>,
    downstream: Subscriber<Acc>,
    accumulator: Rc<dyn Fn(&Acc, &T) -> Observable<Acc>>,
    concurrent: usize,
}

impl<T: 'static, Acc: Clone + 'static> MergeScanShared<T, Acc> {
    fn start_or_buffer(self: &Rc<Self>, value: T) {
        let start = {
            let mut state = self.state.borrow_mut();
            if state.active < self.concurrent {
                state.active += 1;
                let index = state.index;
                state.index += 1;
                Some((value, index))
            } else {
                state.buffer.push_back(value);
                None
            }
        };
        if let Some((value, index)) = start {
            self.subscribe_accumulation(value, index);
        }
    }

    fn subscribe_accumulation(self: &Rc<Self>, value: T, index: usize) {
        let acc = self.state.borrow().acc.clone();
        let projected = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (self.accumulator)(&acc, &value)
        })) {
            Ok(projected) => projected,
            Err(payload) => {
                self.downstream.error(StreamError::from_panic(payload));
                return;
            }
        };
        let inner = Subscription::new();
        self.downstream.subscription().add(inner.clone());
        subscribe_inner(projected, value, index, self.clone(), inner);
    }

    fn inner_done(self: &Rc<Self>, inner: &Subscription) {
        self.downstream.subscription().remove(inner);
        enum Step<T, Acc> {
            Start(T, usize),
            Complete(Option<Acc>),
            Wait,
        }
        let step = {
            let mut state = self.state.borrow_mut();
            state.active -= 1;
            if let Some(value) = state.buffer.pop_front() {
                state.active += 1;
                let index = state.index;
                state.index += 1;
                Step::Start(value, index)
            } else if state.active == 0 && state.upstream_done {
                let seed_emit = if state.has_value {
                    None
                } else {
                    Some(state.acc.clone())
                };
                Step::Complete(seed_emit)
            } else {
                Step::Wait
            }
        };
        match step {
            Step::Start(value, index) => self.subscribe_accumulation(value, index),
            Step::Complete(seed_emit) => self.finish(seed_emit),
            Step::Wait => {}
        }
    }

    fn finish(&self, seed_emit: Option<Acc>) {
        if let Some(seed) = seed_emit {
            self.downstream.next(seed);
        }
        self.downstream.complete();
    }
}

impl<T: 'static, Acc: Clone + 'static> InnerHandler<T, Acc> for Rc<MergeScanShared<T, Acc>> {
    fn notify_next(
        &self,
        _outer_value: &T,
        inner_value: Acc,
        _outer_index: usize,
        _inner_index: usize,
        _inner: &Subscription,
    ) {
        {
            let mut state = self.state.borrow_mut();
            state.acc = inner_value.clone();
            state.has_value = true;
        }
        self.downstream.next(inner_value);
    }

    fn notify_error(&self, err: StreamError, _inner: &Subscription) {
        self.downstream.error(err);
    }

    fn notify_complete(&self, inner: &Subscription) {
        self.inner_done(inner);
    }
}

impl<T: 'static> Observable<T> {
    /// Like `scan`, except the accumulator returns a stream: each
    /// source value is combined with the current accumulator into an
    /// inner stream whose emissions become both the output values and
    /// the next accumulator state.
    ///
    /// At most `concurrent` inner streams run at once (`0` means
    /// unbounded); excess source values queue. If no inner stream ever
    /// emits, the seed is emitted once before completion.
    pub fn merge_scan<Acc>(
        &self,
        accumulator: impl Fn(&Acc, &T) -> Observable<Acc> + 'static,
        seed: Acc,
        concurrent: usize,
    ) -> Observable<Acc>
    where
        Acc: Clone + 'static,
    {
        let accumulator: Rc<dyn Fn(&Acc, &T) -> Observable<Acc>> = Rc::new(accumulator);
        let concurrent = if concurrent == 0 { usize::MAX } else { concurrent };
        self.lift(move |downstream: Subscriber<Acc>| {
            let shared = Rc::new(MergeScanShared {
                state: RefCell::new(MergeScanState {
                    acc: seed.clone(),
                    has_value: false,
                    buffer: VecDeque::new(),
                    active: 0,
                    index: 0,
                    upstream_done: false,
                }),
                downstream: downstream.clone(),
                accumulator: accumulator.clone(),
                concurrent,
            });

            let on_next = {
                let shared = shared.clone();
                move |value: T| shared.start_or_buffer(value)
            };
            let on_complete = {
                let shared = shared.clone();
                move || {
                    let step = {
                        let mut state = shared.state.borrow_mut();
                        state.upstream_done = true;
                        if state.active == 0 && state.buffer.is_empty() {
                            Some(if state.has_value {
                                None
                            } else {
                                Some(state.acc.clone())
                            })
                        } else {
                            None
                        }
                    };
                    if let Some(seed_emit) = step {
                        shared.finish(seed_emit);
                    }
                }
            };
            stage_deferring_complete(&downstream, on_next, on_complete)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::{empty, from_iter, of};
    use crate::test_utils::Recorder;

    #[test]
    fn running_sum_over_inner_streams() {
        let recorder = Recorder::new();
        let summed = from_iter([1, 2, 3]).merge_scan(|acc, v| of(acc + v), 0, 1);
        recorder.subscribe_to(&summed);
        assert_eq!(recorder.values(), vec![1, 3, 6]);
        assert!(recorder.completed());
    }

    #[test]
    fn silent_inner_streams_emit_the_seed_once() {
        let recorder = Recorder::new();
        let scanned = from_iter([1, 2]).merge_scan(|_, _| empty::<i32>(), 42, 1);
        recorder.subscribe_to(&scanned);
        assert_eq!(recorder.values(), vec![42]);
        assert!(recorder.completed());
    }

    #[test]
    fn empty_source_emits_the_seed() {
        let recorder = Recorder::new();
        let scanned = empty::<i32>().merge_scan(|acc, v| of(acc + v), 7, 1);
        recorder.subscribe_to(&scanned);
        assert_eq!(recorder.values(), vec![7]);
        assert!(recorder.completed());
    }

    #[test]
    fn overflow_values_queue_until_a_slot_frees() {
        let gate = crate::ops::window::WindowSubject::new();
        let recorder = Recorder::new();
        let gate_for_acc = gate.clone();
        let summed = from_iter([1, 2, 3]).merge_scan(
            move |&acc, &v: &i32| {
                let sum = acc + v;
                gate_for_acc.observable().map(move |_: i32| sum)
            },
            0,
            1,
        );
        recorder.subscribe_to(&summed);

        // The first accumulation holds the only slot; 2 and 3 wait.
        assert!(recorder.values().is_empty());
        gate.next(0);
        gate.complete();

        assert_eq!(recorder.values(), vec![1]);
        assert!(recorder.completed());
    }

    #[test]
    fn inner_with_multiple_emissions_feeds_each_forward() {
        let recorder = Recorder::new();
        let scanned = of(10).merge_scan(|acc, v| from_iter([acc + v, acc + v * 2]), 0, 1);
        recorder.subscribe_to(&scanned);
        assert_eq!(recorder.values(), vec![10, 20]);
        assert!(recorder.completed());
    }
}
