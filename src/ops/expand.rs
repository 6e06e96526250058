//! Recursive projection: every emitted value is also fed back through
//! the projection to produce more values.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::coordination::{subscribe_inner, InnerHandler};
use super::stage_deferring_complete;
use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use crate::subscription::Subscription;

struct ExpandState<T> {
    buffer: VecDeque<T>,
    active: usize,
    index: usize,
    upstream_done: bool,
}

struct ExpandShared<T> {
    state: RefCell<ExpandState<T>>,
    downstream: Subscriber<T>,
    project: Rc<dyn Fn(&T) -> Observable<T>>,
    concurrent: usize,
}

impl<T: Clone + 'static> ExpandShared<T> {
    /// Emits `value` and either starts its projection or buffers it
    /// when the concurrency budget is spent.
    fn push(self: &Rc<Self>, value: T) {
        self.downstream.next(value.clone());
        if self.downstream.is_stopped() {
            return;
        }
        let start = {
            let mut state = self.state.borrow_mut();
            if state.active < self.concurrent {
                state.active += 1;
                let index = state.index;
                state.index += 1;
                Some(index)
            } else {
                state.buffer.push_back(value.clone());
                None
            }
        };
        if let Some(index) = start {
            self.subscribe_projection(value, index);
        }
    }

    fn subscribe_projection(self: &Rc<Self>, value: T, index: usize) {
        let projected = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (self.project)(&value)
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

    /// One projection finished; drain the buffer or complete.
    fn inner_done(self: &Rc<Self>, inner: &Subscription) {
        self.downstream.subscription().remove(inner);
        enum Step<T> {
            Start(T, usize),
            Complete,
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
                Step::Complete
            } else {
                Step::Wait
            }
        };
        match step {
            Step::Start(value, index) => self.subscribe_projection(value, index),
            Step::Complete => self.downstream.complete(),
            Step::Wait => {}
        }
    }
}

impl<T: Clone + 'static> InnerHandler<T, T> for Rc<ExpandShared<T>> {
    fn notify_next(
        &self,
        _outer_value: &T,
        inner_value: T,
        _outer_index: usize,
        _inner_index: usize,
        _inner: &Subscription,
    ) {
        self.push(inner_value);
    }

    fn notify_error(&self, err: StreamError, _inner: &Subscription) {
        self.downstream.error(err);
    }

    fn notify_complete(&self, inner: &Subscription) {
        self.inner_done(inner);
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Emits every source value, projects each emitted value back into
    /// a stream, and recursively expands those streams' values too.
    ///
    /// At most `concurrent` projections run at once; values arriving
    /// over budget wait in a queue. `concurrent == 0` means unbounded.
    /// Completes once upstream and every projection have finished and
    /// the queue is empty.
    pub fn expand(
        &self,
        project: impl Fn(&T) -> Observable<T> + 'static,
        concurrent: usize,
    ) -> Observable<T> {
        let project: Rc<dyn Fn(&T) -> Observable<T>> = Rc::new(project);
        let concurrent = if concurrent == 0 { usize::MAX } else { concurrent };
        self.lift(move |downstream: Subscriber<T>| {
            let shared = Rc::new(ExpandShared {
                state: RefCell::new(ExpandState {
                    buffer: VecDeque::new(),
                    active: 0,
                    index: 0,
                    upstream_done: false,
                }),
                downstream: downstream.clone(),
                project: project.clone(),
                concurrent,
            });

            let on_next = {
                let shared = shared.clone();
                move |value: T| shared.push(value)
            };
            let on_complete = {
                let shared = shared.clone();
                move || {
                    let done = {
                        let mut state = shared.state.borrow_mut();
                        state.upstream_done = true;
                        state.active == 0 && state.buffer.is_empty()
                    };
                    if done {
                        shared.downstream.complete();
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
    use crate::observable::{empty, of};
    use crate::test_utils::Recorder;

    #[test]
    fn doubles_until_the_projection_stops() {
        let recorder = Recorder::new();
        let doubled = of(1).expand(
            |&v| {
                if v < 8 {
                    of(v * 2)
                } else {
                    empty()
                }
            },
            1,
        );
        recorder.subscribe_to(&doubled);
        assert_eq!(recorder.values(), vec![1, 2, 4, 8]);
        assert!(recorder.completed());
    }

    #[test]
    fn concurrency_limit_queues_overflow_in_order() {
        let recorder = Recorder::new();
        let expanded = crate::observable::from_iter([1, 10]).expand(
            |&v| {
                if v % 10 < 3 {
                    of(v + 1)
                } else {
                    empty()
                }
            },
            1,
        );
        recorder.subscribe_to(&expanded);
        // Synchronous sources drain each chain before the next source
        // value arrives; projections over budget run from the queue.
        // Each chain grows until the last digit reaches 3.
        assert_eq!(recorder.values(), vec![1, 2, 3, 10, 11, 12, 13]);
        assert!(recorder.completed());
    }

    #[test]
    fn unbounded_expansion_interleaves_synchronously() {
        let recorder = Recorder::new();
        let expanded = of(1).expand(
            |&v| {
                if v < 4 {
                    of(v + 1)
                } else {
                    empty()
                }
            },
            0,
        );
        recorder.subscribe_to(&expanded);
        assert_eq!(recorder.values(), vec![1, 2, 3, 4]);
        assert!(recorder.completed());
    }
}
