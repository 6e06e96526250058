//! Pairwise comparison of two streams' full emission sequences.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use crate::subscription::{Subscription, Teardown};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

struct SeqState<T> {
    left: VecDeque<T>,
    right: VecDeque<T>,
    left_done: bool,
    right_done: bool,
}

impl<T> SeqState<T> {
    fn queues(&mut self, side: Side) -> (&mut VecDeque<T>, &mut VecDeque<T>) {
        match side {
            Side::Left => (&mut self.left, &mut self.right),
            Side::Right => (&mut self.right, &mut self.left),
        }
    }

    fn done_flags(&self, side: Side) -> (bool, bool) {
        match side {
            Side::Left => (self.left_done, self.right_done),
            Side::Right => (self.right_done, self.left_done),
        }
    }
}

struct SeqShared<T> {
    state: RefCell<SeqState<T>>,
    downstream: Subscriber<bool>,
    comparer: Rc<dyn Fn(&T, &T) -> bool>,
}

impl<T: 'static> SeqShared<T> {
    fn emit(&self, result: bool) {
        self.downstream.next(result);
        self.downstream.complete();
    }

    fn value(&self, side: Side, value: T) {
        enum Verdict<T> {
            Compare(T, T),
            Mismatch,
            Buffered,
        }
        let verdict = {
            let mut state = self.state.borrow_mut();
            let (_, other_done) = state.done_flags(side);
            let (own, other) = state.queues(side);
            if let Some(buffered) = other.pop_front() {
                Verdict::Compare(buffered, value)
            } else if other_done {
                // The other sequence already ended; this value has no
                // counterpart.
                Verdict::Mismatch
            } else {
                own.push_back(value);
                Verdict::Buffered
            }
        };
        match verdict {
            Verdict::Compare(a, b) => {
                let Some(equal) = super::try_or_error(&self.downstream, || {
                    match side {
                        Side::Left => (self.comparer)(&b, &a),
                        Side::Right => (self.comparer)(&a, &b),
                    }
                }) else {
                    return;
                };
                if !equal {
                    self.emit(false);
                } else {
                    self.check_settled();
                }
            }
            Verdict::Mismatch => self.emit(false),
            Verdict::Buffered => {}
        }
    }

    fn done(&self, side: Side) {
        let verdict = {
            let mut state = self.state.borrow_mut();
            match side {
                Side::Left => state.left_done = true,
                Side::Right => state.right_done = true,
            }
            let (_, other_done) = state.done_flags(side);
            let (own, other) = state.queues(side);
            if !other.is_empty() {
                // The other side buffered values this side will never
                // produce counterparts for.
                Some(false)
            } else if other_done {
                Some(own.is_empty())
            } else {
                None
            }
        };
        if let Some(result) = verdict {
            self.emit(result);
        }
    }

    fn check_settled(&self) {
        let settled = {
            let state = self.state.borrow();
            state.left_done
                && state.right_done
                && state.left.is_empty()
                && state.right.is_empty()
        };
        if settled {
            self.emit(true);
        }
    }
}

impl<T: 'static> Observable<T> {
    /// Emits a single `bool`: whether this stream and `other` emit
    /// equal values in the same order and then both complete.
    ///
    /// The verdict is emitted as early as it is decidable, e.g. on the
    /// first mismatched pair, without waiting for either stream to
    /// finish.
    pub fn sequence_equal(&self, other: Observable<T>) -> Observable<bool>
    where
        T: PartialEq,
    {
        self.sequence_equal_by(other, |a, b| a == b)
    }

    /// `sequence_equal` with a caller-supplied comparison.
    pub fn sequence_equal_by(
        &self,
        other: Observable<T>,
        comparer: impl Fn(&T, &T) -> bool + 'static,
    ) -> Observable<bool> {
        let this = self.clone();
        let comparer: Rc<dyn Fn(&T, &T) -> bool> = Rc::new(comparer);
        Observable::new(move |subscriber: Subscriber<bool>| {
            let shared = Rc::new(SeqShared {
                state: RefCell::new(SeqState {
                    left: VecDeque::new(),
                    right: VecDeque::new(),
                    left_done: false,
                    right_done: false,
                }),
                downstream: subscriber.clone(),
                comparer: comparer.clone(),
            });

            for (side, source) in [(Side::Left, &this), (Side::Right, &other)] {
                let child = Subscription::new();
                subscriber.subscription().add(child.clone());
                let next_shared = shared.clone();
                let err_shared = shared.clone();
                let done_shared = shared.clone();
                source.subscribe_with(Subscriber::wrap(
                    child,
                    Some(Box::new(move |value: T| next_shared.value(side, value))),
                    Some(Box::new(move |err: StreamError| {
                        err_shared.downstream.error(err)
                    })),
                    Some(Box::new(move || done_shared.done(side))),
                ));
            }
            Teardown::None
        })
    }
}
