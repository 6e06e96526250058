//! Multicast plumbing backing the windowing operators.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use crate::subscription::Teardown;

#[derive(Clone)]
enum Terminal {
    Completed,
    Failed(StreamError),
}

struct SubjectState<T> {
    observers: Vec<(u64, Subscriber<T>)>,
    next_id: u64,
    terminal: Option<Terminal>,
}

/// A hot, multicast stream segment. Each open window hands one of
/// these to the consumer as an `Observable` while the operator pushes
/// source values into it.
pub(crate) struct WindowSubject<T> {
    state: Rc<RefCell<SubjectState<T>>>,
}

impl<T> Clone for WindowSubject<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + 'static> WindowSubject<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SubjectState {
                observers: Vec::new(),
                next_id: 0,
                terminal: None,
            })),
        }
    }

    pub(crate) fn next(&self, value: T) {
        // Snapshot before delivering: a subscriber may unsubscribe or
        // resubscribe mid-notification.
        let observers: Vec<Subscriber<T>> = {
            let state = self.state.borrow();
            if state.terminal.is_some() {
                return;
            }
            state.observers.iter().map(|(_, s)| s.clone()).collect()
        };
        for observer in observers {
            observer.next(value.clone());
        }
    }

    pub(crate) fn complete(&self) {
        self.terminate(Terminal::Completed);
    }

    pub(crate) fn error(&self, err: StreamError) {
        self.terminate(Terminal::Failed(err));
    }

    fn terminate(&self, terminal: Terminal) {
        let observers = {
            let mut state = self.state.borrow_mut();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(terminal.clone());
            std::mem::take(&mut state.observers)
        };
        for (_, observer) in observers {
            match &terminal {
                Terminal::Completed => observer.complete(),
                Terminal::Failed(err) => observer.error(err.clone()),
            }
        }
    }

    /// The consumer-facing view. Late subscribers after termination
    /// observe the terminal notification immediately.
    pub(crate) fn observable(&self) -> Observable<T> {
        let state = self.state.clone();
        Observable::new(move |subscriber: Subscriber<T>| {
            let id = {
                let mut guard = state.borrow_mut();
                match &guard.terminal {
                    Some(Terminal::Completed) => {
                        drop(guard);
                        subscriber.complete();
                        return Teardown::None;
                    }
                    Some(Terminal::Failed(err)) => {
                        let err = err.clone();
                        drop(guard);
                        subscriber.error(err);
                        return Teardown::None;
                    }
                    None => {
                        let id = guard.next_id;
                        guard.next_id += 1;
                        guard.observers.push((id, subscriber));
                        id
                    }
                }
            };
            let state = state.clone();
            Teardown::callback(move || {
                state.borrow_mut().observers.retain(|(slot, _)| *slot != id);
            })
        })
    }
}
