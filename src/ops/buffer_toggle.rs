//! Buffers opened and closed by companion streams.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::coordination::{subscribe_inner, InnerHandler};
use super::try_or_error;
use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use crate::subscription::Subscription;

struct BufferContext<T> {
    id: usize,
    values: Vec<T>,
    closing: Subscription,
}

struct BufferShared<T, O, C> {
    contexts: RefCell<Vec<BufferContext<T>>>,
    downstream: Subscriber<Vec<T>>,
    next_id: Cell<usize>,
    closing_selector: Rc<dyn Fn(&O) -> Observable<C>>,
}

impl<T: Clone + 'static, O: Clone + 'static, C: 'static> BufferShared<T, O, C> {
    fn open(self: &Rc<Self>, opening: O) {
        let Some(closing_source) =
            try_or_error(&self.downstream, || (self.closing_selector)(&opening))
        else {
            return;
        };

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let closing = Subscription::new();
        self.downstream.subscription().add(closing.clone());
        self.contexts.borrow_mut().push(BufferContext {
            id,
            values: Vec::new(),
            closing: closing.clone(),
        });
        subscribe_inner(closing_source, opening, id, Closing(self.clone()), closing);
    }

    fn close(&self, id: usize) {
        let context = {
            let mut contexts = self.contexts.borrow_mut();
            let position = contexts.iter().position(|c| c.id == id);
            position.map(|p| contexts.remove(p))
        };
        if let Some(context) = context {
            self.downstream.subscription().remove(&context.closing);
            context.closing.unsubscribe();
            self.downstream.next(context.values);
        }
    }

    fn forward(&self, value: T) {
        for context in self.contexts.borrow_mut().iter_mut() {
            context.values.push(value.clone());
        }
    }

    fn terminate(&self, err: Option<StreamError>) {
        let contexts = std::mem::take(&mut *self.contexts.borrow_mut());
        match err {
            Some(err) => self.downstream.error(err),
            None => {
                // Open buffers flush in opening order on completion.
                for context in contexts {
                    self.downstream.next(context.values);
                }
                self.downstream.complete();
            }
        }
    }
}

struct Closing<T, O, C>(Rc<BufferShared<T, O, C>>);

impl<T, O, C> Clone for Closing<T, O, C> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Clone + 'static, O: Clone + 'static, C: 'static> InnerHandler<O, C>
    for Closing<T, O, C>
{
    fn notify_next(
        &self,
        _outer_value: &O,
        _inner_value: C,
        outer_index: usize,
        _inner_index: usize,
        _inner: &Subscription,
    ) {
        self.0.close(outer_index);
    }

    fn notify_error(&self, err: StreamError, _inner: &Subscription) {
        self.0.terminate(Some(err));
    }

    // Silent completion keeps the buffer collecting.
    fn notify_complete(&self, _inner: &Subscription) {}
}

impl<T: Clone + 'static> Observable<T> {
    /// Collects values into buffers. Each `openings` emission starts a
    /// buffer; the buffer is emitted as a `Vec` when the stream from
    /// `closing_selector` for that opening first emits.
    ///
    /// Buffers may overlap; a value is copied into every buffer open
    /// at the time. Buffers still open at upstream completion flush in
    /// opening order before the completion notification.
    pub fn buffer_toggle<O, C>(
        &self,
        openings: Observable<O>,
        closing_selector: impl Fn(&O) -> Observable<C> + 'static,
    ) -> Observable<Vec<T>>
    where
        O: Clone + 'static,
        C: 'static,
    {
        let closing_selector: Rc<dyn Fn(&O) -> Observable<C>> = Rc::new(closing_selector);
        self.lift(move |downstream: Subscriber<Vec<T>>| {
            let shared = Rc::new(BufferShared {
                contexts: RefCell::new(Vec::new()),
                downstream: downstream.clone(),
                next_id: Cell::new(0),
                closing_selector: closing_selector.clone(),
            });

            let openings_sub = Subscription::new();
            downstream.subscription().add(openings_sub.clone());
            let opener = {
                let shared = shared.clone();
                move |opening: O| shared.open(opening)
            };
            let open_error = {
                let shared = shared.clone();
                move |err: StreamError| shared.terminate(Some(err))
            };
            openings.subscribe_with(Subscriber::wrap(
                openings_sub,
                Some(Box::new(opener)),
                Some(Box::new(open_error)),
                None,
            ));

            let on_next = {
                let shared = shared.clone();
                move |value: T| shared.forward(value)
            };
            let on_error = {
                let shared = shared.clone();
                move |err: StreamError| shared.terminate(Some(err))
            };
            let on_complete = move || shared.terminate(None);
            Subscriber::wrap(
                downstream.subscription().clone(),
                Some(Box::new(on_next)),
                Some(Box::new(on_error)),
                Some(Box::new(on_complete)),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::window::WindowSubject;
    use crate::test_utils::Recorder;

    #[test]
    fn overlapping_buffers_each_collect_their_span() {
        let source = WindowSubject::new();
        let openings = WindowSubject::new();
        let closers: Rc<RefCell<Vec<WindowSubject<()>>>> =
            Rc::new(RefCell::new(Vec::new()));

        let closers_for_selector = closers.clone();
        let buffered = source
            .observable()
            .buffer_toggle(openings.observable(), move |_: &u32| {
                let closer = WindowSubject::new();
                closers_for_selector.borrow_mut().push(closer.clone());
                closer.observable()
            });
        let recorder = Recorder::new();
        recorder.subscribe_to(&buffered);

        openings.next(0);
        source.next('a');
        openings.next(1);
        source.next('b');
        closers.borrow()[0].clone().next(());
        source.next('c');
        closers.borrow()[1].clone().next(());
        source.complete();

        assert_eq!(
            recorder.values(),
            vec![vec!['a', 'b'], vec!['b', 'c']]
        );
        assert!(recorder.completed());
    }

    #[test]
    fn buffers_open_at_completion_flush_in_order() {
        let source = WindowSubject::new();
        let openings = WindowSubject::new();

        let buffered = source
            .observable()
            .buffer_toggle(openings.observable(), |_: &u32| {
                crate::observable::never::<()>()
            });
        let recorder = Recorder::new();
        recorder.subscribe_to(&buffered);

        openings.next(0);
        source.next(1);
        openings.next(1);
        source.next(2);
        source.complete();

        assert_eq!(recorder.values(), vec![vec![1, 2], vec![2]]);
        assert!(recorder.completed());
    }
}
