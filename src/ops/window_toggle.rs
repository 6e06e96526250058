//! Windows opened and closed by companion streams.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::coordination::{subscribe_inner, InnerHandler};
use super::try_or_error;
use super::window::WindowSubject;
use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use crate::subscription::Subscription;

struct WindowContext<T> {
    id: usize,
    subject: WindowSubject<T>,
    closing: Subscription,
}

struct ToggleShared<T, O, C> {
    contexts: RefCell<Vec<WindowContext<T>>>,
    downstream: Subscriber<Observable<T>>,
    next_id: Cell<usize>,
    closing_selector: Rc<dyn Fn(&O) -> Observable<C>>,
}

impl<T: Clone + 'static, O: Clone + 'static, C: 'static> ToggleShared<T, O, C> {
    fn open(self: &Rc<Self>, opening: O) {
        let Some(closing_source) =
            try_or_error(&self.downstream, || (self.closing_selector)(&opening))
        else {
            return;
        };

        let subject = WindowSubject::new();
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let closing = Subscription::new();
        self.downstream.subscription().add(closing.clone());
        self.contexts.borrow_mut().push(WindowContext {
            id,
            subject: subject.clone(),
            closing: closing.clone(),
        });

        // Hand the window out before any values can land in it.
        self.downstream.next(subject.observable());
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
            context.subject.complete();
        }
    }

    fn forward(&self, value: T) {
        let subjects: Vec<WindowSubject<T>> = self
            .contexts
            .borrow()
            .iter()
            .map(|c| c.subject.clone())
            .collect();
        for subject in subjects {
            subject.next(value.clone());
        }
    }

    fn terminate(&self, err: Option<StreamError>) {
        let contexts = std::mem::take(&mut *self.contexts.borrow_mut());
        for context in contexts {
            match &err {
                Some(err) => context.subject.error(err.clone()),
                None => context.subject.complete(),
            }
        }
        match err {
            Some(err) => self.downstream.error(err),
            None => self.downstream.complete(),
        }
    }
}

struct Closing<T, O, C>(Rc<ToggleShared<T, O, C>>);

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

    // A closing stream that completes without emitting leaves its
    // window open until upstream terminates.
    fn notify_complete(&self, _inner: &Subscription) {}
}

impl<T: Clone + 'static> Observable<T> {
    /// Splits the source into overlapping windows. Each `openings`
    /// emission opens a window, published downstream as its own
    /// stream; the window closes when the stream returned by
    /// `closing_selector` for that opening first emits.
    ///
    /// Values arriving while several windows are open land in all of
    /// them. Upstream termination completes or errors every open
    /// window.
    pub fn window_toggle<O, C>(
        &self,
        openings: Observable<O>,
        closing_selector: impl Fn(&O) -> Observable<C> + 'static,
    ) -> Observable<Observable<T>>
    where
        O: Clone + 'static,
        C: 'static,
    {
        let closing_selector: Rc<dyn Fn(&O) -> Observable<C>> = Rc::new(closing_selector);
        self.lift(move |downstream: Subscriber<Observable<T>>| {
            let shared = Rc::new(ToggleShared {
                contexts: RefCell::new(Vec::new()),
                downstream: downstream.clone(),
                next_id: Cell::new(0),
                closing_selector: closing_selector.clone(),
            });

            // Openings ride their own handle so the whole chain tears
            // down together.
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

            // Unsubscribing the consumer closes every still-open window
            // so its subscribers do not linger in a live subject.
            let disposer = shared.clone();
            downstream.subscription().add_teardown(move || {
                let contexts = std::mem::take(&mut *disposer.contexts.borrow_mut());
                for context in contexts {
                    context.subject.complete();
                }
            });

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
