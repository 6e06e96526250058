//! Deadline enforcement between consecutive emissions.

use std::rc::Rc;
use std::time::Duration;

use crate::error::StreamError;
use crate::observable::Observable;
use crate::observer::Subscriber;
use crate::scheduler::Scheduler;
use crate::subscription::{Subscription, Teardown};

impl<T: 'static> Observable<T> {
    /// Fails with [`StreamError::Timeout`] if more than `due` passes
    /// between subscription and the first value, or between any two
    /// consecutive values. Every emission restarts the clock.
    pub fn timeout(&self, due: Duration, scheduler: Rc<dyn Scheduler>) -> Observable<T> {
        self.lift(move |downstream: Subscriber<T>| {
            let deadline = {
                let downstream = downstream.clone();
                scheduler.schedule(
                    due,
                    Box::new(move |_ctx| downstream.error(StreamError::Timeout)),
                )
            };
            downstream
                .subscription()
                .add(deadline.handle().clone());

            let action = deadline.clone();
            let next_target = downstream.clone();
            super::stage(&downstream, move |value: T| {
                // Restart the window before handing the value on, so a
                // slow consumer does not eat into the next deadline.
                action.reschedule(due);
                next_target.next(value);
            })
        })
    }

    /// Like [`Observable::timeout`], but instead of failing, a missed
    /// deadline detaches the source and switches the consumer onto
    /// `fallback`. Values already delivered are unaffected.
    pub fn timeout_with(
        &self,
        due: Duration,
        fallback: Observable<T>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Observable<T> {
        let this = self.clone();
        Observable::new(move |subscriber: Subscriber<T>| {
            let upstream_sub = Subscription::new();
            subscriber.subscription().add(upstream_sub.clone());

            let deadline = {
                let subscriber = subscriber.clone();
                let fallback = fallback.clone();
                let upstream_sub = upstream_sub.clone();
                scheduler.schedule(
                    due,
                    Box::new(move |_ctx| {
                        subscriber.subscription().remove(&upstream_sub);
                        upstream_sub.unsubscribe();
                        let forward = subscriber.clone();
                        let mirror =
                            super::stage(&subscriber, move |value: T| forward.next(value));
                        fallback.subscribe_with(mirror);
                    }),
                )
            };
            subscriber.subscription().add(deadline.handle().clone());

            let action = deadline.clone();
            let next_target = subscriber.clone();
            let err_target = subscriber.clone();
            let done_target = subscriber.clone();
            let done_action = deadline.clone();
            this.subscribe_with(Subscriber::wrap(
                upstream_sub,
                Some(Box::new(move |value: T| {
                    action.reschedule(due);
                    next_target.next(value);
                })),
                Some(Box::new(move |err: StreamError| err_target.error(err))),
                Some(Box::new(move || {
                    done_action.unsubscribe();
                    done_target.complete();
                })),
            ));

            Teardown::None
        })
    }
}
