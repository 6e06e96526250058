//! Transform each value with a projection.

use std::rc::Rc;

use super::{stage, try_or_error};
use crate::observable::Observable;
use crate::observer::Subscriber;

impl<T: 'static> Observable<T> {
    /// Transforms each emitted value with `project`.
    pub fn map<U: 'static>(&self, project: impl Fn(T) -> U + 'static) -> Observable<U> {
        let project = Rc::new(project);
        self.lift(move |downstream: Subscriber<U>| {
            let project = project.clone();
            let target = downstream.clone();
            stage(&downstream, move |value: T| {
                if let Some(mapped) = try_or_error(&target, || project(value)) {
                    target.next(mapped);
                }
            })
        })
    }
}
