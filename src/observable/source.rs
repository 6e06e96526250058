//! The closed sum of things an operator can subscribe to.
//!
//! Operators whose secondary input is naturally heterogeneous (the
//! debounce duration selector accepts a stream, a value sequence, or a
//! deferred factory) take anything convertible into [`InnerSource`]
//! rather than duck-typing at runtime: one conversion function per
//! variant, resolved at the call site.

use std::rc::Rc;

use super::{defer, from_iter, Observable};

/// A secondary input normalized for inner subscription.
pub enum InnerSource<T> {
    /// An already-built stream.
    Stream(Observable<T>),
    /// A pre-computed value sequence, emitted synchronously on subscribe.
    Sequence(Vec<T>),
    /// A deferred stream, built fresh per subscription.
    Deferred(Rc<dyn Fn() -> Observable<T>>),
}

impl<T: Clone + 'static> InnerSource<T> {
    /// Resolves this input to a subscribable stream.
    #[must_use]
    pub fn into_observable(self) -> Observable<T> {
        match self {
            Self::Stream(stream) => stream,
            Self::Sequence(values) => from_iter(values),
            Self::Deferred(factory) => defer(move || factory()),
        }
    }
}

impl<T> From<Observable<T>> for InnerSource<T> {
    fn from(stream: Observable<T>) -> Self {
        Self::Stream(stream)
    }
}

impl<T> From<Vec<T>> for InnerSource<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Sequence(values)
    }
}

impl<T, const N: usize> From<[T; N]> for InnerSource<T> {
    fn from(values: [T; N]) -> Self {
        Self::Sequence(values.into())
    }
}

impl<T> std::fmt::Debug for InnerSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("InnerSource::Stream"),
            Self::Sequence(values) => write!(f, "InnerSource::Sequence(len={})", values.len()),
            Self::Deferred(_) => f.write_str("InnerSource::Deferred"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn collect(stream: &Observable<i32>) -> Vec<i32> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        stream.subscribe(move |v| sink.borrow_mut().push(v));
        let out = seen.borrow().clone();
        out
    }

    #[test]
    fn sequence_variant_emits_synchronously() {
        let source: InnerSource<i32> = vec![1, 2, 3].into();
        assert_eq!(collect(&source.into_observable()), vec![1, 2, 3]);
    }

    #[test]
    fn array_variant_converts() {
        let source: InnerSource<i32> = [4, 5].into();
        assert_eq!(collect(&source.into_observable()), vec![4, 5]);
    }

    #[test]
    fn deferred_variant_builds_per_subscription() {
        let source = InnerSource::Deferred(Rc::new(|| from_iter([7])));
        let stream = source.into_observable();
        assert_eq!(collect(&stream), vec![7]);
        assert_eq!(collect(&stream), vec![7]);
    }
}
