//! Disposal primitives: the resource tree behind every subscription.
//!
//! A [`Subscription`] is a single disposable unit that composes into
//! trees. Every operator stage, scheduled action, and inner subscription
//! hangs off this tree, which is what lets an arbitrarily deep operator
//! chain tear down in one [`Subscription::unsubscribe`] call without
//! manual bookkeeping by each stage.
//!
//! # Invariants
//!
//! - Once closed, all held children and teardowns are disposed exactly
//!   once and the sets are cleared
//! - Adding a child to an already-closed handle disposes that child
//!   immediately instead of storing it
//! - Close is idempotent, and safe to call re-entrantly from inside a
//!   teardown triggered by the same handle

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::{panic_message, TeardownError};

/// Teardown logic a producer may hand back when it is subscribed.
///
/// A closed sum rather than duck typing: a callback, another handle, or
/// nothing at all.
pub enum Teardown {
    /// No cleanup required.
    None,
    /// A one-shot cleanup callback.
    Callback(Box<dyn FnOnce()>),
    /// Another handle whose close is this teardown.
    Handle(Subscription),
}

impl Teardown {
    /// Wraps a one-shot cleanup callback.
    pub fn callback(f: impl FnOnce() + 'static) -> Self {
        Self::Callback(Box::new(f))
    }
}

impl From<Subscription> for Teardown {
    fn from(handle: Subscription) -> Self {
        Self::Handle(handle)
    }
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("Teardown::None"),
            Self::Callback(_) => f.write_str("Teardown::Callback"),
            Self::Handle(_) => f.write_str("Teardown::Handle"),
        }
    }
}

#[derive(Default)]
struct Inner {
    closed: bool,
    /// Owned cleanup callbacks, run in addition order before children.
    teardowns: SmallVec<[Box<dyn FnOnce()>; 1]>,
    /// Owned child handles, closed in addition order.
    children: SmallVec<[Subscription; 4]>,
}

/// A disposable unit owning teardown logic and child handles.
///
/// Cloning a `Subscription` clones the handle, not the resource: all
/// clones refer to the same node in the disposal tree.
#[derive(Clone, Default)]
pub struct Subscription {
    inner: Rc<RefCell<Inner>>,
}

impl Subscription {
    /// Creates a new open handle with no teardown and no children.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle that is already closed.
    ///
    /// Anything added to it is disposed immediately.
    #[must_use]
    pub fn closed() -> Self {
        let handle = Self::new();
        handle.inner.borrow_mut().closed = true;
        handle
    }

    /// Returns true once this handle has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Returns true if both handles refer to the same node.
    #[must_use]
    pub fn same_handle(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Transfers ownership of `child` to this handle.
    ///
    /// If this handle is already closed the child is disposed
    /// synchronously instead of retained, which prevents leaks when a
    /// stage attaches work to an already-torn-down tree. Adding a handle
    /// to itself is a no-op.
    pub fn add(&self, child: Subscription) {
        if self.same_handle(&child) || child.is_closed() {
            return;
        }
        let accepted = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                false
            } else {
                inner.children.push(child.clone());
                true
            }
        };
        if !accepted {
            child.unsubscribe();
        }
    }

    /// Registers a one-shot cleanup callback.
    ///
    /// Runs immediately if this handle is already closed.
    pub fn add_teardown(&self, f: impl FnOnce() + 'static) {
        let rejected = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                Some(f)
            } else {
                inner.teardowns.push(Box::new(f));
                None
            }
        };
        if let Some(f) = rejected {
            f();
        }
    }

    /// Attaches producer-returned teardown logic.
    pub fn attach(&self, teardown: Teardown) {
        match teardown {
            Teardown::None => {}
            Teardown::Callback(f) => self.add_teardown(f),
            Teardown::Handle(handle) => self.add(handle),
        }
    }

    /// Releases `child` without disposing it.
    ///
    /// Used when a child's lifetime is reassigned elsewhere.
    pub fn remove(&self, child: &Subscription) {
        let mut inner = self.inner.borrow_mut();
        inner.children.retain(|c| !Rc::ptr_eq(&c.inner, &child.inner));
    }

    /// Closes this handle, disposing teardowns then children in
    /// addition order.
    ///
    /// Idempotent. A panicking teardown does not prevent the others from
    /// running; the aggregated failure is logged once at the end.
    pub fn unsubscribe(&self) {
        if let Err(err) = self.try_unsubscribe() {
            tracing::error!(error = %err, "subscription teardown failed");
        }
    }

    /// Closes this handle, reporting aggregated teardown failures.
    ///
    /// The second and subsequent calls are no-ops returning `Ok`.
    pub fn try_unsubscribe(&self) -> Result<(), TeardownError> {
        // Mark closed and drain while the borrow is held, then run the
        // drained work unborrowed so re-entrant unsubscribes are no-ops.
        let (teardowns, children) = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
            (
                std::mem::take(&mut inner.teardowns),
                std::mem::take(&mut inner.children),
            )
        };

        let mut failures: Vec<String> = Vec::new();
        for teardown in teardowns {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(teardown)) {
                failures.push(panic_message(&*payload));
            }
        }
        for child in children {
            if let Err(err) = child.try_unsubscribe() {
                failures.extend(err.failures().iter().cloned());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            tracing::debug!(count = failures.len(), "aggregated teardown failures");
            Err(TeardownError::new(failures))
        }
    }

    /// Number of live children, for diagnostics and tests.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.borrow().children.len()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Subscription")
            .field("closed", &inner.closed)
            .field("children", &inner.children.len())
            .field("teardowns", &inner.teardowns.len())
            .finish()
    }
}
