//! One schedulable, possibly-repeating unit of work.
//!
//! An Action executes its work at most once per schedule request. The
//! re-entrant rescheduling decision is modeled explicitly as a tagged
//! state rather than object identity: rescheduling an Action that has
//! not yet fired replaces it in place (its queue token is recycled when
//! the delay is unchanged), while rescheduling after it fired requests a
//! fresh queue record with a new insertion index.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use crate::subscription::Subscription;

/// Boxed unit of deferred work.
pub type WorkFn = Box<dyn FnMut(&ActionContext)>;

pub(crate) type RequeueFn = Box<dyn Fn(&Rc<ActionCore>, Duration)>;

/// Execution context handed to a running Action.
///
/// The only way work re-schedules itself: the request is recorded here
/// and applied by the flush loop after the work returns, which keeps
/// recursive repetition from re-entering the queue mid-execution.
pub struct ActionContext {
    now: Duration,
    requested: Cell<Option<Duration>>,
}

impl ActionContext {
    pub(crate) fn new(now: Duration) -> Self {
        Self {
            now,
            requested: Cell::new(None),
        }
    }

    /// The scheduler's clock at the moment this execution began.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Requests that this Action run again after `delay`.
    ///
    /// The latest request wins if called more than once.
    pub fn reschedule(&self, delay: Duration) {
        self.requested.set(Some(delay));
    }

    pub(crate) fn take_request(&self) -> Option<Duration> {
        self.requested.take()
    }
}

/// Where an Action stands relative to its queue token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActionState {
    /// Queued, not yet executed; a reschedule recycles in place.
    Idle,
    /// Executed; a reschedule allocates a fresh queue record.
    Fired,
    /// Disposed; reschedules are ignored.
    Cancelled,
}

pub(crate) struct ActionCore {
    work: RefCell<WorkFn>,
    state: Cell<ActionState>,
    /// Delay of the most recent schedule request, for the recycle test.
    delay: Cell<Duration>,
    /// Insertion index of the live queue entry.
    index: Cell<u64>,
    /// Invalidates stale queue entries after in-place replacement.
    generation: Cell<u64>,
    handle: Subscription,
    requeue: RequeueFn,
}

impl ActionCore {
    pub(crate) fn state(&self) -> ActionState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: ActionState) {
        self.state.set(state);
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay.get()
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.delay.set(delay);
    }

    pub(crate) fn index(&self) -> u64 {
        self.index.get()
    }

    pub(crate) fn set_index(&self, index: u64) {
        self.index.set(index);
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub(crate) fn bump_generation(&self) -> u64 {
        let next = self.generation.get() + 1;
        self.generation.set(next);
        next
    }

    /// Marks this Action disposed and drops its captured work.
    ///
    /// Called from the handle's teardown; must not close the handle
    /// itself. If the work is currently executing its captured state is
    /// released when the execution returns instead.
    pub(crate) fn cancel_in_place(&self) {
        self.state.set(ActionState::Cancelled);
        self.bump_generation();
        if let Ok(mut work) = self.work.try_borrow_mut() {
            *work = Box::new(|_| {});
        }
    }

    /// Disposes this Action through its handle.
    pub(crate) fn cancel(&self) {
        self.handle.unsubscribe();
    }

    /// Runs the work once, applying the panic-isolation contract.
    ///
    /// Returns the reschedule request on success, or the panic payload
    /// after cancelling this Action on failure.
    pub(crate) fn execute(
        self: &Rc<Self>,
        now: Duration,
    ) -> Result<Option<Duration>, Box<dyn Any + Send>> {
        self.state.set(ActionState::Fired);
        let ctx = ActionContext::new(now);
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut work = self.work.borrow_mut();
            (*work)(&ctx)
        }));
        match result {
            Ok(()) => {
                // A work that cancelled itself must not be re-queued.
                if self.state.get() == ActionState::Cancelled {
                    Ok(None)
                } else {
                    Ok(ctx.take_request())
                }
            }
            Err(payload) => {
                self.cancel();
                Err(payload)
            }
        }
    }

    /// Applies a reschedule request through the owning scheduler.
    pub(crate) fn request_reschedule(self: &Rc<Self>, delay: Duration) {
        if self.state.get() == ActionState::Cancelled {
            return;
        }
        (self.requeue)(self, delay);
    }
}

/// A unit of deferred work bound to a scheduler.
///
/// The Action doubles as a resource handle: add [`Action::handle`] to a
/// subscription tree and cancellation of that tree cancels the pending
/// execution.
#[derive(Clone)]
pub struct Action {
    core: Rc<ActionCore>,
}

impl Action {
    /// Builds an Action and registers its cancel teardown.
    pub(crate) fn new(work: WorkFn, delay: Duration, index: u64, requeue: RequeueFn) -> Self {
        let handle = Subscription::new();
        let core = Rc::new(ActionCore {
            work: RefCell::new(work),
            state: Cell::new(ActionState::Idle),
            delay: Cell::new(delay),
            index: Cell::new(index),
            generation: Cell::new(0),
            handle: handle.clone(),
            requeue,
        });
        let weak = Rc::downgrade(&core);
        handle.add_teardown(move || {
            if let Some(core) = weak.upgrade() {
                core.cancel_in_place();
            }
        });
        Self { core }
    }

    pub(crate) fn core(&self) -> &Rc<ActionCore> {
        &self.core
    }

    /// The disposal handle owning this Action's pending execution.
    #[must_use]
    pub fn handle(&self) -> &Subscription {
        &self.core.handle
    }

    /// Returns true once this Action has been disposed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.core.state.get() == ActionState::Cancelled
    }

    /// Re-queues this Action to run after `delay`.
    ///
    /// A not-yet-fired Action is replaced in place, keeping its queue
    /// position among equal delays when the delay is unchanged; a fired
    /// Action gets a fresh queue record. Ignored once disposed.
    pub fn reschedule(&self, delay: Duration) {
        self.core.request_reschedule(delay);
    }

    /// Cancels the pending execution.
    pub fn unsubscribe(&self) {
        self.core.cancel();
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("state", &self.core.state.get())
            .field("delay", &self.core.delay.get())
            .field("index", &self.core.index.get())
            .finish()
    }
}
