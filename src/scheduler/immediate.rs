//! Trampoline scheduler: FIFO work drained as soon as possible.
//!
//! Work scheduled while a flush is running is appended to the live
//! queue rather than executed inline, so re-entrant scheduling keeps
//! FIFO ordering and never nests flushes. Delays are ignored; this
//! variant models "as soon as the current work finishes".

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::action::{Action, ActionCore, ActionState, RequeueFn};
use super::{Scheduler, WorkFn};

struct ImmediateEntry {
    generation: u64,
    core: Rc<ActionCore>,
}

struct ImmediateCore {
    epoch: Instant,
    active: bool,
    queue: VecDeque<ImmediateEntry>,
}

/// A scheduler that drains scheduled work immediately, FIFO.
#[derive(Clone)]
pub struct ImmediateScheduler {
    core: Rc<RefCell<ImmediateCore>>,
}

impl Default for ImmediateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ImmediateScheduler {
    /// Creates an idle trampoline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Rc::new(RefCell::new(ImmediateCore {
                epoch: Instant::now(),
                active: false,
                queue: VecDeque::new(),
            })),
        }
    }

    fn make_requeue(core: &Rc<RefCell<ImmediateCore>>) -> RequeueFn {
        let weak = Rc::downgrade(core);
        Box::new(move |action: &Rc<ActionCore>, delay: Duration| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let generation = action.bump_generation();
            action.set_delay(delay);
            action.set_state(ActionState::Idle);
            shared.borrow_mut().queue.push_back(ImmediateEntry {
                generation,
                core: action.clone(),
            });
        })
    }
}

impl Scheduler for ImmediateScheduler {
    fn now(&self) -> Duration {
        self.core.borrow().epoch.elapsed()
    }

    fn schedule(&self, delay: Duration, work: WorkFn) -> Action {
        let action = Action::new(work, delay, 0, Self::make_requeue(&self.core));
        self.core.borrow_mut().queue.push_back(ImmediateEntry {
            generation: 0,
            core: action.core().clone(),
        });
        self.flush();
        action
    }

    fn flush(&self) {
        {
            let mut sched = self.core.borrow_mut();
            if sched.active {
                return;
            }
            sched.active = true;
        }

        let mut failure = None;
        loop {
            let entry = self.core.borrow_mut().queue.pop_front();
            let Some(entry) = entry else { break };
            if entry.generation != entry.core.generation()
                || entry.core.state() != ActionState::Idle
            {
                continue;
            }
            let now = self.core.borrow().epoch.elapsed();
            match entry.core.execute(now) {
                Ok(Some(delay)) => entry.core.request_reschedule(delay),
                Ok(None) => {}
                Err(payload) => {
                    failure = Some(payload);
                    break;
                }
            }
        }

        if let Some(payload) = failure {
            let drained: Vec<ImmediateEntry> = {
                let mut sched = self.core.borrow_mut();
                sched.queue.drain(..).collect()
            };
            for entry in &drained {
                entry.core.cancel();
            }
            self.core.borrow_mut().active = false;
            std::panic::resume_unwind(payload);
        }
        self.core.borrow_mut().active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrant_scheduling_stays_fifo() {
        let scheduler = ImmediateScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = order.clone();
        let inner_sched = scheduler.clone();
        scheduler.schedule(
            Duration::ZERO,
            Box::new(move |_| {
                log.borrow_mut().push("outer");
                let log_inner = log.clone();
                inner_sched.schedule(
                    Duration::ZERO,
                    Box::new(move |_| log_inner.borrow_mut().push("inner")),
                );
                log.borrow_mut().push("outer-after");
            }),
        );

        assert_eq!(*order.borrow(), vec!["outer", "outer-after", "inner"]);
    }

    #[test]
    fn work_runs_once_per_schedule() {
        let scheduler = ImmediateScheduler::new();
        let runs = Rc::new(RefCell::new(0));

        let counter = runs.clone();
        scheduler.schedule(Duration::ZERO, Box::new(move |_| *counter.borrow_mut() += 1));
        scheduler.flush();

        assert_eq!(*runs.borrow(), 1);
    }
}
