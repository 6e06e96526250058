//! Real-time scheduler: delays realized against the host clock.
//!
//! Keeps the same explicit `(due, insertion index)` queue as the virtual
//! variant, with due times on the host monotonic clock; `flush` drives
//! the queue on the calling thread, sleeping until the next due instant.
//! Rescheduling a pending action with an unchanged delay recycles its
//! queue record instead of allocating a new one, so a hot repeat loop
//! does not thrash the queue.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::action::{Action, ActionCore, ActionState, RequeueFn};
use super::{Scheduler, WorkFn};

struct RuntimeEntry {
    due: Instant,
    index: u64,
    generation: u64,
    core: Rc<ActionCore>,
}

impl PartialEq for RuntimeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.index == other.index
    }
}

impl Eq for RuntimeEntry {}

impl Ord for RuntimeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap ordering: earliest due instant first, then insertion order.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for RuntimeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct RuntimeCore {
    epoch: Instant,
    next_index: u64,
    active: bool,
    queue: BinaryHeap<RuntimeEntry>,
}

/// The wall-clock scheduler; the conventional default for time-sensitive
/// operators.
#[derive(Clone)]
pub struct RuntimeScheduler {
    core: Rc<RefCell<RuntimeCore>>,
}

impl Default for RuntimeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeScheduler {
    /// Creates an idle scheduler with its epoch at now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: Rc::new(RefCell::new(RuntimeCore {
                epoch: Instant::now(),
                next_index: 0,
                active: false,
                queue: BinaryHeap::new(),
            })),
        }
    }

    fn make_requeue(core: &Rc<RefCell<RuntimeCore>>) -> RequeueFn {
        let weak = Rc::downgrade(core);
        Box::new(move |action: &Rc<ActionCore>, delay: Duration| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut sched = shared.borrow_mut();
            let recycle = action.state() == ActionState::Idle && delay == action.delay();
            let generation = action.bump_generation();
            let index = if recycle {
                action.index()
            } else {
                let index = sched.next_index;
                sched.next_index += 1;
                index
            };
            action.set_index(index);
            action.set_delay(delay);
            action.set_state(ActionState::Idle);
            sched.queue.push(RuntimeEntry {
                due: Instant::now() + delay,
                index,
                generation,
                core: action.clone(),
            });
        })
    }
}

impl Scheduler for RuntimeScheduler {
    fn now(&self) -> Duration {
        self.core.borrow().epoch.elapsed()
    }

    fn schedule(&self, delay: Duration, work: WorkFn) -> Action {
        let index = {
            let mut sched = self.core.borrow_mut();
            let index = sched.next_index;
            sched.next_index += 1;
            index
        };
        let action = Action::new(work, delay, index, Self::make_requeue(&self.core));
        self.core.borrow_mut().queue.push(RuntimeEntry {
            due: Instant::now() + delay,
            index,
            generation: 0,
            core: action.core().clone(),
        });
        action
    }

    /// Blocks the calling thread until the queue is idle.
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
            let entry = self.core.borrow_mut().queue.pop();
            let Some(entry) = entry else { break };
            if entry.generation != entry.core.generation()
                || entry.core.state() != ActionState::Idle
            {
                continue;
            }

            let now = Instant::now();
            if entry.due > now {
                std::thread::sleep(entry.due - now);
            }
            let elapsed = self.core.borrow().epoch.elapsed();
            tracing::trace!(index = entry.index, "runtime action firing");
            match entry.core.execute(elapsed) {
                Ok(Some(delay)) => entry.core.request_reschedule(delay),
                Ok(None) => {}
                Err(payload) => {
                    failure = Some(payload);
                    break;
                }
            }
        }

        if let Some(payload) = failure {
            let drained: Vec<RuntimeEntry> = {
                let mut sched = self.core.borrow_mut();
                sched.queue.drain().collect()
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
    fn due_actions_run_in_delay_then_insertion_order() {
        let scheduler = RuntimeScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (name, millis) in [("slow", 4_u64), ("fast", 1), ("slow-too", 4)] {
            let log = order.clone();
            scheduler.schedule(
                Duration::from_millis(millis),
                Box::new(move |_| log.borrow_mut().push(name)),
            );
        }

        scheduler.flush();
        assert_eq!(*order.borrow(), vec!["fast", "slow", "slow-too"]);
    }

    #[test]
    fn clock_advances_past_scheduled_delay() {
        let scheduler = RuntimeScheduler::new();
        let observed = Rc::new(RefCell::new(Duration::ZERO));

        let sink = observed.clone();
        scheduler.schedule(
            Duration::from_millis(5),
            Box::new(move |ctx| *sink.borrow_mut() = ctx.now()),
        );
        scheduler.flush();

        assert!(*observed.borrow() >= Duration::from_millis(5));
    }
}
