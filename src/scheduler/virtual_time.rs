//! Virtual-time scheduler for deterministic tests.
//!
//! Maintains its own integer clock (`frame`) and an explicit queue
//! ordered by `(due frame, insertion index)`. Equal delays execute in
//! scheduling order, which is what makes this a faithful deterministic
//! substitute for the real-time scheduler. One frame is one millisecond
//! of requested delay.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::time::Duration;

use super::action::{Action, ActionCore, ActionState, RequeueFn};
use super::{Scheduler, WorkFn};

/// Default bound on how far `flush` advances the virtual clock.
pub const DEFAULT_MAX_FRAMES: u64 = 750;

struct VirtualEntry {
    due: u64,
    index: u64,
    generation: u64,
    core: Rc<ActionCore>,
}

impl PartialEq for VirtualEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.index == other.index
    }
}

impl Eq for VirtualEntry {}

impl Ord for VirtualEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap ordering: earliest due frame first, then insertion order.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for VirtualEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct VirtualCore {
    frame: u64,
    max_frames: u64,
    next_index: u64,
    active: bool,
    queue: BinaryHeap<VirtualEntry>,
}

/// A scheduler whose clock only moves when `flush` is called.
#[derive(Clone)]
pub struct VirtualScheduler {
    core: Rc<RefCell<VirtualCore>>,
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualScheduler {
    /// Creates a scheduler bounded at [`DEFAULT_MAX_FRAMES`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frames(DEFAULT_MAX_FRAMES)
    }

    /// Creates a scheduler that flushes no further than `max_frames`.
    #[must_use]
    pub fn with_max_frames(max_frames: u64) -> Self {
        Self {
            core: Rc::new(RefCell::new(VirtualCore {
                frame: 0,
                max_frames,
                next_index: 0,
                active: false,
                queue: BinaryHeap::new(),
            })),
        }
    }

    /// The current virtual frame.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.core.borrow().frame
    }

    /// Number of queued (possibly stale) entries, for diagnostics.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.core.borrow().queue.len()
    }

    fn frames(delay: Duration) -> u64 {
        u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
    }

    fn make_requeue(core: &Rc<RefCell<VirtualCore>>) -> RequeueFn {
        let weak = Rc::downgrade(core);
        Box::new(move |action: &Rc<ActionCore>, delay: Duration| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut sched = shared.borrow_mut();
            // A not-yet-fired action with an unchanged delay keeps its
            // insertion index; anything else gets a fresh record.
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
            let due = sched.frame.saturating_add(Self::frames(delay));
            sched.queue.push(VirtualEntry {
                due,
                index,
                generation,
                core: action.clone(),
            });
        })
    }
}

impl Scheduler for VirtualScheduler {
    fn now(&self) -> Duration {
        Duration::from_millis(self.core.borrow().frame)
    }

    fn schedule(&self, delay: Duration, work: WorkFn) -> Action {
        let (index, due) = {
            let mut sched = self.core.borrow_mut();
            let index = sched.next_index;
            sched.next_index += 1;
            (index, sched.frame.saturating_add(Self::frames(delay)))
        };
        let action = Action::new(work, delay, index, Self::make_requeue(&self.core));
        self.core.borrow_mut().queue.push(VirtualEntry {
            due,
            index,
            generation: 0,
            core: action.core().clone(),
        });
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
            let entry = {
                let mut sched = self.core.borrow_mut();
                match sched.queue.pop() {
                    Some(entry) if entry.due > sched.max_frames => {
                        // Beyond the bound: leave it queued, stop here.
                        sched.queue.push(entry);
                        None
                    }
                    other => other,
                }
            };
            let Some(entry) = entry else { break };
            if entry.generation != entry.core.generation()
                || entry.core.state() != ActionState::Idle
            {
                continue;
            }

            self.core.borrow_mut().frame = entry.due;
            tracing::trace!(frame = entry.due, index = entry.index, "virtual action firing");
            match entry.core.execute(Duration::from_millis(entry.due)) {
                Ok(Some(delay)) => entry.core.request_reschedule(delay),
                Ok(None) => {}
                Err(payload) => {
                    failure = Some(payload);
                    break;
                }
            }
        }

        if let Some(payload) = failure {
            // A failing action must not leave dangling timers: cancel
            // everything still queued before re-raising.
            let drained: Vec<VirtualEntry> =
                self.core.borrow_mut().queue.drain().collect();
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
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn equal_delays_fire_in_scheduling_order() {
        let scheduler = VirtualScheduler::with_max_frames(10);
        let order = Rc::new(StdRefCell::new(Vec::new()));

        for (name, delay) in [("a", 10), ("b", 10), ("c", 5)] {
            let log = order.clone();
            scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move |_| log.borrow_mut().push(name)),
            );
        }

        scheduler.flush();
        assert_eq!(*order.borrow(), vec!["c", "a", "b"]);
        assert_eq!(scheduler.frame(), 10);
    }

    #[test]
    fn actions_beyond_max_frames_stay_queued() {
        let scheduler = VirtualScheduler::with_max_frames(10);
        let fired = Rc::new(StdRefCell::new(Vec::new()));

        for delay in [5_u64, 20] {
            let log = fired.clone();
            scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move |_| log.borrow_mut().push(delay)),
            );
        }

        scheduler.flush();
        assert_eq!(*fired.borrow(), vec![5]);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn recursive_reschedule_repeats() {
        let scheduler = VirtualScheduler::with_max_frames(30);
        let ticks = Rc::new(StdRefCell::new(Vec::new()));

        let log = ticks.clone();
        scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move |ctx| {
                log.borrow_mut().push(ctx.now().as_millis() as u64);
                ctx.reschedule(Duration::from_millis(10));
            }),
        );

        scheduler.flush();
        assert_eq!(*ticks.borrow(), vec![10, 20, 30]);
    }

    #[test]
    fn cancelled_action_never_fires() {
        let scheduler = VirtualScheduler::new();
        let fired = Rc::new(StdRefCell::new(false));

        let flag = fired.clone();
        let action = scheduler.schedule(
            Duration::from_millis(5),
            Box::new(move |_| *flag.borrow_mut() = true),
        );
        action.unsubscribe();

        scheduler.flush();
        assert!(!*fired.borrow());
    }

    #[test]
    fn reschedule_before_firing_replaces_in_place() {
        let scheduler = VirtualScheduler::new();
        let fired_at = Rc::new(StdRefCell::new(Vec::new()));

        let log = fired_at.clone();
        let action = scheduler.schedule(
            Duration::from_millis(5),
            Box::new(move |ctx| log.borrow_mut().push(ctx.now().as_millis() as u64)),
        );
        action.reschedule(Duration::from_millis(12));

        scheduler.flush();
        assert_eq!(*fired_at.borrow(), vec![12]);
    }

    #[test]
    fn panicking_action_drains_and_cancels_the_queue() {
        let scheduler = VirtualScheduler::new();
        let later_ran = Rc::new(StdRefCell::new(false));

        scheduler.schedule(Duration::from_millis(1), Box::new(|_| panic!("work failed")));
        let flag = later_ran.clone();
        let survivor = scheduler.schedule(
            Duration::from_millis(2),
            Box::new(move |_| *flag.borrow_mut() = true),
        );

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scheduler.flush()));
        assert!(result.is_err());
        assert!(!*later_ran.borrow());
        assert!(survivor.is_cancelled());
        assert_eq!(scheduler.pending(), 0);

        // The scheduler remains usable after a failed flush.
        let flag = later_ran.clone();
        scheduler.schedule(
            Duration::from_millis(1),
            Box::new(move |_| *flag.borrow_mut() = true),
        );
        scheduler.flush();
        assert!(*later_ran.borrow());
    }
}
