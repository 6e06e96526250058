#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use std::rc::Rc;

pub use rivulet::test_utils::{
    init_test_logging, scheduled_values, Notification, Recorder,
};
pub use rivulet::{assert_with_log, test_complete, test_phase, test_section};

use rivulet::{Scheduler, VirtualScheduler};

/// Initialize logging and announce the test phase.
pub fn init_test(test_name: &str) {
    init_test_logging();
    test_phase!(test_name);
}

/// A fresh virtual scheduler plus a trait-object handle for factories
/// and operators.
#[must_use]
pub fn virtual_clock() -> (VirtualScheduler, Rc<dyn Scheduler>) {
    let scheduler = VirtualScheduler::new();
    let handle: Rc<dyn Scheduler> = Rc::new(scheduler.clone());
    (scheduler, handle)
}
