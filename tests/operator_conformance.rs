//! End-to-end operator semantics on the virtual clock.
//!
//! These tests drive whole operator chains through the public API and
//! pin down their timing-sensitive behavior with the deterministic
//! scheduler: debounce windows, timeout deadlines, fallback
//! switchovers, and join completion rules.

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use common::*;
use rivulet::{empty, fork_join, from_iter, throw, timer, Observable, Scheduler, StreamError};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn debounce_emits_trailing_values_after_quiet_periods() {
    init_test("debounce_emits_trailing_values_after_quiet_periods");

    let (scheduler, handle) = virtual_clock();
    // a@0 and b@10 form one burst; c@50 stands alone.
    let source = scheduled_values(handle.clone(), vec![(0, 'a'), (10, 'b'), (50, 'c')], Some(100));
    let timer_handle = handle.clone();
    let debounced = source.debounce(move |_| timer(ms(20), timer_handle.clone()));

    let stamps = Rc::new(RefCell::new(Vec::new()));
    let sink = stamps.clone();
    let clock = scheduler.clone();
    let recorder = Recorder::new();
    recorder.subscribe_to(&debounced.tap(move |v| sink.borrow_mut().push((clock.frame(), *v))));
    scheduler.flush();

    assert_with_log!(
        *stamps.borrow() == vec![(30, 'b'), (70, 'c')],
        "trailing edge fires one quiet period after the last value",
        [(30, 'b'), (70, 'c')],
        stamps.borrow()
    );
    assert!(recorder.completed());
    test_complete!("debounce_emits_trailing_values_after_quiet_periods");
}

#[test]
fn debounce_flushes_the_held_value_on_completion() {
    init_test("debounce_flushes_the_held_value_on_completion");

    let (scheduler, handle) = virtual_clock();
    let source = scheduled_values(handle.clone(), vec![(0, 'a')], Some(5));
    let timer_handle = handle.clone();
    let recorder = Recorder::new();
    recorder.subscribe_to(&source.debounce(move |_| timer(ms(20), timer_handle.clone())));
    scheduler.flush();

    assert_eq!(recorder.values(), vec!['a']);
    assert!(recorder.completed());
    test_complete!("debounce_flushes_the_held_value_on_completion");
}

#[test]
fn timeout_errors_when_the_gap_exceeds_the_deadline() {
    init_test("timeout_errors_when_the_gap_exceeds_the_deadline");

    let (scheduler, handle) = virtual_clock();
    let source = scheduled_values(handle.clone(), vec![(5, 1), (15, 2), (80, 3)], Some(90));
    let recorder = Recorder::new();
    recorder.subscribe_to(&source.timeout(ms(30), handle));
    scheduler.flush();

    assert_eq!(recorder.values(), vec![1, 2]);
    assert_eq!(recorder.error(), Some(StreamError::Timeout));
    test_complete!("timeout_errors_when_the_gap_exceeds_the_deadline");
}

#[test]
fn timeout_with_switches_to_the_fallback_and_detaches_the_source() {
    init_test("timeout_with_switches_to_the_fallback_and_detaches_the_source");

    let (scheduler, handle) = virtual_clock();
    let source = scheduled_values(handle.clone(), vec![(5, 1), (90, 99)], Some(95));
    let fallback = scheduled_values(handle.clone(), vec![(10, 7), (20, 8)], Some(25));
    let recorder = Recorder::new();
    recorder.subscribe_to(&source.timeout_with(ms(20), fallback, handle));
    scheduler.flush();

    // The detached source's 99 never surfaces; the fallback's values
    // are mirrored into the same consumer.
    assert_eq!(recorder.values(), vec![1, 7, 8]);
    assert!(recorder.completed());
    assert!(recorder.error().is_none());
    test_complete!("timeout_with_switches_to_the_fallback_and_detaches_the_source");
}

#[test]
fn fork_join_waits_for_every_source_and_keeps_order() {
    init_test("fork_join_waits_for_every_source_and_keeps_order");

    let (scheduler, handle) = virtual_clock();
    // The slower source finishes last but keeps slot 0.
    let slow = scheduled_values(handle.clone(), vec![(30, 3)], Some(35));
    let fast = scheduled_values(handle.clone(), vec![(5, 4), (10, 5)], Some(15));
    let recorder = Recorder::new();
    recorder.subscribe_to(&fork_join(vec![slow, fast]));
    scheduler.flush();

    assert_eq!(recorder.values(), vec![vec![3, 5]]);
    assert!(recorder.completed());
    test_complete!("fork_join_waits_for_every_source_and_keeps_order");
}

#[test]
fn fork_join_with_one_silent_source_completes_empty() {
    init_test("fork_join_with_one_silent_source_completes_empty");

    let recorder = Recorder::new();
    recorder.subscribe_to(&fork_join(vec![from_iter([1, 2]), empty()]));
    assert!(recorder.values().is_empty());
    assert!(recorder.completed());
    test_complete!("fork_join_with_one_silent_source_completes_empty");
}

#[test]
fn fork_join_fails_fast_on_the_first_error() {
    init_test("fork_join_fails_fast_on_the_first_error");

    let (scheduler, handle) = virtual_clock();
    let slow = scheduled_values(handle.clone(), vec![(50, 1)], Some(55));
    let recorder = Recorder::new();
    recorder.subscribe_to(&fork_join(vec![slow, throw(StreamError::user("broken"))]));
    scheduler.flush();

    assert_eq!(recorder.error(), Some(StreamError::user("broken")));
    assert!(!recorder.completed());
    test_complete!("fork_join_fails_fast_on_the_first_error");
}

#[test]
fn sequence_equal_settles_on_the_earliest_decidable_point() {
    init_test("sequence_equal_settles_on_the_earliest_decidable_point");

    let (scheduler, handle) = virtual_clock();
    let left = scheduled_values(handle.clone(), vec![(0, 1), (20, 2)], None);
    let right = scheduled_values(handle.clone(), vec![(10, 1), (30, 9)], None);
    let recorder = Recorder::new();
    recorder.subscribe_to(&left.sequence_equal(right));
    scheduler.flush();

    // Neither side ever completes; the mismatch alone decides.
    assert_eq!(recorder.values(), vec![false]);
    assert!(recorder.completed());
    test_complete!("sequence_equal_settles_on_the_earliest_decidable_point");
}

#[test]
fn sequence_equal_tolerates_arbitrary_interleaving() {
    init_test("sequence_equal_tolerates_arbitrary_interleaving");

    let (scheduler, handle) = virtual_clock();
    let left = scheduled_values(handle.clone(), vec![(0, 1), (5, 2), (10, 3)], Some(12));
    let right = scheduled_values(handle.clone(), vec![(20, 1), (21, 2), (22, 3)], Some(30));
    let recorder = Recorder::new();
    recorder.subscribe_to(&left.sequence_equal(right));
    scheduler.flush();

    assert_eq!(recorder.values(), vec![true]);
    assert!(recorder.completed());
    test_complete!("sequence_equal_tolerates_arbitrary_interleaving");
}

#[test]
fn expand_breadth_is_bounded_by_the_concurrency_budget() {
    init_test("expand_breadth_is_bounded_by_the_concurrency_budget");

    let (scheduler, handle) = virtual_clock();
    let live = Rc::new(RefCell::new((0_usize, 0_usize)));
    let gauge = live.clone();
    let timer_handle = handle.clone();
    let project = move |&v: &u64| {
        if v >= 8 {
            return empty();
        }
        {
            let mut live = gauge.borrow_mut();
            live.0 += 1;
            live.1 = live.1.max(live.0);
        }
        let gauge = gauge.clone();
        timer(ms(5), timer_handle.clone())
            .map(move |_| v * 2)
            .tap(move |_| gauge.borrow_mut().0 -= 1)
    };

    let recorder = Recorder::new();
    recorder.subscribe_to(&from_iter([1_u64, 2, 3]).expand(project, 2));
    scheduler.flush();

    let (_, peak) = *live.borrow();
    assert_with_log!(peak <= 2, "concurrent projections stay in budget", 2, peak);
    // Each seed doubles until it reaches 8: 1→2→4→8, 2→4→8, 3→6→12.
    let mut values = recorder.values();
    values.sort_unstable();
    assert_eq!(values, vec![1, 2, 2, 3, 4, 4, 6, 8, 8, 12]);
    assert!(recorder.completed());
    test_complete!("expand_breadth_is_bounded_by_the_concurrency_budget");
}

#[test]
fn expand_finishes_queued_work_after_the_source_completes() {
    init_test("expand_finishes_queued_work_after_the_source_completes");

    let (scheduler, handle) = virtual_clock();
    let timer_handle = handle.clone();
    // The source completes immediately; every projection fires later.
    let expanded = from_iter([1_u64]).expand(
        move |&v| {
            if v >= 4 {
                empty()
            } else {
                timer(ms(10), timer_handle.clone()).map(move |_| v + 1)
            }
        },
        1,
    );
    let recorder = Recorder::new();
    recorder.subscribe_to(&expanded);

    // In-flight projections survive the upstream terminal; completion
    // waits for the last of them.
    assert_eq!(recorder.values(), vec![1]);
    assert!(!recorder.completed());
    scheduler.flush();

    assert_eq!(recorder.values(), vec![1, 2, 3, 4]);
    assert!(recorder.completed());
    test_complete!("expand_finishes_queued_work_after_the_source_completes");
}

#[test]
fn merge_scan_threads_state_through_async_accumulators() {
    init_test("merge_scan_threads_state_through_async_accumulators");

    let (scheduler, handle) = virtual_clock();
    let timer_handle = handle.clone();
    let summed = from_iter([1_u64, 2, 3]).merge_scan(
        move |&acc, &v| timer(ms(5), timer_handle.clone()).map(move |_| acc + v),
        0,
        1,
    );
    let recorder = Recorder::new();
    recorder.subscribe_to(&summed);
    scheduler.flush();

    assert_eq!(recorder.values(), vec![1, 3, 6]);
    assert!(recorder.completed());
    test_complete!("merge_scan_threads_state_through_async_accumulators");
}

#[test]
fn window_toggle_routes_values_to_their_open_windows() {
    init_test("window_toggle_routes_values_to_their_open_windows");

    let (scheduler, handle) = virtual_clock();
    let source = scheduled_values(
        handle.clone(),
        vec![(5, 1), (15, 2), (25, 3), (35, 4)],
        Some(40),
    );
    // One window open over frames 10..30.
    let openings = scheduled_values(handle.clone(), vec![(10, ())], None);
    let closer_handle = handle.clone();

    let collected: Rc<RefCell<Vec<Recorder<i32>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = collected.clone();
    let windows = source.window_toggle(openings, move |_| timer(ms(20), closer_handle.clone()));
    let outer = Recorder::new();
    outer.subscribe_to(&windows.tap(move |window: &Observable<i32>| {
        let inner = Recorder::new();
        inner.subscribe_to(window);
        sink.borrow_mut().push(inner);
    }));
    scheduler.flush();

    let collected = collected.borrow();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].values(), vec![2, 3]);
    assert!(collected[0].completed());
    assert!(outer.completed());
    test_complete!("window_toggle_routes_values_to_their_open_windows");
}

#[test]
fn buffer_toggle_collects_overlapping_spans() {
    init_test("buffer_toggle_collects_overlapping_spans");

    let (scheduler, handle) = virtual_clock();
    let source = scheduled_values(
        handle.clone(),
        vec![(5, 'a'), (15, 'b'), (25, 'c')],
        Some(40),
    );
    // Buffers open at 0 and 10, each closing 20 later.
    let openings = scheduled_values(handle.clone(), vec![(0, 0_u32), (10, 1)], None);
    let closer_handle = handle.clone();
    let buffered =
        source.buffer_toggle(openings, move |_| timer(ms(20), closer_handle.clone()));
    let recorder = Recorder::new();
    recorder.subscribe_to(&buffered);
    scheduler.flush();

    assert_eq!(
        recorder.values(),
        vec![vec!['a', 'b'], vec!['b', 'c']]
    );
    assert!(recorder.completed());
    test_complete!("buffer_toggle_collects_overlapping_spans");
}

#[test]
fn operators_compose_across_a_chain() {
    init_test("operators_compose_across_a_chain");

    let recorder = Recorder::new();
    let chained = from_iter(1..=10)
        .filter(|v| v % 2 == 0)
        .map(|v| v * v)
        .scan(0, |acc, v| acc + v)
        .take(3);
    recorder.subscribe_to(&chained);

    assert_eq!(recorder.values(), vec![4, 20, 56]);
    assert!(recorder.completed());
    test_complete!("operators_compose_across_a_chain");
}

#[test]
fn element_at_picks_defaults_and_errors_consistently() {
    init_test("element_at_picks_defaults_and_errors_consistently");

    let found = Recorder::new();
    found.subscribe_to(&from_iter([10, 20, 30]).element_at(1, None));
    assert_eq!(found.values(), vec![20]);
    assert!(found.completed());

    let defaulted = Recorder::new();
    defaulted.subscribe_to(&from_iter([10]).element_at(5, Some(-1)));
    assert_eq!(defaulted.values(), vec![-1]);
    assert!(defaulted.completed());

    let out_of_range = Recorder::new();
    out_of_range.subscribe_to(&from_iter([10]).element_at(5, None));
    assert_eq!(
        out_of_range.error(),
        Some(StreamError::IndexOutOfRange { index: 5 })
    );
    test_complete!("element_at_picks_defaults_and_errors_consistently");
}
