//! End-to-end scenarios against the public `Dispatcher` API, covering the
//! partitioning examples and the coverage/no-double-execution properties.

use parufunc_core::DispatcherBuilder;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Runs `n` "iterations" through a real `Dispatcher::dispatch` call, using a
/// kernel that just bumps a per-index counter, and returns those counters.
fn run(n: isize, num_threads: usize) -> Vec<usize> {
    let counts: Vec<AtomicUsize> = (0..n.max(0)).map(|_| AtomicUsize::new(0)).collect();

    unsafe extern "C" fn bump(args: *mut *mut u8, _data: *mut c_void) {
        let counter = &*(*args as *const AtomicUsize);
        counter.fetch_add(1, Ordering::SeqCst);
    }

    let dispatcher = DispatcherBuilder::new()
        .num_threads(num_threads)
        .build()
        .unwrap();

    let dimensions: [isize; 1] = [n];
    let steps: [isize; 1] = [std::mem::size_of::<AtomicUsize>() as isize];
    let args: [*mut u8; 1] = [counts.as_ptr() as *mut u8];

    unsafe {
        dispatcher.dispatch(bump, args.as_ptr(), dimensions.as_ptr(), steps.as_ptr(), 1, std::ptr::null_mut());
    }

    counts.into_iter().map(|c| c.into_inner()).collect()
}

#[test]
fn s1_zero_length_dispatches_no_work() {
    let counts = run(0, 4);
    assert!(counts.is_empty());
}

#[test]
fn s2_single_item_runs_exactly_once() {
    let counts = run(1, 4);
    assert_eq!(counts, vec![1]);
}

#[test]
fn s3_fewer_items_than_threads_each_runs_once() {
    let counts = run(3, 4);
    assert_eq!(counts, vec![1, 1, 1]);
}

#[test]
fn s4_evenly_divisible_load_runs_every_item_once() {
    let counts = run(16, 4);
    assert_eq!(counts, vec![1; 16]);
}

#[test]
fn s5_remainder_absorbed_by_last_worker_still_covers_everything() {
    let counts = run(17, 4);
    assert_eq!(counts, vec![1; 17]);
}

#[test]
fn single_threaded_dispatch_covers_everything() {
    let counts = run(250, 1);
    assert_eq!(counts, vec![1; 250]);
}

#[test]
fn many_more_threads_than_items_still_covers_everything() {
    let counts = run(5, 64);
    assert_eq!(counts, vec![1; 5]);
}

#[test]
fn large_n_with_skewed_work_has_full_coverage_and_no_double_execution() {
    // S6-style load imbalance smoke test: early items do a little spin work
    // so later queues are more likely to get stolen from, without making
    // the test slow or flaky.
    const N: isize = 4000;
    let counts: Vec<AtomicUsize> = (0..N).map(|_| AtomicUsize::new(0)).collect();

    unsafe extern "C" fn bump_with_skew(args: *mut *mut u8, _data: *mut c_void) {
        let counter = &*(*args as *const AtomicUsize);
        if counter as *const _ as usize % 7 == 0 {
            std::thread::yield_now();
        }
        counter.fetch_add(1, Ordering::SeqCst);
    }

    let dispatcher = DispatcherBuilder::new().num_threads(8).build().unwrap();
    let dimensions: [isize; 1] = [N];
    let steps: [isize; 1] = [std::mem::size_of::<AtomicUsize>() as isize];
    let args: [*mut u8; 1] = [counts.as_ptr() as *mut u8];

    unsafe {
        dispatcher.dispatch(
            bump_with_skew,
            args.as_ptr(),
            dimensions.as_ptr(),
            steps.as_ptr(),
            1,
            std::ptr::null_mut(),
        );
    }

    assert!(counts.iter().all(|c| c.load(Ordering::SeqCst) == 1));
}

#[test]
fn dispatcher_can_be_reused_across_multiple_dispatch_calls() {
    let dispatcher = DispatcherBuilder::new().num_threads(4).build().unwrap();

    for n in [0isize, 1, 3, 16, 17, 100] {
        let counts: Vec<AtomicUsize> = (0..n.max(0)).map(|_| AtomicUsize::new(0)).collect();

        unsafe extern "C" fn bump(args: *mut *mut u8, _data: *mut c_void) {
            let counter = &*(*args as *const AtomicUsize);
            counter.fetch_add(1, Ordering::SeqCst);
        }

        let dimensions: [isize; 1] = [n];
        let steps: [isize; 1] = [std::mem::size_of::<AtomicUsize>() as isize];
        let args: [*mut u8; 1] = [counts.as_ptr() as *mut u8];
        unsafe {
            dispatcher.dispatch(bump, args.as_ptr(), dimensions.as_ptr(), steps.as_ptr(), 1, std::ptr::null_mut());
        }
        assert!(counts.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }
}
