//! `parufunc`: a thin, ergonomic facade over [`parufunc_core`], the
//! work-stealing dispatch engine for elementwise ("ufunc") kernels.
//!
//! This crate is intentionally small. It does not generate ufunc shells for
//! arbitrary kernel signatures, marshal array arguments, or allocate
//! arrays — those remain the job of a code-generation layer built on top of
//! `parufunc-core`, which treats them as an external collaborator. What it
//! adds is [`for_each_index`]: a safe entry point for the common case of
//! "run this Rust closure over every index in `0..n`", built by marshalling
//! the closure into the core's raw `ElementKernel` ABI.

mod item_closure;

use parufunc_core::{Dispatcher, DispatcherBuilder};
use std::ffi::c_void;
use std::mem::size_of;

/// Run `f(item)` for every `item` in `0..n`, distributed across
/// `num_threads` workers with work-stealing, via [`parufunc_core`].
///
/// `f` must be `Sync` because it may be called concurrently from any of the
/// worker threads (never from two threads on the same `item`, per the
/// dispatch core's coverage/no-double-execution guarantees).
///
/// # Panics
///
/// Propagates a panic raised by `f` back out of `for_each_index` on the
/// calling thread — unlike a raw [`parufunc_core::Dispatcher::dispatch`]
/// call, which aborts the process on any kernel panic, `for_each_index`
/// installs a panic handler that stashes the first payload it observes and
/// re-raises it here, since it knows `f` is a real Rust closure rather than
/// an opaque ABI kernel. A second, concurrent panic from another worker
/// still aborts the process, same as the underlying core — recovering from
/// more than one simultaneous panic is out of contract.
pub fn for_each_index<F>(n: usize, num_threads: usize, f: F)
where
    F: Fn(usize) + Sync,
{
    let first_panic: std::sync::Mutex<Option<parufunc_core::PanicPayload>> =
        std::sync::Mutex::new(None);

    let dispatcher: Dispatcher = DispatcherBuilder::new()
        .num_threads(num_threads.max(1))
        .panic_handler(|payload| {
            let mut slot = first_panic.lock().unwrap();
            if slot.is_none() {
                *slot = Some(payload);
            }
        })
        .build()
        .expect("parufunc: default thread backend should never fail to build");

    // `parufunc_core`'s ElementKernel ABI hands the kernel precomputed
    // element addresses, not the raw iteration index. To recover `item`
    // inside the kernel we give it one argument slot whose backing "array"
    // is the indices themselves: `indices[k] == k` for every `k`, so
    // `args[0] + item * steps[0]` always points at the `usize` value `item`.
    let indices: Vec<usize> = (0..n).collect();
    let kernel_env = item_closure::ItemClosureKernel { f: &f };

    let dimensions: [isize; 1] = [n as isize];
    let steps: [isize; 1] = [size_of::<usize>() as isize];
    let args: [*mut u8; 1] = [indices.as_ptr() as *mut u8];

    // SAFETY: `indices` has exactly `n` elements and lives until after
    // `dispatch` returns; `item_closure::call::<F>` only dereferences the
    // one element address it's handed and the `data` pointer, which points
    // at `kernel_env` for the duration of this call; it does not touch the
    // queue array, any context, or any other iteration's memory.
    unsafe {
        dispatcher.dispatch(
            item_closure::call::<F>,
            args.as_ptr(),
            dimensions.as_ptr(),
            steps.as_ptr(),
            1,
            (&kernel_env as *const item_closure::ItemClosureKernel<'_, F>) as *mut c_void,
        );
    }

    if let Some(payload) = first_panic.into_inner().unwrap() {
        std::panic::resume_unwind(payload);
    }
}
