//! Package up unwind-safety for worker threads.
//!
//! Worker main loops call into exactly one piece of foreign code: the
//! `ElementKernel` a caller hands to `Dispatcher::dispatch`. A kernel that
//! unwinds across that boundary is out of contract, so there is no
//! "catch it and report a `Result`" path back to the caller here — only a
//! best-effort chance to run a caller-supplied panic handler before
//! deciding whether to keep going or abort the process.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::thread;

/// Call `func`, catching any unwind so the caller can decide what to do
/// with it instead of letting it propagate. Mirrors `rayon_core`'s
/// `unwind::halt_unwinding`.
pub(crate) fn halt_unwinding<F, R>(func: F) -> thread::Result<R>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(func))
}

/// A guard that aborts the process on drop unless disarmed with
/// `mem::forget`. Used as a last-resort safety net around a worker's whole
/// body: every unwind `halt_unwinding` doesn't already turn into a handled
/// `Err` before the worker returns is a bug in this crate, and continuing
/// to run with a queue or context in an unknown state is worse than
/// aborting.
pub(crate) struct AbortIfPanic;

impl Drop for AbortIfPanic {
    fn drop(&mut self) {
        eprintln!("parufunc: detected unexpected panic in worker thread; aborting");
        process::abort();
    }
}

/// What a caller-supplied panic handler receives: whatever a kernel (or
/// other worker-thread code) panicked with. Re-exported at the crate root
/// since it appears in `DispatcherBuilder::panic_handler`'s public
/// signature.
pub type PanicPayload = Box<dyn Any + Send>;

/// Signature for a caller-supplied panic observer
/// (`DispatcherBuilder::panic_handler`). It is invoked with whatever a
/// kernel panicked with; once it returns, the worker treats that item as
/// completed and moves on instead of aborting, trusting the handler to have
/// taken responsibility for the payload (log it, stash it for a caller to
/// resume elsewhere, whatever it needs).
pub(crate) type PanicHandler = dyn Fn(PanicPayload) + Send + Sync;
