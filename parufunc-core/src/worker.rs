//! The worker routine: drain-own-queue, then work-steal until quiescent.

use crate::context::{SharedContext, WorkerContext, MAX_ARGS};
use crate::log::{Event, Logger};
use crate::unwind::{self, AbortIfPanic, PanicHandler};
use std::process;

/// Run one worker to completion: Phase A (drain `context.id`'s own queue in
/// ascending order) followed by Phase B (steal from peers, ascending peer
/// id, one item per peer per scan, until a full scan steals nothing).
///
/// This is a free function rather than a method so that `Dispatcher::dispatch`
/// can call it directly inside a `thread::scope` closure without needing
/// `WorkerContext` to be `'static`.
pub(crate) fn run(
    context: &mut WorkerContext<'_>,
    logger: &Logger,
    panic_handler: Option<&PanicHandler>,
) {
    let guard = AbortIfPanic;

    let tid = context.id;
    logger.log(|| Event::WorkerStarted { worker: tid });

    drain_own_queue(context, logger, panic_handler);
    steal_until_quiescent(context, logger, panic_handler);

    logger.log(|| Event::WorkerFinished {
        worker: tid,
        completed: context.completed,
    });

    // Normal return: do not abort on drop.
    std::mem::forget(guard);
}

fn drain_own_queue(
    context: &mut WorkerContext<'_>,
    logger: &Logger,
    panic_handler: Option<&PanicHandler>,
) {
    let tid = context.id;
    let queue = context.shared.queue(tid);
    while let Some(item) = queue.claim_own() {
        logger.log(|| Event::ItemClaimed { worker: tid, item });
        invoke_kernel(context.shared, item, tid, panic_handler);
        context.completed += 1;
    }
}

fn steal_until_quiescent(
    context: &mut WorkerContext<'_>,
    logger: &Logger,
    panic_handler: Option<&PanicHandler>,
) {
    let tid = context.id;
    let num_thread = context.shared.num_thread;

    let mut steal_continue = true;
    while steal_continue {
        steal_continue = false;
        for victim in 0..num_thread {
            if victim == tid {
                continue;
            }
            let queue = context.shared.queue(victim);
            if let Some(item) = queue.steal_one() {
                logger.log(|| Event::ItemStolen {
                    worker: tid,
                    victim,
                    item,
                });
                invoke_kernel(context.shared, item, tid, panic_handler);
                context.completed += 1;
                steal_continue = true;
            }
        }
        if !steal_continue {
            logger.log(|| Event::StealingQuiescent { worker: tid });
        }
    }
}

/// Calls `do_work`, catching any unwind at the FFI boundary. A kernel that
/// panics is out of contract: with no `panic_handler` installed there is no
/// way to report it, so the process aborts. When a `panic_handler` is
/// installed, it is trusted to take responsibility for the payload (log it,
/// stash it for a caller to resume on another thread, whatever it needs) —
/// this item still counts as completed, since it was claimed exactly once
/// and `do_work` ran to the point of the panic, and the worker carries on to
/// the next item rather than aborting underneath a handler that was asked
/// to handle exactly this.
fn invoke_kernel(
    shared: &SharedContext,
    item: isize,
    tid: usize,
    panic_handler: Option<&PanicHandler>,
) {
    // SAFETY: `item` was claimed exclusively by the caller and is in
    // `[0, N)`; `do_work`'s contract is documented on the function.
    let result = unwind::halt_unwinding(|| unsafe { do_work(shared, item, tid) });
    if let Err(payload) = result {
        match panic_handler {
            Some(handler) => handler(payload),
            None => {
                eprintln!(
                    "parufunc: kernel panicked at item {} with no panic handler installed; aborting",
                    item
                );
                process::abort();
            }
        }
    }
}

/// Forms each kernel slot's element address and invokes the kernel.
/// `shared.num_args` must be `<= MAX_ARGS` (enforced by
/// `Dispatcher::dispatch`'s precondition) so the per-item addresses fit in a
/// stack buffer without allocating.
///
/// # Safety
///
/// `shared.args`/`shared.steps` must each point to at least
/// `shared.num_args` valid entries, `item` must be a valid element index
/// for every slot, and `shared.func` must not touch the queue array, any
/// context, or any other iteration's memory.
unsafe fn do_work(shared: &SharedContext, item: isize, _tid: usize) {
    debug_assert!(shared.num_args <= MAX_ARGS);
    let mut elem_ptrs: [*mut u8; MAX_ARGS] = [std::ptr::null_mut(); MAX_ARGS];
    for k in 0..shared.num_args {
        let base = *shared.args.add(k);
        let step = *shared.steps.add(k);
        elem_ptrs[k] = base.offset(item * step);
    }
    (shared.func)(elem_ptrs.as_mut_ptr(), shared.data);
}
