//! `SharedContext` and `WorkerContext`, the thread-shared and per-worker
//! records a dispatch passes to its workers.

use crate::queue::WorkQueue;
use crate::ElementKernel;
use crossbeam_utils::CachePadded;
use std::ffi::c_void;

/// Maximum number of kernel argument slots a single `dispatch` call can
/// carry. Each kernel parameter slot needs an `args[k]`/`steps[k]` pair to
/// compute its per-item element address; marshalling those into a small
/// stack buffer instead of allocating means an arity bound has to be
/// chosen — 8 comfortably covers every numpy ufunc signature in practice
/// (the busiest built-ins take at most 3 inputs and 2 outputs) without
/// reaching for a heap `Vec` on the hot path. See DESIGN.md for the Open
/// Question this resolves.
pub const MAX_ARGS: usize = 8;

/// Thread-shared, immutable-after-init descriptor.
///
/// Every field is written once by the `Dispatcher` before any worker starts
/// and is read-only for the remainder of the dispatch; scoped-thread
/// creation is the happens-before edge that makes those writes visible to
/// every worker.
pub(crate) struct SharedContext {
    pub(crate) func: ElementKernel,
    pub(crate) args: *const *mut u8,
    pub(crate) steps: *const isize,
    pub(crate) num_args: usize,
    pub(crate) data: *mut c_void,
    pub(crate) queues: *const CachePadded<WorkQueue>,
    pub(crate) num_thread: usize,
}

// SAFETY: `SharedContext` is only ever shared as `&SharedContext` across the
// scoped-thread boundary, and every field is read-only for the dispatch's
// duration; the pointee data it points to (args/steps/queues) outlives the
// scope by construction of `Dispatcher::dispatch`.
unsafe impl Sync for SharedContext {}

impl SharedContext {
    #[inline]
    pub(crate) fn queue(&self, worker: usize) -> &WorkQueue {
        debug_assert!(worker < self.num_thread);
        // SAFETY: `queues` points to an array of at least `num_thread`
        // entries for the lifetime of the dispatch (`Dispatcher::dispatch`
        // owns that array on its stack frame for the scope's duration).
        unsafe { &**self.queues.add(worker) }
    }
}

/// Per-worker mutable record.
///
/// `completed` is written only by the owning worker and read only by the
/// `Dispatcher` after every worker has been joined — single-writer,
/// single-reader, so no atomics or interior mutability are needed.
pub(crate) struct WorkerContext<'a> {
    pub(crate) shared: &'a SharedContext,
    pub(crate) id: usize,
    pub(crate) completed: isize,
}

impl<'a> WorkerContext<'a> {
    pub(crate) fn new(shared: &'a SharedContext, id: usize) -> Self {
        WorkerContext {
            shared,
            id,
            completed: 0,
        }
    }
}
