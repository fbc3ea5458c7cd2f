//! The dispatcher: partitions `[0, N)` across workers, spawns them, joins
//! them, and audits the result.

use crate::context::{SharedContext, WorkerContext, MAX_ARGS};
use crate::log::{Event, Logger};
use crate::queue::{unreachable_invariant, WorkQueue};
use crate::spawn::{ThreadBuilder, ThreadSpawn};
use crate::unwind::PanicHandler;
use crate::{worker, ElementKernel};
use crossbeam_utils::CachePadded;
use std::ffi::c_void;
use std::sync::Mutex;

type ThreadNameHandler = dyn FnMut(usize) -> String + Send;

/// A configured dispatch engine for one `ThreadCount`. Build one with
/// [`DispatcherBuilder`](crate::DispatcherBuilder); a single `Dispatcher`
/// can issue any number of [`dispatch`](Dispatcher::dispatch) calls
/// sequentially or from multiple caller threads (each call partitions and
/// joins its own fresh set of worker threads, so dispatches don't share any
/// mutable state beyond the spawn backend itself, which is internally
/// synchronized).
pub struct Dispatcher<S: ThreadSpawn = crate::spawn::DefaultSpawn> {
    pub(crate) thread_count: usize,
    pub(crate) thread_name: Mutex<Option<Box<ThreadNameHandler>>>,
    pub(crate) stack_size: Option<usize>,
    pub(crate) panic_handler: Option<Box<PanicHandler>>,
    pub(crate) spawn_handler: Mutex<S>,
    pub(crate) logger: Logger,
}

/// Given `N` and the configured thread count, compute the chunk size and
/// effective worker count. Split out as a pure function so the partitioning
/// math can be property-tested independently of thread spawning.
pub(crate) fn chunking(n: isize, thread_count: usize) -> (isize, usize) {
    debug_assert!(n >= 0);
    let thread_count = thread_count as isize;
    let chunk_size = n / thread_count;
    if chunk_size == 0 {
        (1, n as usize)
    } else {
        (chunk_size, thread_count as usize)
    }
}

/// Build the initial `[next, last)` ranges for every worker, with the last
/// worker absorbing the remainder. Slots at index `>= num_thread` (when
/// `num_thread < thread_count`) are filled with empty queues that no worker
/// will ever look at.
///
/// Each queue is `CachePadded` so two workers spinning on adjacent queues
/// don't false-share a cache line.
pub(crate) fn build_queues(n: isize, thread_count: usize) -> (Vec<CachePadded<WorkQueue>>, usize) {
    let (chunk_size, num_thread) = chunking(n, thread_count);

    let mut queues = Vec::with_capacity(thread_count);
    for i in 0..num_thread {
        let i = i as isize;
        queues.push(CachePadded::new(WorkQueue::new(i * chunk_size, (i + 1) * chunk_size)));
    }
    for _ in num_thread..thread_count {
        queues.push(CachePadded::new(WorkQueue::empty()));
    }

    if num_thread > 0 {
        // Overwrite the last worker's upper bound with N so any remainder
        // from integer division falls to it.
        queues[num_thread - 1] = CachePadded::new(WorkQueue::new(
            (num_thread as isize - 1) * chunk_size,
            n,
        ));
    }

    (queues, num_thread)
}

impl<S: ThreadSpawn> Dispatcher<S> {
    /// Execute `func` for every `item` in `[0, dimensions[0])`, distributing
    /// the range across this dispatcher's worker pool with work-stealing.
    /// Returns once every iteration has completed.
    ///
    /// # Safety
    ///
    /// - `args` and `steps` must each point to at least `num_args` valid
    ///   entries.
    /// - `num_args` must be `<= MAX_ARGS`.
    /// - `dimensions` must point to at least one valid `isize`, and
    ///   `dimensions[0] >= 0`.
    /// - For every `k < num_args` and every `item` in `[0, dimensions[0])`,
    ///   `args[k] + item * steps[k]` must be a valid, exclusively-owned
    ///   (for the duration of that single call) pointer for `func` to
    ///   dereference.
    /// - `func` must not touch the queue array, any worker's context, or
    ///   any other iteration's memory, and must not unwind across the FFI
    ///   boundary.
    pub unsafe fn dispatch(
        &self,
        func: ElementKernel,
        args: *const *mut u8,
        dimensions: *const isize,
        steps: *const isize,
        num_args: usize,
        data: *mut c_void,
    ) {
        assert!(
            num_args <= MAX_ARGS,
            "parufunc: dispatch called with {} args, MAX_ARGS is {}",
            num_args,
            MAX_ARGS
        );

        let n = *dimensions;
        self.logger.log(|| Event::DispatchStarted {
            n,
            num_threads: self.thread_count,
        });

        let (queues, num_thread) = build_queues(n, self.thread_count);
        self.logger.log(|| Event::QueuesInitialized {
            num_threads: num_thread,
            chunk_size: chunking(n, self.thread_count).0,
        });

        let shared = SharedContext {
            func,
            args,
            steps,
            num_args,
            data,
            queues: queues.as_ptr(),
            num_thread,
        };

        if num_thread == 0 {
            debug_assert_eq!(n, 0);
            self.audit(&[], n);
            return;
        }

        let mut contexts: Vec<WorkerContext<'_>> = (0..num_thread)
            .map(|id| WorkerContext::new(&shared, id))
            .collect();

        std::thread::scope(|scope| {
            let mut spawn_handler = self.spawn_handler.lock().unwrap();
            let mut thread_name = self.thread_name.lock().unwrap();

            // Each worker needs exclusive access to its own `WorkerContext`
            // for the scope's duration. `split_at_mut`-by-one in a loop
            // hands out disjoint `&mut WorkerContext` without unsafe
            // aliasing, since `contexts` itself lives on this stack frame
            // for the scope's lifetime.
            let mut remaining: &mut [WorkerContext<'_>] = &mut contexts;
            let mut spawned = 0usize;
            for index in 0..num_thread {
                let (ctx, rest) = remaining.split_first_mut().unwrap();
                remaining = rest;
                let logger = self.logger.clone();
                let name = thread_name.as_mut().map(|f| f(index));
                let panic_handler = self.panic_handler.as_deref();
                let work: Box<dyn FnOnce() + Send + '_> = Box::new(move || {
                    worker::run(ctx, &logger, panic_handler);
                });
                let builder = ThreadBuilder::new(scope, index, name, self.stack_size, work);
                match spawn_handler.spawn(builder) {
                    Ok(()) => spawned += 1,
                    Err(_) => break,
                }
            }

            if spawned != num_thread {
                // A partial thread-create failure means the
                // workqueue-to-worker mapping is broken; we must not let
                // the scope join whatever subset did start and then
                // silently return with unclaimed work. Abort before the
                // scope's implicit join so we don't wait forever on
                // threads that were never told to run anything.
                unreachable_invariant(
                    "Dispatcher::dispatch: fewer than num_thread worker threads could be started",
                );
            }
        });

        self.audit(&contexts, n);
    }

    fn audit(&self, contexts: &[WorkerContext<'_>], n: isize) {
        let total: isize = contexts.iter().map(|c| c.completed).sum();
        if total == n {
            self.logger.log(|| Event::AuditOk { n });
        } else {
            self.logger.log(|| Event::AuditFailed {
                expected: n,
                actual: total,
            });
            unreachable_invariant("post-join completed-sum != N");
        }
    }
}

impl<S: ThreadSpawn> Dispatcher<S> {
    pub fn num_threads(&self) -> usize {
        self.thread_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_matches_spec_examples() {
        // S4: ThreadCount=4, N=16 -> ChunkSize=4, num_thread=4.
        assert_eq!(chunking(16, 4), (4, 4));
        // S5: ThreadCount=4, N=17 -> ChunkSize=4, num_thread=4 (remainder absorbed by last).
        assert_eq!(chunking(17, 4), (4, 4));
        // S3: ThreadCount=4, N=3 -> ChunkSize becomes 1, num_thread=3.
        assert_eq!(chunking(3, 4), (1, 3));
        // S2: ThreadCount=4, N=1 -> ChunkSize becomes 1, num_thread=1.
        assert_eq!(chunking(1, 4), (1, 1));
        // S1: ThreadCount=4, N=0 -> ChunkSize 0 collapses to num_thread=0.
        assert_eq!(chunking(0, 4), (1, 0));
    }

    #[test]
    fn build_queues_s4_ranges() {
        let (queues, num_thread) = build_queues(16, 4);
        assert_eq!(num_thread, 4);
        let mut ranges = Vec::new();
        for q in &queues {
            let mut items = Vec::new();
            while let Some(x) = q.claim_own() {
                items.push(x);
            }
            ranges.push(items);
        }
        assert_eq!(ranges[0], vec![0, 1, 2, 3]);
        assert_eq!(ranges[1], vec![4, 5, 6, 7]);
        assert_eq!(ranges[2], vec![8, 9, 10, 11]);
        assert_eq!(ranges[3], vec![12, 13, 14, 15]);
    }

    #[test]
    fn build_queues_s5_last_worker_absorbs_remainder() {
        let (queues, num_thread) = build_queues(17, 4);
        assert_eq!(num_thread, 4);
        let mut counts = Vec::new();
        for q in &queues {
            let mut n = 0;
            while q.claim_own().is_some() {
                n += 1;
            }
            counts.push(n);
        }
        assert_eq!(counts, vec![4, 4, 4, 5]);
    }

    #[test]
    fn build_queues_small_n_one_item_per_worker() {
        // S3: ThreadCount=4, N=3.
        let (queues, num_thread) = build_queues(3, 4);
        assert_eq!(num_thread, 3);
        for (i, q) in queues[..num_thread].iter().enumerate() {
            assert_eq!(q.claim_own(), Some(i as isize));
            assert_eq!(q.claim_own(), None);
        }
    }

    #[test]
    fn build_queues_zero_n_has_no_workers() {
        let (queues, num_thread) = build_queues(0, 4);
        assert_eq!(num_thread, 0);
        assert_eq!(queues.len(), 4);
        for q in &queues {
            assert_eq!(q.claim_own(), None);
        }
    }
}
