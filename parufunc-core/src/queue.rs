//! The per-worker double-ended work queue.
//!
//! A `WorkQueue` is a half-open range `[next, last)` of iteration indices,
//! guarded by a single binary spinlock. The owner claims from the bottom
//! (`next`, ascending); thieves claim from the top (`last`, descending).
//! Both operations happen under the same lock, which is the entire
//! synchronization story: a single coarse-grained lock per queue, not a
//! lock-free deque, keeps both ends' invariants trivial to check by
//! inspection rather than by reasoning about a full Chase-Lev protocol.

use crossbeam_utils::Backoff;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};

const UNLOCKED: u8 = 0;
const LOCKED: u8 = 1;

/// One worker's range of unclaimed iteration indices.
///
/// `next` and `last` live behind `UnsafeCell`, not because they need
/// interior mutability for ergonomics, but because every worker holds only
/// a shared `&WorkQueue` to its own and its peers' queues — the mutual
/// exclusion is provided entirely by `lock`, hand-rolled exactly like the
/// original's `atomic_cmpxchg`-based `Lock`/`Unlock` pair. Every access to
/// `next`/`last` happens while `lock` is held, so ordinary loads/stores
/// synchronized by the lock's acquire/release edge are sufficient — neither
/// field needs its own atomic type.
#[repr(C)]
pub(crate) struct WorkQueue {
    lock: AtomicU8,
    next: UnsafeCell<isize>,
    last: UnsafeCell<isize>,
}

// SAFETY: all access to `next`/`last` is mediated by `lock`, which gives
// the same exclusion a `Mutex<(isize, isize)>` would, just without the
// parking/poisoning machinery this hot path doesn't need.
unsafe impl Sync for WorkQueue {}

impl WorkQueue {
    /// A queue with no work in it. Used to fill slots beyond `num_thread`
    /// when fewer workers than the configured thread count are needed —
    /// such a queue is valid but never observed by a worker.
    pub(crate) fn empty() -> Self {
        WorkQueue::new(0, 0)
    }

    pub(crate) fn new(next: isize, last: isize) -> Self {
        debug_assert!(next <= last);
        WorkQueue {
            lock: AtomicU8::new(UNLOCKED),
            next: UnsafeCell::new(next),
            last: UnsafeCell::new(last),
        }
    }

    /// Spin until `lock` transitions 0 -> 1 with acquire ordering.
    #[inline]
    fn acquire(&self) {
        let backoff = Backoff::new();
        while self
            .lock
            .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            backoff.spin();
        }
    }

    /// Transition `lock` 1 -> 0 with release ordering. A prior value other
    /// than `1` means some other party unlocked (or this is a double
    /// unlock) — both are memory corruption by construction, so abort
    /// immediately rather than continue with an inconsistent queue.
    #[inline]
    fn release(&self) {
        let prev = self.lock.swap(UNLOCKED, Ordering::Release);
        if prev != LOCKED {
            unreachable_invariant("WorkQueue::unlock observed lock not held");
        }
    }

    /// Owner-side claim: take the next ascending index if any remain.
    /// Returns `None` once `next >= last`.
    #[inline]
    pub(crate) fn claim_own(&self) -> Option<isize> {
        self.acquire();
        // SAFETY: `lock` is held.
        let (item, last) = unsafe { (*self.next.get(), *self.last.get()) };
        if item < last {
            unsafe {
                *self.next.get() = item + 1;
            }
        }
        self.release();
        if item < last {
            Some(item)
        } else {
            None
        }
    }

    /// Thief-side claim: take the top-most descending index if the peer
    /// has any work left.
    #[inline]
    pub(crate) fn steal_one(&self) -> Option<isize> {
        self.acquire();
        // SAFETY: `lock` is held.
        let has_work = unsafe { *self.next.get() < *self.last.get() };
        let item = if has_work {
            unsafe {
                *self.last.get() -= 1;
                Some(*self.last.get())
            }
        } else {
            None
        };
        self.release();
        item
    }
}

#[cold]
pub(crate) fn unreachable_invariant(msg: &str) -> ! {
    #[cfg(feature = "internal-logs")]
    eprintln!("[parufunc] invariant violation: {}", msg);
    #[cfg(not(feature = "internal-logs"))]
    let _ = msg;
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_yields_nothing() {
        let q = WorkQueue::empty();
        assert_eq!(q.claim_own(), None);
        assert_eq!(q.steal_one(), None);
    }

    #[test]
    fn owner_claims_ascending() {
        let q = WorkQueue::new(0, 3);
        assert_eq!(q.claim_own(), Some(0));
        assert_eq!(q.claim_own(), Some(1));
        assert_eq!(q.claim_own(), Some(2));
        assert_eq!(q.claim_own(), None);
    }

    #[test]
    fn thief_claims_descending() {
        let q = WorkQueue::new(0, 3);
        assert_eq!(q.steal_one(), Some(2));
        assert_eq!(q.steal_one(), Some(1));
        assert_eq!(q.steal_one(), Some(0));
        assert_eq!(q.steal_one(), None);
    }

    #[test]
    fn owner_and_thief_meet_in_the_middle_without_overlap() {
        let q = WorkQueue::new(0, 10);
        let mut seen = Vec::new();
        loop {
            let mut progressed = false;
            if let Some(i) = q.claim_own() {
                seen.push(i);
                progressed = true;
            }
            if let Some(i) = q.steal_one() {
                seen.push(i);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_owner_and_thieves_claim_every_index_exactly_once() {
        use std::sync::atomic::AtomicUsize;
        use std::thread;

        const N: isize = 2000;
        let q = WorkQueue::new(0, N);
        let seen: Vec<AtomicUsize> = (0..N).map(|_| AtomicUsize::new(0)).collect();

        thread::scope(|scope| {
            scope.spawn(|| {
                while let Some(item) = q.claim_own() {
                    seen[item as usize].fetch_add(1, Ordering::SeqCst);
                }
            });
            for _ in 0..7 {
                scope.spawn(|| {
                    while let Some(item) = q.steal_one() {
                        seen[item as usize].fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert!(seen.iter().all(|c| c.load(Ordering::SeqCst) <= 1));
        let total: usize = seen.iter().map(|c| c.load(Ordering::SeqCst)).sum();
        assert_eq!(total, N as usize);
    }
}
