//! A lightweight, opt-in event trace for the dispatch core.
//!
//! This mirrors `rayon_core`'s internal `log` module: a closed `Event`
//! enum plus a `Logger` that either drops events on the floor (the default,
//! zero-cost build) or writes them to stderr when the `internal-logs`
//! feature is enabled. It is not a general logging facade (no `log`/
//! `tracing` crate) because the events here are specific to one dispatch's
//! lifecycle and are only ever useful when debugging this crate itself.

use std::env;

#[derive(Debug)]
pub(crate) enum Event {
    /// A dispatch is about to partition `n` items across `num_threads` workers.
    DispatchStarted { n: isize, num_threads: usize },

    /// Initial ranges have been written into every queue.
    QueuesInitialized { num_threads: usize, chunk_size: isize },

    /// Worker `worker` is about to enter its main loop.
    WorkerStarted { worker: usize },

    /// Worker `worker` claimed `item` from its own queue (Phase A).
    ItemClaimed { worker: usize, item: isize },

    /// Worker `worker` stole `item` from `victim`'s queue (Phase B).
    ItemStolen { worker: usize, victim: usize, item: isize },

    /// Worker `worker` found every peer queue empty during a full scan.
    StealingQuiescent { worker: usize },

    /// Worker `worker` is returning from its main loop.
    WorkerFinished { worker: usize, completed: isize },

    /// The post-join audit succeeded.
    AuditOk { n: isize },

    /// The post-join audit failed; the process is about to abort.
    AuditFailed { expected: isize, actual: isize },

    /// Emitted once at the end of a thread's life so buffered output (if
    /// any) is not lost when the thread exits.
    Flush,
}

/// Records `Event`s for one dispatcher. Cheap to clone (an `Arc` around a
/// single flag) and cheap to call when logging is compiled out: `log`
/// becomes a no-op that does not even evaluate its closure argument.
#[derive(Clone)]
pub(crate) struct Logger {
    enabled: bool,
}

impl Logger {
    pub(crate) fn new() -> Self {
        let enabled = cfg!(feature = "internal-logs")
            && env::var_os("PARUFUNC_LOG").is_some();
        Logger { enabled }
    }

    #[inline]
    pub(crate) fn log(&self, event: impl FnOnce() -> Event) {
        if self.enabled {
            self.log_cold(event());
        }
    }

    #[cold]
    fn log_cold(&self, event: Event) {
        eprintln!("[parufunc] {:?}", event);
    }
}
