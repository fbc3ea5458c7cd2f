//! Configuration surface for building a [`Dispatcher`], in the style of
//! `rayon::ThreadPoolBuilder`: a thread count that was once a compile-time
//! specialization constant baked into generated code becomes an ordinary
//! constructor parameter here, chosen once per `Dispatcher` rather than
//! once per build of the whole program.

use crate::dispatcher::Dispatcher;
use crate::error::DispatchBuildError;
use crate::log::Logger;
use crate::spawn::{DefaultSpawn, ThreadBuilder};
use crate::spawn::ThreadSpawn;
use crate::unwind::{PanicHandler, PanicPayload};
use std::sync::Mutex;

type ThreadNameHandler = dyn FnMut(usize) -> String + Send;

/// Builds a [`Dispatcher`]. Mirrors `rayon::ThreadPoolBuilder`'s shape:
/// chainable setters consumed by a terminal `build()` that either returns a
/// ready-to-use `Dispatcher` or a [`DispatchBuildError`].
pub struct DispatcherBuilder<S: ThreadSpawn = DefaultSpawn> {
    num_threads: Option<usize>,
    thread_name: Option<Box<ThreadNameHandler>>,
    stack_size: Option<usize>,
    panic_handler: Option<Box<PanicHandler>>,
    spawn_handler: S,
}

impl Default for DispatcherBuilder<DefaultSpawn> {
    fn default() -> Self {
        DispatcherBuilder::new()
    }
}

impl DispatcherBuilder<DefaultSpawn> {
    pub fn new() -> Self {
        DispatcherBuilder {
            num_threads: None,
            thread_name: None,
            stack_size: None,
            panic_handler: None,
            spawn_handler: DefaultSpawn,
        }
    }
}

impl<S: ThreadSpawn> DispatcherBuilder<S> {
    /// The number of workers this dispatcher's pool will use. Not calling
    /// this defaults to the number of logical CPUs, via `num_cpus`, the same
    /// default `rayon`'s builder falls back to.
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    pub fn thread_name<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize) -> String + Send + 'static,
    {
        self.thread_name = Some(Box::new(f));
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Lets a kernel panic be observed instead of silently aborting the
    /// process: without a handler installed, a kernel panic still aborts,
    /// since there is nothing else that could report it. With a handler
    /// installed, the worker hands it the panic payload and carries on to
    /// the next item instead of aborting, trusting the handler to take
    /// responsibility for what happens to that payload.
    pub fn panic_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(PanicPayload) + Send + Sync + 'static,
    {
        self.panic_handler = Some(Box::new(f));
        self
    }

    /// Swap in a custom [`ThreadSpawn`] backend, e.g. an instrumented
    /// spawner for tests.
    pub fn spawn_handler<S2: ThreadSpawn>(self, spawn_handler: S2) -> DispatcherBuilder<S2> {
        DispatcherBuilder {
            num_threads: self.num_threads,
            thread_name: self.thread_name,
            stack_size: self.stack_size,
            panic_handler: self.panic_handler,
            spawn_handler,
        }
    }

    pub fn build(self) -> Result<Dispatcher<S>, DispatchBuildError> {
        let thread_count = self.num_threads.unwrap_or_else(num_cpus::get).max(1);
        let mut spawn_handler = self.spawn_handler;
        probe_spawn_handler(&mut spawn_handler, self.stack_size)?;
        Ok(Dispatcher {
            thread_count,
            thread_name: Mutex::new(self.thread_name),
            stack_size: self.stack_size,
            panic_handler: self.panic_handler,
            spawn_handler: Mutex::new(spawn_handler),
            logger: Logger::new(),
        })
    }
}

/// Spawns and immediately joins one throwaway thread through
/// `spawn_handler` before a `Dispatcher` is handed back to the caller. A
/// backend that can't start threads at all should fail here, where it's
/// reportable, rather than on the first real `dispatch` call, where a
/// partial thread-create failure can only be treated as fatal because the
/// workqueue-to-worker mapping would already be broken.
fn probe_spawn_handler<S: ThreadSpawn>(
    spawn_handler: &mut S,
    stack_size: Option<usize>,
) -> Result<(), DispatchBuildError> {
    std::thread::scope(|scope| {
        let work: Box<dyn FnOnce() + Send> = Box::new(|| {});
        let builder = ThreadBuilder::new(scope, 0, None, stack_size, work);
        spawn_handler.spawn(builder).map_err(DispatchBuildError::Io)
    })
}
