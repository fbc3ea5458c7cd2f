//! An abstract thread-backend contract: "create" and "join" operations
//! equivalent to starting a thread running `entry(arg)` and blocking until
//! it exits. `ThreadSpawn` is the pluggable seam; `DefaultSpawn` is the
//! reference backend built on `std::thread`'s scoped threads, mirroring
//! `rayon_core::registry::{ThreadSpawn, DefaultSpawn, ThreadBuilder}`
//! closely enough to keep the same names and shape.

use std::io;
use std::thread::Scope;

/// One worker's spawn parameters, handed to a `ThreadSpawn` implementation.
///
/// Unlike `rayon_core`'s `ThreadBuilder` (which wraps a `Worker<JobRef>` deque
/// half and a `Registry` handle because rayon's workers pull jobs from a
/// shared registry), this crate's worker body is a plain `FnOnce` closure —
/// the dispatcher already captured everything a worker needs (its
/// `WorkerContext` and a `&SharedContext`) by the time it builds one of
/// these.
pub struct ThreadBuilder<'scope, 'env: 'scope> {
    name: Option<String>,
    stack_size: Option<usize>,
    index: usize,
    scope: &'scope Scope<'scope, 'env>,
    work: Box<dyn FnOnce() + Send + 'scope>,
}

impl<'scope, 'env> ThreadBuilder<'scope, 'env> {
    pub(crate) fn new(
        scope: &'scope Scope<'scope, 'env>,
        index: usize,
        name: Option<String>,
        stack_size: Option<usize>,
        work: Box<dyn FnOnce() + Send + 'scope>,
    ) -> Self {
        ThreadBuilder {
            name,
            stack_size,
            index,
            scope,
            work,
        }
    }

    /// The index of this thread in the pool, within `0..num_thread`.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn stack_size(&self) -> Option<usize> {
        self.stack_size
    }

    /// Runs this worker's body on the calling (spawned) thread. A
    /// `ThreadSpawn` implementation calls this from inside the closure it
    /// hands to whatever thread-creation primitive it wraps.
    pub fn run(self) {
        (self.work)()
    }
}

/// Generalized trait for starting a thread in a `Dispatcher`.
///
/// This is the Rust realization of an abstract
/// `create(out handle, attr, entry, arg) -> status`; `join` is realized by
/// `thread::scope`'s implicit join when the scope exits, so this trait only
/// needs to cover creation.
pub trait ThreadSpawn: Default {
    /// Spawn a thread that runs `thread.run()`, scoped to `thread`'s scope.
    fn spawn<'scope, 'env>(&mut self, thread: ThreadBuilder<'scope, 'env>) -> io::Result<()>;
}

/// Spawns threads the ordinary way, via `std::thread::Builder::spawn_scoped`.
#[derive(Debug, Default)]
pub struct DefaultSpawn;

impl ThreadSpawn for DefaultSpawn {
    fn spawn<'scope, 'env>(&mut self, thread: ThreadBuilder<'scope, 'env>) -> io::Result<()> {
        let mut builder = std::thread::Builder::new();
        if let Some(name) = thread.name() {
            builder = builder.name(name.to_owned());
        }
        if let Some(stack_size) = thread.stack_size() {
            builder = builder.stack_size(stack_size);
        }
        let scope = thread.scope;
        builder.spawn_scoped(scope, move || thread.run())?;
        Ok(())
    }
}
