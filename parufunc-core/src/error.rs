use std::fmt;
use std::io;

/// Error returned by [`DispatcherBuilder::build`](crate::DispatcherBuilder::build).
///
/// This is the *only* fallible surface in the public API. Once a
/// `Dispatcher` is built, [`Dispatcher::dispatch`](crate::Dispatcher::dispatch)
/// has no error return — a failure after that point (a spinlock invariant
/// violation, or a post-join audit mismatch) indicates memory corruption or
/// an engine bug and aborts the process instead.
#[derive(Debug)]
pub enum DispatchBuildError {
    /// The configured [`ThreadSpawn`](crate::ThreadSpawn) backend failed to
    /// start a worker thread. `DispatcherBuilder::build` probes the backend
    /// with one throwaway thread before returning a `Dispatcher`, so this is
    /// raised there rather than during a later `dispatch` call, where no
    /// queue has been touched yet and the failure is safely reportable
    /// instead of fatal.
    Io(io::Error),

    /// Reserved for a future global-singleton `Dispatcher` constructor,
    /// analogous to `rayon_core`'s `GlobalPoolAlreadyInitialized`. Unused by
    /// the per-call `DispatcherBuilder::build` in this crate today, but kept
    /// so the error taxonomy has a stable shape if that convenience
    /// constructor is added later.
    GlobalAlreadyInitialized,
}

impl fmt::Display for DispatchBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchBuildError::Io(err) => write!(f, "failed to spawn worker thread: {}", err),
            DispatchBuildError::GlobalAlreadyInitialized => {
                write!(f, "the global dispatcher has already been initialized")
            }
        }
    }
}

impl std::error::Error for DispatchBuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchBuildError::Io(err) => Some(err),
            DispatchBuildError::GlobalAlreadyInitialized => None,
        }
    }
}

impl From<io::Error> for DispatchBuildError {
    fn from(err: io::Error) -> Self {
        DispatchBuildError::Io(err)
    }
}
