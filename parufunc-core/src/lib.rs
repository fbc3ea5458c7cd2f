//! Core APIs for parufunc: a parallel work-stealing dispatch engine for
//! elementwise ("ufunc") kernels.
//!
//! This crate is exactly the core: a thread dispatcher, a per-thread work
//! queue, and a work-stealing protocol that together guarantee every
//! iteration of a 1-dimensional elementwise loop runs exactly once across
//! all workers, with no race, no deadlock, and balanced progress under skew.
//!
//! Explicitly out of scope: the kernel body itself, kernel argument
//! marshalling for arbitrary signatures, code-generation of specialized
//! ufunc shells, array allocation, and platform thread-API wiring beyond
//! the abstract create/join contract. The sibling `parufunc` crate provides
//! one minimal, honest ergonomic entry point on top of this core; it is not
//! a code generator.

mod builder;
mod context;
mod dispatcher;
mod error;
mod log;
mod queue;
mod spawn;
mod unwind;
mod worker;

pub use builder::DispatcherBuilder;
pub use dispatcher::Dispatcher;
pub use error::DispatchBuildError;
pub use spawn::{DefaultSpawn, ThreadBuilder, ThreadSpawn};
pub use unwind::PanicPayload;

pub use context::MAX_ARGS;

/// The per-iteration kernel entry point.
///
/// `args` points to `num_args` already-offset element addresses (one per
/// kernel parameter slot, computed as `args[k] + item * steps[k]` by the
/// dispatch core before this is called); `data` is the opaque user pointer
/// passed to [`Dispatcher::dispatch`]. The kernel must not touch the queue
/// array, any worker's context, or any other iteration's memory, must
/// return, and must not unwind across this boundary.
pub type ElementKernel = unsafe extern "C" fn(args: *mut *mut u8, data: *mut std::ffi::c_void);
