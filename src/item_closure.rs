//! Marshals a `Fn(usize) + Sync` closure into a `parufunc_core::ElementKernel`.
//!
//! `for_each_index` gives every iteration exactly one argument slot, backed
//! by an array where `indices[k] == k`; the dispatch core hands `call` the
//! already-offset address `&indices[item]`, so reading through it recovers
//! `item` without `call` needing to know anything about how the core
//! computed that address.

use std::ffi::c_void;

pub(crate) struct ItemClosureKernel<'a, F> {
    pub(crate) f: &'a F,
}

pub(crate) unsafe extern "C" fn call<F>(args: *mut *mut u8, data: *mut c_void)
where
    F: Fn(usize) + Sync,
{
    let item = *(*args as *const usize);
    let kernel = &*(data as *const ItemClosureKernel<'_, F>);
    (kernel.f)(item);
}
