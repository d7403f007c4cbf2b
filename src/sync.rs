#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::sync::{
        Arc, Condvar, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    };
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use std::sync::{
        Arc, Condvar, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    };
}

pub(crate) use imp::*;
use std::sync::PoisonError;

/// Lock `mutex`, recovering the guard if a previous holder panicked.
///
/// Every critical section in this crate leaves its state consistent before
/// returning, so a poisoned lock carries no torn data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
