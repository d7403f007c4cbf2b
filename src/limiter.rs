use crate::{signal::Parker, sync::Arc};
use core::num::NonZeroUsize;
use derive_more::Debug;
use std::collections::VecDeque;

/// Counting semaphore state for admission slots.
///
/// Not synchronized on its own: it lives inside the barrier's lock next to
/// the dependency registry, and blocking happens on the parked waiters after
/// that lock is released.
#[derive(Debug)]
pub(crate) struct AdmissionLimiter {
    capacity: usize,
    available: usize,
    /// Callers blocked in `acquire`, woken one per released slot.
    #[debug(skip)]
    waiting: VecDeque<Arc<Parker>>,
}

impl AdmissionLimiter {
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity: capacity.get(),
            available: capacity.get(),
            waiting: VecDeque::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn available(&self) -> usize {
        self.available
    }

    /// Take a slot if one is free.
    pub(crate) fn try_acquire(&mut self) -> bool {
        if self.available == 0 {
            return false;
        }
        self.available -= 1;
        true
    }

    /// Queue a caller to be woken when a slot is returned.
    pub(crate) fn park(&mut self, parker: Arc<Parker>) {
        self.waiting.push_back(parker);
    }

    /// Drop a caller from the queue, if it is still queued.
    pub(crate) fn forget(&mut self, parker: &Arc<Parker>) {
        self.waiting.retain(|p| !Arc::ptr_eq(p, parker));
    }

    /// Return a slot. Yields the waiter that should retry, if any.
    ///
    /// # Panics
    /// If more slots are returned than were taken.
    pub(crate) fn release(&mut self) -> Option<Arc<Parker>> {
        assert!(
            self.available < self.capacity,
            "AdmissionLimiter::release: [1]"
        );
        self.available += 1;
        self.waiting.pop_front()
    }
}
