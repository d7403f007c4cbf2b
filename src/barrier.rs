use crate::{
    config::BarrierConfig,
    job::{Dependency, ValidationJob},
    limiter::AdmissionLimiter,
    registry::DependencyRegistry,
    signal::{Parker, Shutdown, Signal, Wake, wait_or_shutdown},
    sync::{Arc, Mutex, lock},
};
use core::num::NonZeroUsize;
use derive_more::Debug;
use thiserror::Error;
use tracing::{debug, trace};

/// Error returned when a barrier cannot be constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BarrierError {
    /// A barrier must admit at least one job.
    #[error("admission capacity must be non-zero")]
    ZeroCapacity,
}

#[derive(Debug)]
struct State {
    limiter: AdmissionLimiter,
    registry: DependencyRegistry,
}

#[derive(Debug)]
struct Shared {
    #[debug(skip)]
    state: Mutex<State>,
    shutdown: Shutdown,
}

/// Admission and ordering barrier for parallel announcement validation.
///
/// Bounds how many jobs are in flight and makes jobs that depend on a
/// channel announcement wait until that announcement has been validated.
/// Job bodies run outside the barrier, between admission and release:
///
/// 1. [`acquire`](Self::acquire) a slot,
/// 2. [`register_if_prerequisite`](Self::register_if_prerequisite),
/// 3. [`await_dependency`](Self::await_dependency),
/// 4. run the job body,
/// 5. [`release_dependency`](Self::release_dependency) and drop the
///    [`Permit`], whatever the outcome of the body.
///
/// [`begin`](Self::begin) bundles these steps into a [`JobTicket`] guard.
///
/// The handle is cheap to clone; all clones share one barrier.
#[derive(Debug, Clone)]
pub struct ValidationBarrier {
    shared: Arc<Shared>,
}

/// Point-in-time view of a barrier's bookkeeping.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BarrierSnapshot {
    /// Configured admission capacity.
    pub capacity: usize,
    /// Slots not currently held by any job.
    pub available_slots: usize,
    /// Channel announcements admitted but not yet released.
    pub pending_announcements: usize,
    /// Channels with a signal channel updates wait on.
    pub channel_dependencies: usize,
    /// Nodes with a signal node announcements wait on.
    pub node_dependencies: usize,
}

impl ValidationBarrier {
    /// Create a barrier admitting at most `capacity` jobs at once, observing
    /// `shutdown` at every blocking call.
    ///
    /// # Errors
    /// If `capacity` is zero.
    pub fn new(capacity: usize, shutdown: Shutdown) -> Result<Self, BarrierError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(BarrierError::ZeroCapacity)?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    limiter: AdmissionLimiter::new(capacity),
                    registry: DependencyRegistry::default(),
                }),
                shutdown,
            }),
        })
    }

    /// Create a barrier from its configuration.
    ///
    /// # Errors
    /// If the configured capacity is zero.
    pub fn from_config(config: &BarrierConfig, shutdown: Shutdown) -> Result<Self, BarrierError> {
        Self::new(config.max_active_jobs, shutdown)
    }

    /// The shutdown token this barrier observes.
    #[must_use]
    pub fn shutdown(&self) -> &Shutdown {
        &self.shared.shutdown
    }

    /// Block until an admission slot is free.
    ///
    /// Returns `None` without taking a slot once shutdown is triggered; the
    /// caller must then abandon the job.
    #[must_use]
    pub fn acquire(&self) -> Option<Permit> {
        let Shared { state, shutdown } = &*self.shared;
        loop {
            let parker = {
                let mut state = lock(state);
                if shutdown.is_triggered() {
                    debug!("admission aborted by shutdown");
                    return None;
                }
                if state.limiter.try_acquire() {
                    trace!(available = state.limiter.available(), "slot acquired");
                    return Some(Permit {
                        barrier: self.clone(),
                    });
                }
                let parker = Parker::new();
                state.limiter.park(parker.clone());
                parker
            };

            if shutdown.signal().subscribe(&parker) {
                parker.park();
                shutdown.signal().unsubscribe(&parker);
            }
            lock(state).limiter.forget(&parker);
        }
    }

    /// Install a completion signal if `job` is a prerequisite and none is
    /// outstanding for its channel. Call once, right after admission.
    pub fn register_if_prerequisite(&self, job: &impl ValidationJob) {
        self.register(&job.dependency());
    }

    /// Block until the prerequisite `job` depends on has been released.
    ///
    /// Returns immediately for jobs without an outstanding prerequisite, and
    /// with [`Wake::Shutdown`] for every job once shutdown is triggered.
    pub fn await_dependency(&self, job: &impl ValidationJob) -> Wake {
        self.wait(&job.dependency())
    }

    /// Unblock the dependents of `job` and clean up its registry entries.
    /// Call once after the job body, whatever its outcome.
    ///
    /// A prerequisite released here is not tied to the cycle it registered
    /// in: it releases whichever announcement of its channel is outstanding.
    /// Callers admitting duplicate announcements concurrently must make sure
    /// a duplicate does not outlive the next cycle, or use [`begin`](Self::begin),
    /// whose ticket only ever releases its own cycle.
    pub fn release_dependency(&self, job: &impl ValidationJob) {
        self.release(&job.dependency(), None);
    }

    /// Admit `job` and register it, returning a guard that releases both on
    /// drop. `None` if shutdown was triggered while waiting for a slot.
    #[must_use]
    pub fn begin<J: ValidationJob>(&self, job: J) -> Option<JobTicket<J>> {
        let permit = self.acquire()?;
        let dependency = job.dependency();
        let bound = self.register(&dependency);
        Some(JobTicket {
            job,
            dependency,
            bound,
            permit,
        })
    }

    /// Current bookkeeping counters.
    #[must_use]
    pub fn snapshot(&self) -> BarrierSnapshot {
        let state = lock(&self.shared.state);
        BarrierSnapshot {
            capacity: state.limiter.capacity(),
            available_slots: state.limiter.available(),
            pending_announcements: state.registry.pending_announcements(),
            channel_dependencies: state.registry.channel_dependencies(),
            node_dependencies: state.registry.node_dependencies(),
        }
    }

    fn register(&self, dependency: &Dependency) -> Option<Signal> {
        let Dependency::Prerequisite { channel, endpoints } = dependency else {
            return None;
        };
        let registration = lock(&self.shared.state).registry.register(dependency)?;
        if registration.fresh {
            debug!(
                %channel,
                node_1 = %endpoints[0],
                node_2 = %endpoints[1],
                "registered channel announcement"
            );
        } else {
            trace!(%channel, "duplicate announcement joined pending cycle");
        }
        Some(registration.signal)
    }

    fn wait(&self, dependency: &Dependency) -> Wake {
        let shutdown = &self.shared.shutdown;
        if shutdown.is_triggered() {
            return Wake::Shutdown;
        }
        let Some(signal) = lock(&self.shared.state).registry.lookup(dependency) else {
            return Wake::Ready;
        };
        trace!(?dependency, "waiting on prerequisite");
        let wake = wait_or_shutdown(&signal, shutdown);
        trace!(?dependency, ?wake, "dependency wait finished");
        wake
    }

    fn release(&self, dependency: &Dependency, bound: Option<&Signal>) {
        let fired = lock(&self.shared.state).registry.release(dependency, bound);
        if let (Some(_), Dependency::Prerequisite { channel, .. }) = (fired, dependency) {
            debug!(%channel, "channel announcement released, dependents unblocked");
        }
    }

    fn release_slot(&self) {
        let Shared { state, shutdown } = &*self.shared;
        if shutdown.is_triggered() {
            trace!("slot release skipped after shutdown");
            return;
        }
        let (waiter, available) = {
            let mut state = lock(state);
            let waiter = state.limiter.release();
            (waiter, state.limiter.available())
        };
        trace!(available, "slot released");
        if let Some(waiter) = waiter {
            waiter.unpark();
        }
    }
}

/// An admission slot held by one job.
///
/// The slot goes back to the barrier exactly once: on [`release`](Self::release)
/// or when the permit is dropped.
#[must_use = "dropping a permit releases its slot immediately"]
#[derive(Debug)]
pub struct Permit {
    barrier: ValidationBarrier,
}

impl Permit {
    /// Return the slot to the barrier. A no-op once shutdown is triggered.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.barrier.release_slot();
    }
}

/// An admitted, registered job.
///
/// Dropping the ticket (or calling [`finish`](Self::finish)) releases the
/// job's dependency entries, then its slot. That happens on every exit path
/// of the job body, including unwinding.
///
/// A channel announcement's ticket is bound to the registration cycle it
/// joined. If a duplicate of the same announcement released that cycle
/// first, dropping this ticket leaves any newer cycle alone.
#[derive(Debug)]
pub struct JobTicket<J: ValidationJob> {
    job: J,
    dependency: Dependency,
    bound: Option<Signal>,
    permit: Permit,
}

impl<J: ValidationJob> JobTicket<J> {
    /// The admitted job.
    pub fn job(&self) -> &J {
        &self.job
    }

    /// Block until the job's prerequisite, if any, has been released.
    pub fn wait(&self) -> Wake {
        self.permit.barrier.wait(&self.dependency)
    }

    /// Release the job's dependents and slot.
    pub fn finish(self) {
        drop(self);
    }
}

impl<J: ValidationJob> Drop for JobTicket<J> {
    fn drop(&mut self) {
        self.permit
            .barrier
            .release(&self.dependency, self.bound.as_ref());
    }
}
