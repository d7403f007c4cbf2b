use crate::sync::{Arc, AtomicBool, Condvar, Mutex, Ordering, lock};
use derive_more::Debug;

/// A wake-up latch owned by a single blocked caller.
///
/// Anything the caller waits on holds a clone of the parker and calls
/// [`Parker::unpark`] when its condition becomes true. The latch stays set,
/// so an unpark that lands before [`Parker::park`] is never lost.
#[derive(Debug)]
pub(crate) struct Parker {
    #[debug(skip)]
    woken: Mutex<bool>,
    #[debug(skip)]
    cond: Condvar,
}

impl Parker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            woken: Mutex::new(false),
            cond: Condvar::new(),
        })
    }

    pub(crate) fn unpark(&self) {
        let mut woken = lock(&self.woken);
        *woken = true;
        self.cond.notify_all();
    }

    pub(crate) fn park(&self) {
        let mut woken = lock(&self.woken);
        while !*woken {
            woken = self
                .cond
                .wait(woken)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

struct SignalState {
    fired: AtomicBool,
    parked: Mutex<Vec<Arc<Parker>>>,
}

/// One-shot, multi-waiter completion signal.
///
/// A signal starts pending and is fired at most once. Every clone observes
/// the same state; once fired it stays fired for all current and future
/// observers.
#[derive(Clone)]
pub struct Signal(Arc<SignalState>);

impl core::fmt::Debug for Signal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Signal")
            .field("fired", &self.is_fired())
            .finish_non_exhaustive()
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    /// Create a pending signal.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(SignalState {
            fired: AtomicBool::new(false),
            parked: Mutex::new(Vec::new()),
        }))
    }

    /// Whether the signal has fired. Does not take any lock.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.0.fired.load(Ordering::Acquire)
    }

    /// Fire the signal, waking every parked waiter.
    ///
    /// Returns `true` if this call performed the transition and `false` if
    /// the signal had already fired.
    pub fn fire(&self) -> bool {
        let parked = {
            let mut parked = lock(&self.0.parked);
            if self.0.fired.swap(true, Ordering::AcqRel) {
                return false;
            }
            core::mem::take(&mut *parked)
        };
        for parker in parked {
            parker.unpark();
        }
        true
    }

    /// Whether both handles refer to the same underlying signal.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Register `parker` to be woken on fire. Returns `false` without
    /// registering if the signal has already fired.
    pub(crate) fn subscribe(&self, parker: &Arc<Parker>) -> bool {
        let mut parked = lock(&self.0.parked);
        if self.0.fired.load(Ordering::Acquire) {
            return false;
        }
        parked.push(parker.clone());
        true
    }

    pub(crate) fn unsubscribe(&self, parker: &Arc<Parker>) {
        lock(&self.0.parked).retain(|p| !Arc::ptr_eq(p, parker));
    }
}

/// Externally owned cancellation token shared by a barrier and its owner.
///
/// Triggering is permanent. Every blocking barrier call observes it and
/// returns promptly once it is triggered.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Signal);

impl Shutdown {
    /// Create an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self(Signal::new())
    }

    /// Trigger shutdown. Idempotent.
    pub fn trigger(&self) {
        if self.0.fire() {
            tracing::debug!("shutdown triggered");
        }
    }

    /// Whether shutdown has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.0.is_fired()
    }

    pub(crate) fn signal(&self) -> &Signal {
        &self.0
    }
}

/// How a dependency wait ended.
#[must_use]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wake {
    /// Nothing to wait for: the job has no outstanding prerequisite.
    Ready,
    /// The prerequisite this job waited on has completed.
    Signalled,
    /// Shutdown was triggered. The job must be abandoned.
    Shutdown,
}

impl Wake {
    /// Whether the job may go on to execute its body.
    #[must_use]
    pub fn may_proceed(self) -> bool {
        !matches!(self, Self::Shutdown)
    }
}

/// Block until `signal` fires or `shutdown` is triggered.
///
/// Shutdown wins when both have happened by the time the caller wakes.
pub(crate) fn wait_or_shutdown(signal: &Signal, shutdown: &Shutdown) -> Wake {
    let resolve = || {
        if shutdown.is_triggered() {
            Some(Wake::Shutdown)
        } else if signal.is_fired() {
            Some(Wake::Signalled)
        } else {
            None
        }
    };
    if let Some(wake) = resolve() {
        return wake;
    }

    let parker = Parker::new();
    let subscribed = shutdown.signal().subscribe(&parker) && signal.subscribe(&parker);
    if subscribed {
        parker.park();
    }
    shutdown.signal().unsubscribe(&parker);
    signal.unsubscribe(&parker);

    // A failed subscription or an unpark both mean one side has fired.
    resolve().unwrap_or_else(|| unreachable!("wait_or_shutdown: woken with nothing fired"))
}
