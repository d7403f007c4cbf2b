//! Validation barrier for interdependent gossip announcements.
//!
//! Gossip announcements are validated in parallel, but some are only
//! meaningful once another has been validated: a channel update or a node
//! announcement needs the channel announcement that introduces the channel
//! (or the node's channel) to be known first. This crate provides the
//! barrier that sequences such jobs. It:
//! - Bounds the number of jobs in flight with a counting semaphore.
//! - Lets each channel announcement install a one-shot completion signal
//!   under its channel id and both endpoint node ids.
//! - Makes channel updates and node announcements block on that signal until
//!   the announcement has been released, while unrelated jobs run freely.
//! - Observes an external shutdown token at every blocking call so the whole
//!   barrier drains promptly.
//!
//! Key modules:
//! - `barrier`: the [`ValidationBarrier`](barrier::ValidationBarrier) with its
//!   admission permits and job tickets.
//! - `job`: the classifier mapping gossip message kinds to their role.
//! - `signal`: the one-shot completion signal and the shutdown token.
//! - `dispatch`: a ready-made submission loop running one thread per job.
//!
//! Quick start:
//! 1. Create a [`Shutdown`](signal::Shutdown) token and a barrier.
//! 2. For each incoming announcement, in arrival order, call
//!    [`begin`](barrier::ValidationBarrier::begin) to admit and register it.
//! 3. On the job's worker, call [`JobTicket::wait`](barrier::JobTicket::wait),
//!    validate unless it returned [`Wake::Shutdown`](signal::Wake::Shutdown),
//!    then drop the ticket.
//!
//! Dependents never start before their prerequisite has been released, and
//! every slot and signal is released on every exit path because the ticket
//! does it on drop.

/// The barrier itself: admission, dependency registration and release.
pub mod barrier;
/// Barrier settings.
pub mod config;
/// Submission loop validating a batch of jobs on scoped threads.
#[cfg(not(feature = "loom"))]
pub mod dispatch;
/// Job kinds and their dependency roles.
///
/// Defines the `ValidationJob` trait, the `Dependency` a job declares, and the
/// gossip message kinds with the table that classifies them.
pub mod job;
mod limiter;
mod registry;
/// One-shot completion signals and the shutdown token.
pub mod signal;
mod sync;
/// Channel and node identifiers.
pub mod types;
