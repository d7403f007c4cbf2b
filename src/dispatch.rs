use crate::{barrier::ValidationBarrier, job::ValidationJob};
use std::{panic, thread};
use tracing::debug;

/// Result of one job submitted through [`validate_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome<R> {
    /// The job body ran and returned this value.
    Completed(R),
    /// Shutdown was triggered before the body could run.
    Abandoned,
}

impl<R> JobOutcome<R> {
    /// The body's return value, if it ran.
    pub fn completed(self) -> Option<R> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Abandoned => None,
        }
    }
}

/// Validate `jobs` in parallel, one thread per job, respecting the barrier.
///
/// Admission and registration happen on the calling thread in submission
/// order, so a channel announcement submitted before its updates is always
/// registered before they look for it. Each admitted job then waits for its
/// prerequisite on its own thread, runs `body` and releases. The returned
/// outcomes are in submission order.
///
/// # Panics
/// Re-raises a panic from `body` once every job has finished.
pub fn validate_all<J, R, F>(
    barrier: &ValidationBarrier,
    jobs: impl IntoIterator<Item = J>,
    body: F,
) -> Vec<JobOutcome<R>>
where
    J: ValidationJob + Send,
    R: Send,
    F: Fn(&J) -> R + Sync,
{
    let body = &body;
    thread::scope(|s| {
        let mut workers = Vec::new();
        let mut abandoned = 0usize;
        for job in jobs {
            let Some(ticket) = barrier.begin(job) else {
                abandoned += 1;
                continue;
            };
            workers.push(s.spawn(move || {
                if !ticket.wait().may_proceed() {
                    return JobOutcome::Abandoned;
                }
                JobOutcome::Completed(body(ticket.job()))
            }));
        }
        if abandoned > 0 {
            debug!(abandoned, "jobs dropped at admission by shutdown");
        }

        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or_else(|err| panic::resume_unwind(err)))
            .chain(core::iter::repeat_with(|| JobOutcome::Abandoned).take(abandoned))
            .collect()
    })
}
