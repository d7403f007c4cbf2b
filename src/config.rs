use core::num::NonZeroUsize;
use serde::{Deserialize, Serialize};

/// Settings for a [`ValidationBarrier`](crate::barrier::ValidationBarrier).
///
/// Deserializable from any serde format; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BarrierConfig {
    /// Maximum number of validation jobs admitted at once. Must be non-zero.
    pub max_active_jobs: usize,
}

impl Default for BarrierConfig {
    /// Four jobs per available core.
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self {
            max_active_jobs: cores.saturating_mul(4),
        }
    }
}
