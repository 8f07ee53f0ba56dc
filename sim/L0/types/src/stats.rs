//! Statistics reported by a constraint enforcement call.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of one enforcement call.
///
/// Written as a whole when the call returns. Converged and budget-exhausted
/// runs are distinguished only by comparing [`error`](Self::error) with the
/// caller's tolerance; see [`converged`](Self::converged).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnforcementStats {
    /// Relaxation passes performed.
    pub iterations: usize,
    /// Largest constraint violation across all ragdolls when the loop stopped.
    pub error: f64,
    /// Wall-clock time spent in the loop.
    pub elapsed: Duration,
}

impl EnforcementStats {
    /// Create a new statistics record.
    #[must_use]
    pub const fn new(iterations: usize, error: f64, elapsed: Duration) -> Self {
        Self {
            iterations,
            error,
            elapsed,
        }
    }

    /// Elapsed time in whole microseconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn elapsed_usec(&self) -> u64 {
        u64::try_from(self.elapsed.as_micros()).unwrap_or(u64::MAX)
    }

    /// Whether the residual error is within `min_error`.
    #[must_use]
    pub fn converged(&self, min_error: f64) -> bool {
        self.error <= min_error
    }
}
