//! Budgeted constraint enforcement.
//!
//! One pass relaxes every registered ragdoll once, in registry order. After
//! each pass the enforcement error is measured as the largest violation of
//! any ragdoll. The loop stops on the first of:
//!
//! - error at or below `min_error`
//! - `max_iterations` passes done
//! - `max_usec` microseconds elapsed (checked between passes only)
//!
//! At least one pass runs when a registered ragdoll is live and
//! `max_iterations > 0`. Stopping on the iteration or time limit is not an
//! error; the caller compares the reported error against its tolerance.

use std::time::{Duration, Instant};

use sim_types::{EnforcementBudget, EnforcementStats, RagdollId};

use crate::arena::RagdollArena;
use crate::ragdoll::Relaxable;
use crate::warning::{Warning, WarningTable};

/// Runs relaxation passes under an [`EnforcementBudget`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConstraintEnforcer {
    budget: EnforcementBudget,
}

impl ConstraintEnforcer {
    /// Create an enforcer with the given budget.
    #[must_use]
    pub const fn new(budget: EnforcementBudget) -> Self {
        Self { budget }
    }

    /// Get the budget.
    #[must_use]
    pub const fn budget(&self) -> &EnforcementBudget {
        &self.budget
    }

    /// Relax the registered ragdolls until the budget says stop.
    pub fn enforce<R: Relaxable>(
        &self,
        registry: &[RagdollId],
        arena: &mut RagdollArena<R>,
        warnings: &mut WarningTable,
    ) -> EnforcementStats {
        let start = Instant::now();
        let time_limit = Duration::from_micros(self.budget.max_usec);

        // Stale handles are reported once per call, not once per pass
        let mut any_live = false;
        for &id in registry {
            if arena.contains(id) {
                any_live = true;
            } else {
                warnings.raise(Warning::StaleHandle, id.to_bits());
            }
        }

        let mut error = max_error(registry, arena, warnings);
        let mut iterations = 0;

        if any_live && self.budget.max_iterations > 0 {
            loop {
                for &id in registry {
                    if let Some(ragdoll) = arena.get_mut(id) {
                        ragdoll.relax();
                    }
                }
                iterations += 1;
                error = max_error(registry, arena, warnings);

                if error <= self.budget.min_error
                    || iterations >= self.budget.max_iterations
                    || start.elapsed() >= time_limit
                {
                    break;
                }
            }
        }

        let stats = EnforcementStats::new(iterations, error, start.elapsed());
        tracing::debug!(
            iterations,
            error,
            elapsed_usec = stats.elapsed_usec(),
            converged = stats.converged(self.budget.min_error),
            "constraint enforcement"
        );
        stats
    }
}

/// Largest constraint violation over the registered ragdolls.
///
/// A non-finite violation counts as infinite. Stale handles contribute
/// nothing and are not reported here. An empty registry has zero error.
pub fn max_error<R: Relaxable>(
    registry: &[RagdollId],
    arena: &RagdollArena<R>,
    warnings: &mut WarningTable,
) -> f64 {
    let mut error = 0.0_f64;
    for &id in registry {
        let Some(ragdoll) = arena.get(id) else {
            continue;
        };
        let violation = ragdoll.max_violation();
        if violation.is_finite() {
            error = error.max(violation.abs());
        } else {
            warnings.raise(Warning::NonFiniteViolation, id.to_bits());
            error = f64::INFINITY;
        }
    }
    error
}
