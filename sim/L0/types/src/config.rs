//! Configuration types for the ragdoll simulation engine.
//!
//! This module provides the budgets and tuning knobs that control one tick of
//! the pipeline: how long constraint enforcement may run, how many collision
//! records detection may produce, and how hard resolution pushes bodies apart.

use crate::{Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a simulation engine.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Budget used by the full-tick pipeline.
    pub budget: EnforcementBudget,
    /// Collision detection settings.
    pub detection: DetectionConfig,
    /// Collision resolution settings.
    pub resolution: ResolutionConfig,
}

impl EngineConfig {
    /// Configuration for frame-locked interactive use (tight budget).
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            budget: EnforcementBudget::realtime(),
            detection: DetectionConfig::default(),
            resolution: ResolutionConfig::default(),
        }
    }

    /// Configuration for offline or high-fidelity use.
    #[must_use]
    pub fn high_fidelity() -> Self {
        Self {
            budget: EnforcementBudget::high_accuracy(),
            detection: DetectionConfig {
                margin: 0.001,
                max_collisions: 4096,
            },
            resolution: ResolutionConfig::soft(),
        }
    }

    /// Set the enforcement budget.
    #[must_use]
    pub fn with_budget(mut self, budget: EnforcementBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the detection settings.
    #[must_use]
    pub fn with_detection(mut self, detection: DetectionConfig) -> Self {
        self.detection = detection;
        self
    }

    /// Set the resolution settings.
    #[must_use]
    pub fn with_resolution(mut self, resolution: ResolutionConfig) -> Self {
        self.resolution = resolution;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.budget.validate()?;
        self.detection.validate()?;
        self.resolution.validate()?;
        Ok(())
    }
}

/// Caps on the cost of one constraint enforcement call.
///
/// Whichever limit is hit first ends the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnforcementBudget {
    /// Violation at or below which the ragdolls are "close enough".
    pub min_error: f64,
    /// Maximum number of relaxation passes.
    pub max_iterations: usize,
    /// Maximum wall-clock time in microseconds, checked between passes.
    pub max_usec: u64,
}

impl Default for EnforcementBudget {
    fn default() -> Self {
        Self {
            min_error: 0.001,
            max_iterations: 20,
            max_usec: 1000,
        }
    }
}

impl EnforcementBudget {
    /// Create a budget from its three limits.
    #[must_use]
    pub const fn new(min_error: f64, max_iterations: usize, max_usec: u64) -> Self {
        Self {
            min_error,
            max_iterations,
            max_usec,
        }
    }

    /// Tight budget for 60 Hz frames shared with rendering.
    #[must_use]
    pub const fn realtime() -> Self {
        Self {
            min_error: 0.005,
            max_iterations: 10,
            max_usec: 500,
        }
    }

    /// Generous budget for accuracy over latency.
    #[must_use]
    pub const fn high_accuracy() -> Self {
        Self {
            min_error: 0.0001,
            max_iterations: 200,
            max_usec: 20_000,
        }
    }

    /// Validate the budget.
    ///
    /// Zero limits are valid: `max_iterations == 0` runs no pass and
    /// `max_usec == 0` stops after the first pass.
    ///
    /// # Errors
    ///
    /// Returns an error if `min_error` is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        if !self.min_error.is_finite() || self.min_error < 0.0 {
            return Err(SimError::invalid_budget(format!(
                "min_error must be finite and non-negative, got {}",
                self.min_error
            )));
        }
        Ok(())
    }
}

/// Collision detection settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectionConfig {
    /// Margin added to bounding boxes before the broad-phase overlap test.
    pub margin: f64,
    /// Capacity of the per-tick collision list.
    pub max_collisions: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            margin: 0.0,
            max_collisions: 256,
        }
    }
}

impl DetectionConfig {
    /// Validate the detection settings.
    pub fn validate(&self) -> Result<()> {
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(SimError::invalid_config(
                "detection margin must be finite and non-negative",
            ));
        }
        if self.max_collisions == 0 {
            return Err(SimError::invalid_config("max_collisions must be at least 1"));
        }
        Ok(())
    }
}

/// Collision resolution settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolutionConfig {
    /// Fraction of the penetration removed per record (0-1].
    pub relaxation: f64,
    /// Penetration depth tolerated without position correction (m).
    pub penetration_slop: f64,
    /// Maximum position correction per record (m). `None` is unbounded.
    pub max_correction: Option<f64>,
    /// Whether to remove approaching normal velocity with an impulse.
    pub velocity_correction: bool,
    /// Coefficient of restitution for the velocity correction [0, 1].
    pub restitution: f64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            relaxation: 1.0,
            penetration_slop: 0.0,
            max_correction: None,
            velocity_correction: true,
            restitution: 0.0,
        }
    }
}

impl ResolutionConfig {
    /// Partial correction with a small slop; avoids jitter in resting stacks.
    #[must_use]
    pub fn soft() -> Self {
        Self {
            relaxation: 0.8,
            penetration_slop: 0.0005,
            max_correction: Some(0.05),
            velocity_correction: true,
            restitution: 0.0,
        }
    }

    /// Position-only correction.
    #[must_use]
    pub fn positional() -> Self {
        Self {
            velocity_correction: false,
            ..Self::default()
        }
    }

    /// Validate the resolution settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.relaxation > 0.0 && self.relaxation <= 1.0) {
            return Err(SimError::invalid_config("relaxation must be in (0, 1]"));
        }
        if !self.penetration_slop.is_finite() || self.penetration_slop < 0.0 {
            return Err(SimError::invalid_config(
                "penetration_slop must be finite and non-negative",
            ));
        }
        if let Some(max) = self.max_correction {
            if !(max > 0.0) {
                return Err(SimError::invalid_config("max_correction must be positive"));
            }
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(SimError::invalid_config("restitution must be in [0, 1]"));
        }
        Ok(())
    }
}
