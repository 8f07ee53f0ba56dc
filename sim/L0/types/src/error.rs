//! Error types for simulation setup.
//!
//! The per-tick pipeline never fails: invalid handles are ignored, unconverged
//! enforcement is reported through statistics, and degenerate contacts are
//! skipped. Errors only arise when building an engine from a bad
//! configuration or assembling a ragdoll from bad indices.

use thiserror::Error;

/// Errors that can occur while configuring a simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Invalid engine configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid enforcement budget.
    #[error("invalid enforcement budget: {reason}")]
    InvalidBudget {
        /// Description of what is wrong with the budget.
        reason: String,
    },

    /// Index out of bounds.
    #[error("index {index} out of bounds for {len} {what}")]
    IndexOutOfBounds {
        /// What was being indexed.
        what: &'static str,
        /// The offending index.
        index: usize,
        /// Number of valid entries.
        len: usize,
    },
}

impl SimError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid budget error.
    #[must_use]
    pub fn invalid_budget(reason: impl Into<String>) -> Self {
        Self::InvalidBudget {
            reason: reason.into(),
        }
    }

    /// Create an index out of bounds error.
    #[must_use]
    pub fn index_out_of_bounds(what: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds { what, index, len }
    }
}
