//! Core data types for ragdoll simulation.
//!
//! This crate provides the data shared between the simulation engine and the
//! code that drives it:
//!
//! - [`RagdollId`] - Non-owning [`slotmap`] key for a caller-owned ragdoll
//! - [`Collider`] - Second participant of a collision (ragdoll or environment)
//! - [`CollisionRecord`] - One detected overlap for the current tick
//! - [`EnforcementStats`] - Iterations, residual error, and time of a solve
//! - [`EngineConfig`] - Enforcement budget, detection and resolution settings
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They have no physics. They are the common
//! language between the engine, the ragdoll implementations it drives, and
//! diagnostics that read its statistics.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**.
//!
//! # Example
//!
//! ```
//! use sim_types::{Collider, CollisionRecord, RagdollId};
//! use nalgebra::{Point3, Vector3};
//!
//! let a = RagdollId::from_bits(1);
//! let record = CollisionRecord::new(
//!     a,
//!     Collider::Environment,
//!     0.01,
//!     -Vector3::z(),
//!     Point3::origin(),
//! );
//!
//! assert!(record.is_environment());
//! assert!(record.involves(a));
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod config;
mod contact;
mod error;
mod handle;
mod stats;

pub use config::{DetectionConfig, EnforcementBudget, EngineConfig, ResolutionConfig};
pub use contact::CollisionRecord;
pub use error::SimError;
pub use handle::{Collider, RagdollId};
pub use slotmap::Key;
pub use stats::EnforcementStats;

// Re-export math types for convenience
pub use nalgebra::{Point3, Vector3};

/// Result type for simulation setup.
pub type Result<T> = std::result::Result<T, SimError>;
