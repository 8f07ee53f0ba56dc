//! Ragdoll simulation engine: collision detection, resolution and budgeted
//! constraint enforcement.
//!
//! This crate drives a set of ragdolls (constraint graphs of joints and
//! bones) through one simulation tick:
//!
//! 1. **Detect**: find overlaps between registered ragdolls and against the
//!    static environment ([`SimulationEngine::compute_collisions`])
//! 2. **Resolve**: push overlapping bodies apart and remove approaching
//!    velocity ([`SimulationEngine::process_collisions`])
//! 3. **Enforce**: relax every ragdoll's constraints until the worst
//!    violation is small enough, or the iteration or time budget runs out
//!    ([`SimulationEngine::enforce_constraints`])
//!
//! # Ownership
//!
//! Ragdolls live in a caller-owned [`RagdollArena`]. The engine registers
//! [`RagdollId`] handles and borrows the arena for each call. Removing a
//! ragdoll from the arena without deregistering it is tolerated: the stale
//! handle is skipped and reported once through the engine's
//! [`WarningTable`].
//!
//! # Capabilities
//!
//! The engine is generic over what a ragdoll is:
//!
//! - [`Relaxable`]: one relaxation pass plus a violation measure
//! - [`Collidable`]: bounds and per-feature corrections
//! - [`OverlapTest`]: the geometry layer that reports contacts
//!
//! [`ParticleRagdoll`] and [`SphereGeometry`] are the reference
//! implementations.
//!
//! # Budget
//!
//! Enforcement stops on whichever comes first:
//!
//! ```text
//! error <= min_error   |   iterations == max_iterations   |   elapsed >= max_usec
//! ```
//!
//! Running out of budget is not an error. Compare
//! [`SimulationEngine::enforcement_error`] with the tolerance to tell a
//! converged solve from an exhausted one.
//!
//! # Example
//!
//! ```
//! use sim_ragdoll::{HalfSpace, ParticleRagdoll, RagdollArena, SimulationEngine, SphereGeometry};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut arena = RagdollArena::new();
//! let doll = ParticleRagdoll::chain(
//!     Point3::new(0.0, 0.0, 1.0),
//!     Point3::new(0.0, 0.0, 2.0),
//!     5,
//!     1.0,
//!     0.05,
//! );
//! let id = arena.insert(doll);
//!
//! let mut engine = SimulationEngine::new();
//! engine.add_ragdoll(id);
//!
//! let ground = SphereGeometry::new().with_half_space(HalfSpace::ground(0.0));
//! for _ in 0..10 {
//!     if let Some(doll) = arena.get_mut(id) {
//!         doll.integrate(&Vector3::new(0.0, 0.0, -9.81), 1.0 / 60.0, 0.01);
//!     }
//!     engine.compute_collisions(&arena, &ground);
//!     engine.process_collisions(&mut arena);
//!     engine.enforce_constraints(&mut arena, 0.001, 20, 1000);
//! }
//!
//! assert!(engine.enforcement_iterations() >= 1);
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. The engine is
//! single-threaded and synchronous; all mutation goes through `&mut self`.

#![doc(html_root_url = "https://docs.rs/sim-ragdoll/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod arena;
mod broad_phase;
mod detector;
mod engine;
mod geometry;
mod particle;
mod ragdoll;
mod resolver;
mod solver;
mod sphere;
mod warning;

pub use arena::RagdollArena;
pub use broad_phase::{Aabb, may_overlap};
pub use detector::{CollisionDetector, CollisionList};
pub use engine::{SimulationEngine, TickReport};
pub use geometry::{ContactBuffer, ContactCheck, ContactGeometry, GEOM_EPSILON, OverlapTest};
pub use particle::{DistanceConstraint, Particle, ParticleRagdoll};
pub use ragdoll::{Collidable, Ragdoll, Relaxable};
pub use resolver::CollisionResolver;
pub use solver::{ConstraintEnforcer, max_error};
pub use sphere::{
    HalfSpace, Sphere, SphereGeometry, SphereSet, collide_sphere_half_space, collide_sphere_sphere,
};
pub use warning::{NUM_WARNINGS, Warning, WarningStat, WarningTable};

// Re-export the shared data types
pub use sim_types::{
    Collider, CollisionRecord, DetectionConfig, EnforcementBudget, EnforcementStats, EngineConfig,
    Key, RagdollId, ResolutionConfig, Result, SimError,
};
