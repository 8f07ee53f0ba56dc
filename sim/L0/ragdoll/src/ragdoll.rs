//! Capabilities the engine requires from a ragdoll.
//!
//! The engine never looks inside a ragdoll's constraint graph. It needs two
//! capability sets:
//!
//! - [`Relaxable`]: run one relaxation pass and report the remaining
//!   violation. Used by constraint enforcement.
//! - [`Collidable`]: expose bounds for the broad phase and accept position and
//!   velocity corrections on individual features. Used by detection and
//!   resolution.
//!
//! Anything implementing both is a [`Ragdoll`]. Boxed trait objects are
//! ragdolls too, so heterogeneous scenes can use
//! `RagdollArena<Box<dyn Ragdoll>>`.

use nalgebra::Vector3;

use crate::broad_phase::Aabb;

/// A constraint graph that can be relaxed toward consistency.
pub trait Relaxable {
    /// Apply one relaxation pass over every constraint.
    ///
    /// A pass should reduce violation but is not required to eliminate it.
    /// Constraint ordering within the pass is up to the implementation.
    fn relax(&mut self);

    /// Largest current constraint violation (non-negative).
    fn max_violation(&self) -> f64;
}

/// Per-feature state that collision resolution reads and corrects.
///
/// A feature is whatever the ragdoll's collision geometry is attached to:
/// usually a particle or joint. Feature indices come from the geometry layer
/// and are passed back unchanged.
pub trait Collidable {
    /// World-space bounds of the whole ragdoll, or `None` to skip broad-phase
    /// culling for this ragdoll.
    fn bounding_box(&self) -> Option<Aabb> {
        None
    }

    /// Inverse mass of a feature. Zero means immovable.
    fn inverse_mass(&self, feature: usize) -> f64;

    /// Move a feature by `delta`.
    fn displace(&mut self, feature: usize, delta: &Vector3<f64>);

    /// Current velocity of a feature.
    fn velocity(&self, feature: usize) -> Vector3<f64>;

    /// Add `delta_v` to a feature's velocity.
    fn apply_velocity_change(&mut self, feature: usize, delta_v: &Vector3<f64>);
}

/// A body the engine can simulate.
pub trait Ragdoll: Relaxable + Collidable {}

impl<T: Relaxable + Collidable + ?Sized> Ragdoll for T {}

impl<R: Relaxable + ?Sized> Relaxable for Box<R> {
    fn relax(&mut self) {
        (**self).relax();
    }

    fn max_violation(&self) -> f64 {
        (**self).max_violation()
    }
}

impl<R: Collidable + ?Sized> Collidable for Box<R> {
    fn bounding_box(&self) -> Option<Aabb> {
        (**self).bounding_box()
    }

    fn inverse_mass(&self, feature: usize) -> f64 {
        (**self).inverse_mass(feature)
    }

    fn displace(&mut self, feature: usize, delta: &Vector3<f64>) {
        (**self).displace(feature, delta);
    }

    fn velocity(&self, feature: usize) -> Vector3<f64> {
        (**self).velocity(feature)
    }

    fn apply_velocity_change(&mut self, feature: usize, delta_v: &Vector3<f64>) {
        (**self).apply_velocity_change(feature, delta_v);
    }
}
