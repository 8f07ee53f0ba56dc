//! Particle ragdoll: Verlet particles joined by distance constraints.
//!
//! This is the reference implementation of the ragdoll capabilities. Joints
//! are particles; bones are [`DistanceConstraint`]s between them. Velocity is
//! implicit in Verlet form (`position - previous`), so a position correction
//! applied by collision resolution does not inject velocity, while an explicit
//! velocity change moves `previous`.
//!
//! # Relaxation
//!
//! One pass projects every constraint once, in insertion order
//! (Gauss-Seidel, position-based dynamics):
//!
//! ```text
//! C  = |x1 - x0| - L
//! n  = (x1 - x0) / |x1 - x0|
//! x0 += k * w0 / (w0 + w1) * C * n
//! x1 -= k * w1 / (w0 + w1) * C * n
//! ```
//!
//! where `w` are inverse masses and `k` is the constraint stiffness in [0, 1].

use nalgebra::{Point3, Vector3};

use sim_types::{Result, SimError};

use crate::broad_phase::Aabb;
use crate::ragdoll::{Collidable, Relaxable};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Length below which two particles are considered coincident.
const DEGENERATE_LENGTH: f64 = 1e-10;

/// A point mass with a collision radius.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Particle {
    /// Current position.
    pub position: Point3<f64>,
    /// Position at the previous step (Verlet velocity).
    pub previous: Point3<f64>,
    /// Inverse mass. Zero pins the particle.
    pub inv_mass: f64,
    /// Collision sphere radius.
    pub radius: f64,
}

impl Particle {
    /// Create a particle at rest.
    #[must_use]
    pub fn new(position: Point3<f64>, mass: f64, radius: f64) -> Self {
        let inv_mass = if mass > 0.0 && mass.is_finite() {
            1.0 / mass
        } else {
            0.0
        };
        Self {
            position,
            previous: position,
            inv_mass,
            radius,
        }
    }

    /// Verlet velocity (displacement per step).
    #[must_use]
    pub fn velocity(&self) -> Vector3<f64> {
        self.position - self.previous
    }

    /// Whether the particle is immovable.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.inv_mass == 0.0
    }
}

/// Distance constraint between two particles.
///
/// Maintains the distance between two particles at the rest length.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistanceConstraint {
    /// Index of the first particle.
    pub p0: usize,
    /// Index of the second particle.
    pub p1: usize,
    /// Rest length (target distance).
    pub rest_length: f64,
    /// Fraction of the error corrected per projection, in [0, 1].
    pub stiffness: f64,
}

impl DistanceConstraint {
    /// Create a new rigid distance constraint.
    #[must_use]
    pub const fn new(p0: usize, p1: usize, rest_length: f64) -> Self {
        Self {
            p0,
            p1,
            rest_length,
            stiffness: 1.0,
        }
    }

    /// Set the stiffness (clamped to [0, 1]).
    #[must_use]
    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness.clamp(0.0, 1.0);
        self
    }

    /// Compute the constraint value C = |x1 - x0| - L.
    #[must_use]
    pub fn evaluate(&self, particles: &[Particle]) -> f64 {
        let diff = particles[self.p1].position - particles[self.p0].position;
        diff.norm() - self.rest_length
    }

    /// Project this constraint once.
    pub fn project(&self, particles: &mut [Particle]) {
        let w0 = particles[self.p0].inv_mass;
        let w1 = particles[self.p1].inv_mass;
        let w_sum = w0 + w1;

        // Both particles are pinned
        if w_sum < 1e-10 {
            return;
        }

        let diff = particles[self.p1].position - particles[self.p0].position;
        let distance = diff.norm();

        // No direction to push along
        if distance < DEGENERATE_LENGTH {
            return;
        }

        let c = distance - self.rest_length;
        let n = diff / distance;
        let correction = n * (self.stiffness * c / w_sum);

        particles[self.p0].position += correction * w0;
        particles[self.p1].position -= correction * w1;
    }
}

/// A ragdoll made of particles and distance constraints.
///
/// # Example
///
/// ```
/// use sim_ragdoll::{ParticleRagdoll, Relaxable};
/// use nalgebra::Point3;
///
/// let mut doll = ParticleRagdoll::new();
/// let a = doll.add_particle(Point3::new(0.0, 0.0, 0.0), 1.0, 0.1);
/// let b = doll.add_particle(Point3::new(1.5, 0.0, 0.0), 1.0, 0.1);
/// doll.add_constraint(a, b, 1.0).unwrap();
///
/// assert!((doll.max_violation() - 0.5).abs() < 1e-12);
/// doll.relax();
/// assert!(doll.max_violation() < 1e-12);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParticleRagdoll {
    particles: Vec<Particle>,
    constraints: Vec<DistanceConstraint>,
}

impl ParticleRagdoll {
    /// Create an empty ragdoll.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a straight chain of `count` particles from `start` to `end`,
    /// each constrained to its neighbour at the current spacing.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn chain(
        start: Point3<f64>,
        end: Point3<f64>,
        count: usize,
        mass: f64,
        radius: f64,
    ) -> Self {
        let mut doll = Self::new();
        let segments = count.saturating_sub(1).max(1);
        for i in 0..count {
            let t = i as f64 / segments as f64;
            let position = start + (end - start) * t;
            doll.add_particle(position, mass, radius);
        }
        for (i, pair) in doll.particles.windows(2).enumerate() {
            let rest = (pair[1].position - pair[0].position).norm();
            doll.constraints.push(DistanceConstraint::new(i, i + 1, rest));
        }
        doll
    }

    /// Add a particle and return its index. Non-positive or infinite mass
    /// pins the particle.
    pub fn add_particle(&mut self, position: Point3<f64>, mass: f64, radius: f64) -> usize {
        self.particles.push(Particle::new(position, mass, radius));
        self.particles.len() - 1
    }

    /// Add a distance constraint with an explicit rest length.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::IndexOutOfBounds`] if either index is out of range.
    pub fn add_constraint(&mut self, p0: usize, p1: usize, rest_length: f64) -> Result<usize> {
        self.push_constraint(DistanceConstraint::new(p0, p1, rest_length))
    }

    /// Add a distance constraint whose rest length is the current distance.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::IndexOutOfBounds`] if either index is out of range.
    pub fn connect(&mut self, p0: usize, p1: usize) -> Result<usize> {
        let x0 = self.particle_position(p0)?;
        let x1 = self.particle_position(p1)?;
        self.push_constraint(DistanceConstraint::new(p0, p1, (x1 - x0).norm()))
    }

    /// Add a fully specified constraint.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::IndexOutOfBounds`] if either index is out of range.
    pub fn push_constraint(&mut self, constraint: DistanceConstraint) -> Result<usize> {
        self.particle_position(constraint.p0)?;
        self.particle_position(constraint.p1)?;
        self.constraints.push(constraint);
        Ok(self.constraints.len() - 1)
    }

    fn particle_position(&self, index: usize) -> Result<Point3<f64>> {
        let len = self.particles.len();
        self.particles
            .get(index)
            .map(|p| p.position)
            .ok_or_else(|| SimError::index_out_of_bounds("particles", index, len))
    }

    /// Pin a particle in place. Out-of-range indices are ignored.
    pub fn pin(&mut self, index: usize) {
        if let Some(p) = self.particles.get_mut(index) {
            p.inv_mass = 0.0;
            p.previous = p.position;
        }
    }

    /// Translate every particle, preserving velocities.
    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for p in &mut self.particles {
            p.position += offset;
            p.previous += offset;
        }
    }

    /// Advance one Verlet step under a uniform acceleration.
    ///
    /// Forces are application policy; the engine never calls this.
    pub fn integrate(&mut self, acceleration: &Vector3<f64>, dt: f64, damping: f64) {
        let keep = (1.0 - damping).clamp(0.0, 1.0);
        for p in &mut self.particles {
            if p.is_pinned() {
                continue;
            }
            let velocity = p.velocity() * keep;
            p.previous = p.position;
            p.position += velocity + acceleration * (dt * dt);
        }
    }

    /// The particles.
    #[must_use]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// The constraints.
    #[must_use]
    pub fn constraints(&self) -> &[DistanceConstraint] {
        &self.constraints
    }

    /// Number of particles.
    #[must_use]
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    /// Centroid of all particles, or `None` if empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.particles.is_empty() {
            return None;
        }
        let sum: Vector3<f64> = self.particles.iter().map(|p| p.position.coords).sum();
        Some(Point3::from(sum / self.particles.len() as f64))
    }
}

impl Relaxable for ParticleRagdoll {
    fn relax(&mut self) {
        for c in &self.constraints {
            c.project(&mut self.particles);
        }
    }

    fn max_violation(&self) -> f64 {
        self.constraints
            .iter()
            .map(|c| c.evaluate(&self.particles).abs())
            .fold(0.0, f64::max)
    }
}

impl Collidable for ParticleRagdoll {
    fn bounding_box(&self) -> Option<Aabb> {
        self.particles
            .iter()
            .map(|p| Aabb::from_sphere(p.position, p.radius))
            .reduce(|acc, b| acc.merged(&b))
    }

    fn inverse_mass(&self, feature: usize) -> f64 {
        self.particles.get(feature).map_or(0.0, |p| p.inv_mass)
    }

    fn displace(&mut self, feature: usize, delta: &Vector3<f64>) {
        if let Some(p) = self.particles.get_mut(feature) {
            p.position += delta;
            p.previous += delta;
        }
    }

    fn velocity(&self, feature: usize) -> Vector3<f64> {
        self.particles
            .get(feature)
            .map_or_else(Vector3::zeros, Particle::velocity)
    }

    fn apply_velocity_change(&mut self, feature: usize, delta_v: &Vector3<f64>) {
        if let Some(p) = self.particles.get_mut(feature) {
            p.previous -= delta_v;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_projection_restores_rest_length() {
        let mut doll = ParticleRagdoll::new();
        let a = doll.add_particle(Point3::origin(), 1.0, 0.1);
        let b = doll.add_particle(Point3::new(2.0, 0.0, 0.0), 1.0, 0.1);
        doll.add_constraint(a, b, 1.0).unwrap();

        assert_relative_eq!(doll.max_violation(), 1.0, epsilon = 1e-12);
        doll.relax();
        assert_relative_eq!(doll.max_violation(), 0.0, epsilon = 1e-12);

        // Equal masses move symmetrically
        assert_relative_eq!(doll.particles()[0].position.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(doll.particles()[1].position.x, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_pinned_particle_does_not_move() {
        let mut doll = ParticleRagdoll::new();
        let a = doll.add_particle(Point3::origin(), 1.0, 0.1);
        let b = doll.add_particle(Point3::new(0.0, 0.0, -2.0), 1.0, 0.1);
        doll.pin(a);
        doll.add_constraint(a, b, 1.0).unwrap();

        doll.relax();
        assert_eq!(doll.particles()[0].position, Point3::origin());
        assert_relative_eq!(doll.particles()[1].position.z, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_both_pinned_cannot_converge() {
        let mut doll = ParticleRagdoll::new();
        let a = doll.add_particle(Point3::origin(), 0.0, 0.1);
        let b = doll.add_particle(Point3::new(2.0, 0.0, 0.0), 0.0, 0.1);
        doll.add_constraint(a, b, 1.0).unwrap();

        for _ in 0..10 {
            doll.relax();
        }
        assert_relative_eq!(doll.max_violation(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_coincident_particles_are_skipped() {
        let mut doll = ParticleRagdoll::new();
        let a = doll.add_particle(Point3::origin(), 1.0, 0.1);
        let b = doll.add_particle(Point3::origin(), 1.0, 0.1);
        doll.add_constraint(a, b, 1.0).unwrap();

        doll.relax();
        assert!(
            doll.particles()
                .iter()
                .all(|p| p.position == Point3::origin())
        );
        assert_relative_eq!(doll.max_violation(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_soft_constraint_converges_gradually() {
        let mut doll = ParticleRagdoll::new();
        let a = doll.add_particle(Point3::origin(), 1.0, 0.1);
        let b = doll.add_particle(Point3::new(2.0, 0.0, 0.0), 1.0, 0.1);
        doll.push_constraint(DistanceConstraint::new(a, b, 1.0).with_stiffness(0.5))
            .unwrap();

        doll.relax();
        assert_relative_eq!(doll.max_violation(), 0.5, epsilon = 1e-12);
        doll.relax();
        assert_relative_eq!(doll.max_violation(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_chain_builder() {
        let doll = ParticleRagdoll::chain(
            Point3::origin(),
            Point3::new(3.0, 0.0, 0.0),
            4,
            1.0,
            0.2,
        );
        assert_eq!(doll.num_particles(), 4);
        assert_eq!(doll.constraints().len(), 3);
        assert_relative_eq!(doll.max_violation(), 0.0, epsilon = 1e-12);
        for c in doll.constraints() {
            assert_relative_eq!(c.rest_length, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_constraint_index_out_of_bounds() {
        let mut doll = ParticleRagdoll::new();
        let a = doll.add_particle(Point3::origin(), 1.0, 0.1);

        let err = doll.add_constraint(a, 3, 1.0).unwrap_err();
        assert_eq!(
            err,
            SimError::IndexOutOfBounds {
                what: "particles",
                index: 3,
                len: 1
            }
        );
        assert!(doll.connect(5, a).is_err());
        assert!(doll.push_constraint(DistanceConstraint::new(a, 1, 1.0)).is_err());
        assert!(doll.constraints().is_empty());

        let b = doll.add_particle(Point3::new(2.0, 0.0, 0.0), 1.0, 0.1);
        assert_eq!(doll.connect(a, b).unwrap(), 0);
        assert_relative_eq!(doll.constraints()[0].rest_length, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_displace_keeps_velocity() {
        let mut doll = ParticleRagdoll::new();
        let a = doll.add_particle(Point3::origin(), 1.0, 0.1);
        doll.apply_velocity_change(a, &Vector3::new(0.0, 0.0, 0.5));
        doll.displace(a, &Vector3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(doll.velocity(a).z, 0.5, epsilon = 1e-12);
        assert_relative_eq!(doll.particles()[a].position.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_range_feature_is_inert() {
        let mut doll = ParticleRagdoll::new();
        doll.add_particle(Point3::origin(), 1.0, 0.1);
        doll.displace(9, &Vector3::x());
        assert_relative_eq!(doll.inverse_mass(9), 0.0);
        assert_eq!(doll.velocity(9), Vector3::zeros());
        assert_eq!(doll.particles()[0].position, Point3::origin());
    }

    #[test]
    fn test_bounding_box_covers_spheres() {
        let doll = ParticleRagdoll::chain(
            Point3::origin(),
            Point3::new(2.0, 0.0, 0.0),
            3,
            1.0,
            0.5,
        );
        let aabb = doll.bounding_box().unwrap();
        assert_relative_eq!(aabb.min.x, -0.5);
        assert_relative_eq!(aabb.max.x, 2.5);
        assert!(ParticleRagdoll::new().bounding_box().is_none());
    }

    #[test]
    fn test_integrate_under_gravity() {
        let mut doll = ParticleRagdoll::new();
        doll.add_particle(Point3::new(0.0, 0.0, 1.0), 1.0, 0.1);
        let pinned = doll.add_particle(Point3::origin(), 1.0, 0.1);
        doll.pin(pinned);

        doll.integrate(&Vector3::new(0.0, 0.0, -10.0), 0.1, 0.0);
        assert_relative_eq!(doll.particles()[0].position.z, 0.9, epsilon = 1e-12);
        assert_eq!(doll.particles()[pinned].position, Point3::origin());
        assert_relative_eq!(doll.centroid().unwrap().z, 0.45, epsilon = 1e-12);
    }
}
