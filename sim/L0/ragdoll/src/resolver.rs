//! Collision resolution: push bodies out of penetration.
//!
//! Records are applied one at a time in list order. A later record sees the
//! state left by earlier ones (sequential, not simultaneous), which keeps the
//! result deterministic and independent of how many records touch the same
//! ragdoll.
//!
//! # Position correction
//!
//! ```text
//! c   = relaxation * min(max(depth - slop, 0), max_correction)
//! Δa  = -n * c * w_a / (w_a + w_b)
//! Δb  = +n * c * w_b / (w_a + w_b)
//! ```
//!
//! # Velocity correction
//!
//! When the bodies approach along the normal (`v_n = (v_b - v_a) · n < 0`):
//!
//! ```text
//! j   = -(1 + e) * v_n / (w_a + w_b)
//! Δva = -n * j * w_a
//! Δvb = +n * j * w_b
//! ```
//!
//! The environment has zero inverse mass and zero velocity.

use nalgebra::Vector3;
use sim_types::{Collider, CollisionRecord, RagdollId, ResolutionConfig};

use crate::arena::RagdollArena;
use crate::ragdoll::Collidable;
use crate::warning::{Warning, WarningTable};

/// Applies corrective adjustments for collision records.
#[derive(Debug, Clone, Default)]
pub struct CollisionResolver {
    config: ResolutionConfig,
}

/// Mass and velocity of one side of a contact.
#[derive(Debug, Clone, Copy)]
struct Side {
    inv_mass: f64,
    velocity: Vector3<f64>,
}

impl Side {
    fn fixed() -> Self {
        Self {
            inv_mass: 0.0,
            velocity: Vector3::zeros(),
        }
    }
}

impl CollisionResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(config: ResolutionConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Apply every record in order. Returns the number of records applied.
    ///
    /// Records whose ragdolls no longer exist, or whose two sides are both
    /// immovable, are skipped.
    pub fn resolve<R: Collidable>(
        &self,
        records: &[CollisionRecord],
        arena: &mut RagdollArena<R>,
        warnings: &mut WarningTable,
    ) -> usize {
        let mut applied = 0;
        for record in records {
            if self.apply(record, arena, warnings) {
                applied += 1;
            }
        }
        if !records.is_empty() {
            tracing::debug!(records = records.len(), applied, "collision resolution");
        }
        applied
    }

    fn apply<R: Collidable>(
        &self,
        record: &CollisionRecord,
        arena: &mut RagdollArena<R>,
        warnings: &mut WarningTable,
    ) -> bool {
        let Some(a) = Self::side(arena, record.body_a, record.feature_a) else {
            warnings.raise(Warning::StaleHandle, record.body_a.to_bits());
            return false;
        };
        let b = match record.body_b {
            Collider::Environment => Side::fixed(),
            Collider::Ragdoll(id) => match Self::side(arena, id, record.feature_b) {
                Some(side) => side,
                None => {
                    warnings.raise(Warning::StaleHandle, id.to_bits());
                    return false;
                }
            },
        };

        let w_sum = a.inv_mass + b.inv_mass;
        if w_sum.is_nan() || w_sum <= 0.0 {
            return false;
        }

        let n = record.normal;
        let correction = self.position_correction(record.depth);
        let mut delta_a = -n * (correction * a.inv_mass / w_sum);
        let mut delta_b = n * (correction * b.inv_mass / w_sum);

        let mut dv_a = Vector3::zeros();
        let mut dv_b = Vector3::zeros();
        if self.config.velocity_correction {
            let v_n = (b.velocity - a.velocity).dot(&n);
            if v_n < 0.0 {
                let j = -(1.0 + self.config.restitution) * v_n / w_sum;
                dv_a = -n * (j * a.inv_mass);
                dv_b = n * (j * b.inv_mass);
            }
        }

        tracing::trace!(
            body_a = %record.body_a,
            depth = record.depth,
            correction,
            "resolve contact"
        );

        // Same ragdoll on both sides: fold both corrections into one borrow
        if record.body_b.refers_to(record.body_a) && record.feature_a == record.feature_b {
            delta_a += delta_b;
            dv_a += dv_b;
            delta_b = Vector3::zeros();
            dv_b = Vector3::zeros();
        }

        if let Some(body) = arena.get_mut(record.body_a) {
            Self::correct(body, record.feature_a, &delta_a, &dv_a);
        }
        if let Collider::Ragdoll(id) = record.body_b {
            if let Some(body) = arena.get_mut(id) {
                Self::correct(body, record.feature_b, &delta_b, &dv_b);
            }
        }
        true
    }

    fn position_correction(&self, depth: f64) -> f64 {
        let mut excess = (depth - self.config.penetration_slop).max(0.0);
        if let Some(max) = self.config.max_correction {
            excess = excess.min(max);
        }
        self.config.relaxation * excess
    }

    fn side<R: Collidable>(
        arena: &RagdollArena<R>,
        id: RagdollId,
        feature: usize,
    ) -> Option<Side> {
        arena.get(id).map(|body| Side {
            inv_mass: body.inverse_mass(feature),
            velocity: body.velocity(feature),
        })
    }

    fn correct<R: Collidable>(
        body: &mut R,
        feature: usize,
        delta: &Vector3<f64>,
        dv: &Vector3<f64>,
    ) {
        if *delta != Vector3::zeros() {
            body.displace(feature, delta);
        }
        if *dv != Vector3::zeros() {
            body.apply_velocity_change(feature, dv);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::particle::ParticleRagdoll;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn ball(x: f64, mass: f64) -> ParticleRagdoll {
        let mut doll = ParticleRagdoll::new();
        doll.add_particle(Point3::new(x, 0.0, 0.0), mass, 0.5);
        doll
    }

    fn x_of(arena: &RagdollArena<ParticleRagdoll>, id: RagdollId) -> f64 {
        arena.get(id).unwrap().particles()[0].position.x
    }

    fn pair_record(a: RagdollId, b: RagdollId, depth: f64) -> CollisionRecord {
        CollisionRecord::new(
            a,
            Collider::Ragdoll(b),
            depth,
            Vector3::x(),
            Point3::new(0.45, 0.0, 0.0),
        )
    }

    #[test]
    fn test_equal_masses_split_correction() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 1.0));
        let b = arena.insert(ball(0.9, 1.0));

        let resolver = CollisionResolver::default();
        let mut warnings = WarningTable::new();
        let applied = resolver.resolve(&[pair_record(a, b, 0.1)], &mut arena, &mut warnings);

        assert_eq!(applied, 1);
        assert_relative_eq!(x_of(&arena, a), -0.05, epsilon = 1e-12);
        assert_relative_eq!(x_of(&arena, b), 0.95, epsilon = 1e-12);
    }

    #[test]
    fn test_heavier_body_moves_less() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 3.0));
        let b = arena.insert(ball(0.9, 1.0));

        let resolver = CollisionResolver::default();
        let records = [pair_record(a, b, 0.1)];
        resolver.resolve(&records, &mut arena, &mut WarningTable::new());

        assert_relative_eq!(x_of(&arena, a), -0.025, epsilon = 1e-12);
        assert_relative_eq!(x_of(&arena, b), 0.975, epsilon = 1e-12);
    }

    #[test]
    fn test_environment_takes_no_correction() {
        let mut arena = RagdollArena::new();
        let mut doll = ParticleRagdoll::new();
        doll.add_particle(Point3::new(0.0, 0.0, 0.4), 1.0, 0.5);
        let a = arena.insert(doll);

        let record = CollisionRecord::new(
            a,
            Collider::Environment,
            0.1,
            -Vector3::z(),
            Point3::new(0.0, 0.0, -0.05),
        );
        CollisionResolver::default().resolve(&[record], &mut arena, &mut WarningTable::new());

        let p = arena.get(a).unwrap().particles()[0];
        assert_relative_eq!(p.position.z, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_correction_stops_approach() {
        let mut arena = RagdollArena::new();
        let mut doll = ParticleRagdoll::new();
        let f = doll.add_particle(Point3::new(0.0, 0.0, 0.45), 1.0, 0.5);
        doll.apply_velocity_change(f, &Vector3::new(0.3, 0.0, -0.2));
        let a = arena.insert(doll);

        let record = CollisionRecord::new(
            a,
            Collider::Environment,
            0.05,
            -Vector3::z(),
            Point3::origin(),
        );
        CollisionResolver::default().resolve(&[record], &mut arena, &mut WarningTable::new());

        let v = arena.get(a).unwrap().velocity(f);
        assert_relative_eq!(v.z, 0.0, epsilon = 1e-12);
        // Tangential velocity untouched
        assert_relative_eq!(v.x, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_restitution_reflects_velocity() {
        let mut arena = RagdollArena::new();
        let mut doll = ParticleRagdoll::new();
        let f = doll.add_particle(Point3::new(0.0, 0.0, 0.45), 1.0, 0.5);
        doll.apply_velocity_change(f, &Vector3::new(0.0, 0.0, -0.2));
        let a = arena.insert(doll);

        let config = ResolutionConfig {
            restitution: 0.5,
            ..ResolutionConfig::default()
        };
        let record = CollisionRecord::new(
            a,
            Collider::Environment,
            0.05,
            -Vector3::z(),
            Point3::origin(),
        );
        CollisionResolver::new(config).resolve(&[record], &mut arena, &mut WarningTable::new());

        assert_relative_eq!(arena.get(a).unwrap().velocity(f).z, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_slop_and_cap() {
        let config = ResolutionConfig {
            relaxation: 0.5,
            penetration_slop: 0.01,
            max_correction: Some(0.04),
            ..ResolutionConfig::default()
        };
        let resolver = CollisionResolver::new(config);
        assert_relative_eq!(resolver.position_correction(0.005), 0.0);
        assert_relative_eq!(resolver.position_correction(0.03), 0.01, epsilon = 1e-12);
        assert_relative_eq!(resolver.position_correction(1.0), 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_sequential_records_see_earlier_corrections() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 1.0));
        let b = arena.insert(ball(0.9, 1.0));

        // Two contacts between the same pair, applied independently in order
        let records = [pair_record(a, b, 0.1), pair_record(a, b, 0.1)];
        CollisionResolver::new(ResolutionConfig::positional()).resolve(
            &records,
            &mut arena,
            &mut WarningTable::new(),
        );

        assert_relative_eq!(x_of(&arena, a), -0.1, epsilon = 1e-12);
        assert_relative_eq!(x_of(&arena, b), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_both_pinned_is_skipped() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 0.0));
        let b = arena.insert(ball(0.9, 0.0));

        let applied = CollisionResolver::default().resolve(
            &[pair_record(a, b, 0.1)],
            &mut arena,
            &mut WarningTable::new(),
        );
        assert_eq!(applied, 0);
        assert_relative_eq!(x_of(&arena, a), 0.0);
        assert_relative_eq!(x_of(&arena, b), 0.9);
    }

    #[test]
    fn test_stale_record_is_skipped() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 1.0));
        let b = arena.insert(ball(0.9, 1.0));
        arena.remove(b);

        let mut warnings = WarningTable::new();
        let applied = CollisionResolver::default().resolve(
            &[pair_record(a, b, 0.1)],
            &mut arena,
            &mut warnings,
        );
        assert_eq!(applied, 0);
        assert_relative_eq!(x_of(&arena, a), 0.0);
        assert_eq!(warnings.count(Warning::StaleHandle), 1);
    }

    #[test]
    fn test_empty_records_touch_nothing() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 1.0));
        let before = arena.get(a).unwrap().clone();

        let applied =
            CollisionResolver::default().resolve(&[], &mut arena, &mut WarningTable::new());
        assert_eq!(applied, 0);
        assert_eq!(arena.get(a).unwrap(), &before);
    }
}
