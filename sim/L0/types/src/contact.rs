//! Collision records produced by detection and consumed by resolution.

use nalgebra::{Point3, Vector3};

use crate::{Collider, RagdollId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One detected overlap between a ragdoll and another ragdoll or the
/// static environment.
///
/// Records are immutable for the tick that produced them. The normal points
/// from `body_a` toward `body_b`; separating the bodies means moving `body_a`
/// along `-normal` and `body_b` along `+normal`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionRecord {
    /// First body. Always a registered ragdoll.
    pub body_a: RagdollId,
    /// Second body: a registered ragdoll or the environment.
    pub body_b: Collider,
    /// Feature (particle / shape index) of `body_a` in contact.
    pub feature_a: usize,
    /// Feature of `body_b` in contact. For the environment, the index of the
    /// environment feature hit (zero if it has none).
    pub feature_b: usize,
    /// Penetration depth (always positive).
    pub depth: f64,
    /// Unit contact normal, pointing from A to B.
    pub normal: Vector3<f64>,
    /// Contact point in world coordinates.
    pub point: Point3<f64>,
}

impl CollisionRecord {
    /// Create a new collision record.
    #[must_use]
    pub fn new(
        body_a: RagdollId,
        body_b: Collider,
        depth: f64,
        normal: Vector3<f64>,
        point: Point3<f64>,
    ) -> Self {
        Self {
            body_a,
            body_b,
            feature_a: 0,
            feature_b: 0,
            depth,
            normal,
            point,
        }
    }

    /// Set the features in contact on each side.
    #[must_use]
    pub fn with_features(mut self, feature_a: usize, feature_b: usize) -> Self {
        self.feature_a = feature_a;
        self.feature_b = feature_b;
        self
    }

    /// Whether the record involves the static environment.
    #[must_use]
    pub fn is_environment(&self) -> bool {
        self.body_b.is_environment()
    }

    /// Whether the record involves the given ragdoll on either side.
    #[must_use]
    pub fn involves(&self, id: RagdollId) -> bool {
        self.body_a == id || self.body_b.refers_to(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_record_involves() {
        let a = RagdollId::from_bits(1);
        let b = RagdollId::from_bits(2);
        let c = RagdollId::from_bits(3);

        let record = CollisionRecord::new(
            a,
            Collider::Ragdoll(b),
            0.1,
            Vector3::x(),
            Point3::origin(),
        )
        .with_features(3, 5);

        assert!(record.involves(a));
        assert!(record.involves(b));
        assert!(!record.involves(c));
        assert!(!record.is_environment());
        assert_eq!(record.feature_a, 3);
        assert_eq!(record.feature_b, 5);
        assert_relative_eq!(record.depth, 0.1);
    }

    #[test]
    fn test_environment_record() {
        let a = RagdollId::from_bits(1);
        let record = CollisionRecord::new(
            a,
            Collider::Environment,
            0.02,
            -Vector3::z(),
            Point3::new(0.0, 0.0, 0.0),
        );
        assert!(record.is_environment());
        assert!(record.involves(a));
    }
}
