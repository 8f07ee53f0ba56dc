//! Contract between the engine and the geometry layer.
//!
//! The engine does not own narrow-phase math. It asks an [`OverlapTest`]
//! implementation for the contacts between two ragdolls, or between one
//! ragdoll and the static environment, and validates what comes back.

use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;

/// Minimum norm threshold for geometric operations.
///
/// Normals shorter than this cannot be normalised reliably and mark a contact
/// as degenerate.
pub const GEOM_EPSILON: f64 = 1e-10;

/// Contact geometry reported by the geometry layer for one overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactGeometry {
    /// Feature of the first body in contact.
    pub feature_a: usize,
    /// Feature of the second body in contact. For the environment, whatever
    /// index the geometry layer uses for its static features.
    pub feature_b: usize,
    /// Penetration depth; positive when overlapping.
    pub depth: f64,
    /// Contact normal pointing from the first body toward the second.
    /// Need not be normalised.
    pub normal: Vector3<f64>,
    /// Contact point in world coordinates.
    pub point: Point3<f64>,
}

/// Scratch buffer for the contacts of a single pair.
pub type ContactBuffer = SmallVec<[ContactGeometry; 4]>;

/// What validation decided about one contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactCheck {
    /// A real overlap, with its normal normalised.
    Valid {
        /// Unit normal.
        normal: Vector3<f64>,
    },
    /// Touching or separated; not an overlap.
    Separated,
    /// Malformed geometry (non-finite values or zero-length normal).
    Degenerate,
}

impl ContactGeometry {
    /// Create a contact between two features.
    #[must_use]
    pub fn new(
        feature_a: usize,
        feature_b: usize,
        depth: f64,
        normal: Vector3<f64>,
        point: Point3<f64>,
    ) -> Self {
        Self {
            feature_a,
            feature_b,
            depth,
            normal,
            point,
        }
    }

    /// Classify this contact.
    #[must_use]
    pub fn check(&self) -> ContactCheck {
        if !self.depth.is_finite() || !self.point.iter().all(|v| v.is_finite()) {
            return ContactCheck::Degenerate;
        }
        if self.depth <= 0.0 {
            return ContactCheck::Separated;
        }
        let len = self.normal.norm();
        if !len.is_finite() || len < GEOM_EPSILON {
            return ContactCheck::Degenerate;
        }
        ContactCheck::Valid {
            normal: self.normal / len,
        }
    }
}

/// Overlap tests supplied by the geometry layer.
///
/// Implementations push one [`ContactGeometry`] per actual overlap and must
/// not depend on anything but the bodies passed in, so detection stays
/// deterministic for a fixed geometric state.
pub trait OverlapTest<R: ?Sized> {
    /// Contacts between two ragdolls. Normals point from `a` toward `b`.
    fn overlap_pair(&self, a: &R, b: &R, out: &mut ContactBuffer);

    /// Contacts between a ragdoll and the static environment. Normals point
    /// from the ragdoll toward the environment.
    fn overlap_environment(&self, _body: &R, _out: &mut ContactBuffer) {}
}

impl<R: ?Sized, G: OverlapTest<R> + ?Sized> OverlapTest<R> for &G {
    fn overlap_pair(&self, a: &R, b: &R, out: &mut ContactBuffer) {
        (**self).overlap_pair(a, b, out);
    }

    fn overlap_environment(&self, body: &R, out: &mut ContactBuffer) {
        (**self).overlap_environment(body, out);
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_valid_contact_normalises() {
        let c = ContactGeometry::new(0, 0, 0.1, Vector3::new(0.0, 3.0, 0.0), Point3::origin());
        match c.check() {
            ContactCheck::Valid { normal } => {
                assert_relative_eq!(normal.norm(), 1.0, epsilon = 1e-12);
                assert_relative_eq!(normal.y, 1.0, epsilon = 1e-12);
            }
            other => panic!("expected valid contact, got {other:?}"),
        }
    }

    #[test]
    fn test_separated_contact() {
        let c = ContactGeometry::new(0, 0, 0.0, Vector3::x(), Point3::origin());
        assert_eq!(c.check(), ContactCheck::Separated);
        let c = ContactGeometry::new(0, 0, -0.2, Vector3::x(), Point3::origin());
        assert_eq!(c.check(), ContactCheck::Separated);
    }

    #[test]
    fn test_degenerate_contacts() {
        let zero_normal = ContactGeometry::new(0, 0, 0.1, Vector3::zeros(), Point3::origin());
        assert_eq!(zero_normal.check(), ContactCheck::Degenerate);

        let nan_depth = ContactGeometry::new(0, 0, f64::NAN, Vector3::x(), Point3::origin());
        assert_eq!(nan_depth.check(), ContactCheck::Degenerate);

        let inf_point = ContactGeometry::new(
            0,
            0,
            0.1,
            Vector3::x(),
            Point3::new(f64::INFINITY, 0.0, 0.0),
        );
        assert_eq!(inf_point.check(), ContactCheck::Degenerate);

        let normal = Vector3::new(f64::NAN, 0.0, 0.0);
        let nan_normal = ContactGeometry::new(0, 0, 0.1, normal, Point3::origin());
        assert_eq!(nan_normal.check(), ContactCheck::Degenerate);
    }
}
