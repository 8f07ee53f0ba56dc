//! Sphere geometry layer: the reference [`OverlapTest`] implementation.
//!
//! Every feature of a ragdoll is approximated by a sphere. Ragdoll pairs are
//! tested sphere against sphere; the static environment is a set of
//! [`HalfSpace`]s.
//!
//! Coincident sphere centres have no defined separating direction. They are
//! reported with a zero normal and the engine's detection pass skips them as
//! degenerate.

use nalgebra::{Point3, Vector3};

use crate::geometry::{ContactBuffer, ContactGeometry, GEOM_EPSILON, OverlapTest};
use crate::particle::ParticleRagdoll;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A collision sphere attached to one ragdoll feature.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sphere {
    /// Centre in world coordinates.
    pub center: Point3<f64>,
    /// Radius.
    pub radius: f64,
}

/// Ragdolls whose collision shape is one sphere per feature.
pub trait SphereSet {
    /// Number of spheres; features are `0..num_spheres()`.
    fn num_spheres(&self) -> usize;

    /// Sphere of one feature.
    fn sphere(&self, feature: usize) -> Option<Sphere>;
}

impl SphereSet for ParticleRagdoll {
    fn num_spheres(&self) -> usize {
        self.num_particles()
    }

    fn sphere(&self, feature: usize) -> Option<Sphere> {
        self.particles().get(feature).map(|p| Sphere {
            center: p.position,
            radius: p.radius,
        })
    }
}

impl<S: SphereSet + ?Sized> SphereSet for Box<S> {
    fn num_spheres(&self) -> usize {
        (**self).num_spheres()
    }

    fn sphere(&self, feature: usize) -> Option<Sphere> {
        (**self).sphere(feature)
    }
}

/// Solid half-space `{ x : normal · x <= offset }`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HalfSpace {
    /// Outward unit normal of the boundary plane.
    pub normal: Vector3<f64>,
    /// Plane offset along the normal.
    pub offset: f64,
}

impl HalfSpace {
    /// Create a half-space. The normal is normalised; a zero normal is kept
    /// as is and never produces valid contacts.
    #[must_use]
    pub fn new(normal: Vector3<f64>, offset: f64) -> Self {
        let len = normal.norm();
        let normal = if len > GEOM_EPSILON { normal / len } else { normal };
        Self { normal, offset }
    }

    /// Horizontal ground with +Z up at the given height.
    #[must_use]
    pub fn ground(height: f64) -> Self {
        Self::new(Vector3::z(), height)
    }

    /// Signed distance of a point above the boundary plane.
    #[must_use]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.offset
    }
}

/// Sphere–sphere and sphere–half-space overlap tests.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SphereGeometry {
    /// Static environment.
    pub environment: Vec<HalfSpace>,
}

impl SphereGeometry {
    /// Geometry with an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a half-space to the environment.
    #[must_use]
    pub fn with_half_space(mut self, half_space: HalfSpace) -> Self {
        self.environment.push(half_space);
        self
    }
}

/// Contact between two spheres, if they overlap.
///
/// The normal points from `s1` toward `s2`; it is zero for coincident centres.
#[must_use]
pub fn collide_sphere_sphere(
    s1: &Sphere,
    s2: &Sphere,
    feature1: usize,
    feature2: usize,
) -> Option<ContactGeometry> {
    let diff = s2.center - s1.center;
    let dist = diff.norm();
    let penetration = s1.radius + s2.radius - dist;

    if penetration <= 0.0 {
        return None;
    }

    let normal = if dist > GEOM_EPSILON {
        diff / dist
    } else {
        Vector3::zeros()
    };
    let point = s1.center + normal * (s1.radius - penetration * 0.5);
    Some(ContactGeometry::new(feature1, feature2, penetration, normal, point))
}

/// Contact between a sphere and a solid half-space, if they overlap.
///
/// The normal points from the sphere into the half-space.
#[must_use]
pub fn collide_sphere_half_space(
    sphere: &Sphere,
    half_space: &HalfSpace,
    feature: usize,
    half_space_index: usize,
) -> Option<ContactGeometry> {
    let distance = half_space.signed_distance(&sphere.center);
    let penetration = sphere.radius - distance;

    if penetration <= 0.0 {
        return None;
    }

    let normal = -half_space.normal;
    let point = sphere.center + normal * (sphere.radius - penetration * 0.5);
    Some(ContactGeometry::new(
        feature,
        half_space_index,
        penetration,
        normal,
        point,
    ))
}

impl<R: SphereSet + ?Sized> OverlapTest<R> for SphereGeometry {
    fn overlap_pair(&self, a: &R, b: &R, out: &mut ContactBuffer) {
        for i in 0..a.num_spheres() {
            let Some(sa) = a.sphere(i) else { continue };
            for j in 0..b.num_spheres() {
                let Some(sb) = b.sphere(j) else { continue };
                if let Some(contact) = collide_sphere_sphere(&sa, &sb, i, j) {
                    out.push(contact);
                }
            }
        }
    }

    fn overlap_environment(&self, body: &R, out: &mut ContactBuffer) {
        for i in 0..body.num_spheres() {
            let Some(sphere) = body.sphere(i) else {
                continue;
            };
            for (k, half_space) in self.environment.iter().enumerate() {
                if let Some(contact) = collide_sphere_half_space(&sphere, half_space, i, k) {
                    out.push(contact);
                }
            }
        }
    }
}
