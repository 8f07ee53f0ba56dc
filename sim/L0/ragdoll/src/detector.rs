//! Collision detection over the registered ragdolls.
//!
//! # Ordering
//!
//! Detection is deterministic for a fixed registry and geometric state:
//!
//! ```text
//! for i in registry order:
//!     for j after i in registry order:   test pair (i, j)
//!     test i against the environment
//! ```
//!
//! Within one test, records keep the order the geometry layer reported them.
//!
//! # Tolerance
//!
//! A degenerate contact (non-finite values or a zero-length normal) is
//! skipped on its own; the rest of the scene is still detected. Handles that
//! no longer resolve are skipped the same way.

use sim_types::{Collider, CollisionRecord, DetectionConfig, RagdollId};

use crate::arena::RagdollArena;
use crate::broad_phase::{Aabb, may_overlap};
use crate::geometry::{ContactBuffer, ContactCheck, OverlapTest};
use crate::ragdoll::Collidable;
use crate::warning::{Warning, WarningTable};

/// Bounded, ordered list of the current tick's collision records.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionList {
    records: Vec<CollisionRecord>,
    capacity: usize,
}

impl CollisionList {
    /// Create an empty list holding at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Maximum number of records.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the list is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// The records, in detection order.
    #[must_use]
    pub fn as_slice(&self) -> &[CollisionRecord] {
        &self.records
    }

    /// Append a record. Returns `false` (and drops it) when full.
    pub fn push(&mut self, record: CollisionRecord) -> bool {
        if self.is_full() {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Drop every record that references `id`.
    pub fn forget(&mut self, id: RagdollId) {
        self.records.retain(|r| !r.involves(id));
    }
}

/// Produces collision records for a registry of ragdolls.
#[derive(Debug, Clone)]
pub struct CollisionDetector {
    config: DetectionConfig,
    scratch: ContactBuffer,
}

impl Default for CollisionDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

/// A registered ragdoll resolved for the current pass.
struct Live<'a, R> {
    id: RagdollId,
    body: &'a R,
    bounds: Option<Aabb>,
}

impl CollisionDetector {
    /// Create a detector.
    #[must_use]
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            config,
            scratch: ContactBuffer::new(),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Replace `list` with the collisions between the registered ragdolls
    /// and between each ragdoll and the environment.
    ///
    /// Returns the number of records produced.
    pub fn detect<R, G>(
        &mut self,
        registry: &[RagdollId],
        arena: &RagdollArena<R>,
        geometry: &G,
        list: &mut CollisionList,
        warnings: &mut WarningTable,
    ) -> usize
    where
        R: Collidable,
        G: OverlapTest<R> + ?Sized,
    {
        list.clear();

        let mut live = Vec::with_capacity(registry.len());
        for &id in registry {
            match arena.get(id) {
                Some(body) => live.push(Live {
                    id,
                    body,
                    bounds: body.bounding_box(),
                }),
                None => warnings.raise(Warning::StaleHandle, id.to_bits()),
            }
        }

        let mut pairs_tested = 0usize;
        'outer: for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                if !may_overlap(a.bounds.as_ref(), b.bounds.as_ref(), self.config.margin) {
                    continue;
                }
                pairs_tested += 1;
                self.scratch.clear();
                geometry.overlap_pair(a.body, b.body, &mut self.scratch);
                if !Self::collect(&self.scratch, a.id, Collider::Ragdoll(b.id), list, warnings) {
                    break 'outer;
                }
            }

            self.scratch.clear();
            geometry.overlap_environment(a.body, &mut self.scratch);
            if !Self::collect(&self.scratch, a.id, Collider::Environment, list, warnings) {
                break;
            }
        }

        tracing::debug!(
            ragdolls = live.len(),
            pairs_tested,
            records = list.len(),
            "collision detection"
        );
        list.len()
    }

    /// Validate contacts and append them. Returns `false` once the list is full.
    fn collect(
        contacts: &ContactBuffer,
        body_a: RagdollId,
        body_b: Collider,
        list: &mut CollisionList,
        warnings: &mut WarningTable,
    ) -> bool {
        for contact in contacts {
            let normal = match contact.check() {
                ContactCheck::Valid { normal } => normal,
                ContactCheck::Separated => continue,
                ContactCheck::Degenerate => {
                    warnings.raise(Warning::DegenerateContact, body_a.to_bits());
                    continue;
                }
            };

            let record = CollisionRecord::new(body_a, body_b, contact.depth, normal, contact.point)
                .with_features(contact.feature_a, contact.feature_b);
            if !list.push(record) {
                warnings.raise(Warning::CollisionListFull, list.capacity() as u64);
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::ContactGeometry;
    use crate::particle::ParticleRagdoll;
    use crate::sphere::{HalfSpace, SphereGeometry};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn ball(x: f64, z: f64) -> ParticleRagdoll {
        let mut doll = ParticleRagdoll::new();
        doll.add_particle(Point3::new(x, 0.0, z), 1.0, 0.5);
        doll
    }

    fn run(
        registry: &[RagdollId],
        arena: &RagdollArena<ParticleRagdoll>,
        geometry: &SphereGeometry,
        capacity: usize,
    ) -> (CollisionList, WarningTable) {
        let mut detector = CollisionDetector::default();
        let mut list = CollisionList::new(capacity);
        let mut warnings = WarningTable::new();
        detector.detect(registry, arena, geometry, &mut list, &mut warnings);
        (list, warnings)
    }

    #[test]
    fn test_pair_then_environment_order() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 0.4));
        let b = arena.insert(ball(0.9, 0.4));
        let geometry = SphereGeometry::new().with_half_space(HalfSpace::ground(0.0));

        let (list, _) = run(&[a, b], &arena, &geometry, 16);
        let records = list.as_slice();
        assert_eq!(records.len(), 3);

        // a-b, a-env, b-env
        assert_eq!(records[0].body_a, a);
        assert_eq!(records[0].body_b, Collider::Ragdoll(b));
        assert_eq!(records[1].body_a, a);
        assert!(records[1].is_environment());
        assert_eq!(records[2].body_a, b);
        assert!(records[2].is_environment());
    }

    #[test]
    fn test_registry_order_is_authoritative() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 5.0));
        let b = arena.insert(ball(0.9, 5.0));

        let (list, _) = run(&[b, a], &arena, &SphereGeometry::new(), 16);
        let record = list.as_slice()[0];
        assert_eq!(record.body_a, b);
        assert_eq!(record.body_b, Collider::Ragdoll(a));
        assert_relative_eq!(record.normal.x, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_broad_phase_culls_distant_pairs() {
        struct Counting<'a>(&'a std::cell::Cell<usize>);
        impl OverlapTest<ParticleRagdoll> for Counting<'_> {
            fn overlap_pair(
                &self,
                _: &ParticleRagdoll,
                _: &ParticleRagdoll,
                _: &mut ContactBuffer,
            ) {
                self.0.set(self.0.get() + 1);
            }
        }

        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 0.0));
        let b = arena.insert(ball(10.0, 0.0));
        let c = arena.insert(ball(0.8, 0.0));

        let calls = std::cell::Cell::new(0);
        let mut detector = CollisionDetector::default();
        let mut list = CollisionList::new(16);
        let mut warnings = WarningTable::new();
        let geometry = Counting(&calls);
        detector.detect(&[a, b, c], &arena, &geometry, &mut list, &mut warnings);

        // Only a-c survives the AABB test
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_degenerate_contact_skipped_rest_kept() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 5.0));
        let b = arena.insert(ball(0.0, 5.0)); // coincident with a
        let c = arena.insert(ball(0.9, 5.0));

        let (list, warnings) = run(&[a, b, c], &arena, &SphereGeometry::new(), 16);

        // a-b degenerate; a-c and b-c valid
        assert_eq!(list.len(), 2);
        assert_eq!(warnings.count(Warning::DegenerateContact), 1);
        for r in list.as_slice() {
            assert!(r.depth > 0.0);
            assert_relative_eq!(r.normal.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_stale_handle_skipped() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 0.0));
        let b = arena.insert(ball(0.9, 0.0));
        arena.remove(b);

        let (list, warnings) = run(&[a, b], &arena, &SphereGeometry::new(), 16);
        assert!(list.is_empty());
        assert_eq!(warnings.count(Warning::StaleHandle), 1);
    }

    #[test]
    fn test_capacity_limit() {
        let mut arena = RagdollArena::new();
        let ids: Vec<_> = (0..4).map(|_| arena.insert(ball(0.0, 0.3))).collect();
        let geometry = SphereGeometry::new().with_half_space(HalfSpace::ground(0.0));

        let (list, warnings) = run(&ids, &arena, &geometry, 2);
        assert_eq!(list.len(), 2);
        assert!(list.is_full());
        assert_eq!(warnings.count(Warning::CollisionListFull), 1);
    }

    #[test]
    fn test_previous_records_discarded() {
        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 0.0));
        let mut list = CollisionList::new(8);
        list.push(CollisionRecord::new(
            a,
            Collider::Environment,
            1.0,
            Vector3::z(),
            Point3::origin(),
        ));

        let mut detector = CollisionDetector::default();
        let mut warnings = WarningTable::new();
        let geometry = SphereGeometry::new();
        let count = detector.detect(&[a], &arena, &geometry, &mut list, &mut warnings);
        assert_eq!(count, 0);
        assert!(list.is_empty());
    }

    #[test]
    fn test_non_positive_depth_is_not_an_overlap() {
        struct Grazing;
        impl OverlapTest<ParticleRagdoll> for Grazing {
            fn overlap_pair(
                &self,
                _: &ParticleRagdoll,
                _: &ParticleRagdoll,
                out: &mut ContactBuffer,
            ) {
                out.push(ContactGeometry::new(
                    0,
                    0,
                    0.0,
                    Vector3::x(),
                    Point3::origin(),
                ));
            }
        }

        let mut arena = RagdollArena::new();
        let a = arena.insert(ball(0.0, 0.0));
        let b = arena.insert(ball(0.9, 0.0));
        let mut detector = CollisionDetector::default();
        let mut list = CollisionList::new(8);
        let mut warnings = WarningTable::new();
        detector.detect(&[a, b], &arena, &Grazing, &mut list, &mut warnings);

        assert!(list.is_empty());
        assert!(!warnings.any());
    }

    #[test]
    fn test_forget_drops_records() {
        let a = RagdollId::from_bits(1);
        let b = RagdollId::from_bits(2);
        let mut list = CollisionList::new(8);
        list.push(CollisionRecord::new(
            a,
            Collider::Ragdoll(b),
            0.1,
            Vector3::x(),
            Point3::origin(),
        ));
        list.push(CollisionRecord::new(
            a,
            Collider::Environment,
            0.1,
            Vector3::z(),
            Point3::origin(),
        ));

        list.forget(b);
        assert_eq!(list.len(), 1);
        assert!(list.as_slice()[0].is_environment());
    }
}
