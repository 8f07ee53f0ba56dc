//! The simulation engine: registry plus the per-tick pipeline.
//!
//! The engine does not own ragdolls. It keeps an ordered registry of
//! [`RagdollId`] handles into a caller-owned [`RagdollArena`] and runs three
//! stages against it:
//!
//! ```text
//! compute_collisions  →  process_collisions  →  enforce_constraints
//!      (detect)              (resolve)               (relax)
//! ```
//!
//! Each stage can be called on its own; [`SimulationEngine::step`] runs all
//! three with the configured budget. Registry order is the processing order
//! of every stage.

use std::time::Duration;

use sim_types::{
    CollisionRecord, EnforcementBudget, EnforcementStats, EngineConfig, Key, RagdollId, Result,
};

use crate::arena::RagdollArena;
use crate::detector::{CollisionDetector, CollisionList};
use crate::geometry::OverlapTest;
use crate::ragdoll::{Collidable, Ragdoll, Relaxable};
use crate::resolver::CollisionResolver;
use crate::solver::ConstraintEnforcer;
use crate::warning::{Warning, WarningStat, WarningTable};

/// Outcome of one full tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    /// Collision records produced by detection.
    pub collisions: usize,
    /// Constraint enforcement statistics.
    pub stats: EnforcementStats,
}

/// Ragdoll simulation engine.
///
/// # Example
///
/// ```
/// use sim_ragdoll::{HalfSpace, ParticleRagdoll, RagdollArena, SimulationEngine, SphereGeometry};
/// use nalgebra::Point3;
///
/// let mut arena = RagdollArena::new();
/// let doll = ParticleRagdoll::chain(
///     Point3::new(0.0, 0.0, 0.05),
///     Point3::new(0.0, 0.0, 1.05),
///     3,
///     1.0,
///     0.1,
/// );
/// let id = arena.insert(doll);
///
/// let mut engine = SimulationEngine::new();
/// assert!(engine.add_ragdoll(id));
///
/// let ground = SphereGeometry::new().with_half_space(HalfSpace::ground(0.0));
/// let report = engine.step(&mut arena, &ground);
///
/// assert_eq!(report.collisions, 1);
/// assert!(report.stats.iterations >= 1);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationEngine {
    config: EngineConfig,
    registry: Vec<RagdollId>,
    collisions: CollisionList,
    last_enforcement: Option<EnforcementStats>,
    detector: CollisionDetector,
    resolver: CollisionResolver,
    warnings: WarningTable,
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::from_valid_config(EngineConfig::default())
    }
}

impl SimulationEngine {
    /// Create an engine with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: EngineConfig) -> Self {
        Self {
            registry: Vec::new(),
            collisions: CollisionList::new(config.detection.max_collisions),
            last_enforcement: None,
            detector: CollisionDetector::new(config.detection),
            resolver: CollisionResolver::new(config.resolution),
            warnings: WarningTable::new(),
            config,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ==================== Registry ====================

    /// Register a ragdoll.
    ///
    /// Returns `true` if the handle is registered after the call, whether it
    /// was just added or already present. The null handle is rejected.
    pub fn add_ragdoll(&mut self, id: RagdollId) -> bool {
        if id.is_null() {
            return false;
        }
        if !self.registry.contains(&id) {
            self.registry.push(id);
            tracing::debug!(ragdoll = %id, count = self.registry.len(), "ragdoll registered");
        }
        true
    }

    /// Deregister a ragdoll. Unknown and null handles are ignored.
    ///
    /// Collision records referencing the ragdoll are dropped from the
    /// current list.
    pub fn remove_ragdoll(&mut self, id: RagdollId) {
        if let Some(pos) = self.registry.iter().position(|&r| r == id) {
            self.registry.remove(pos);
            self.collisions.forget(id);
            tracing::debug!(ragdoll = %id, count = self.registry.len(), "ragdoll deregistered");
        }
    }

    /// Whether a handle is registered.
    #[must_use]
    pub fn contains_ragdoll(&self, id: RagdollId) -> bool {
        self.registry.contains(&id)
    }

    /// Registered handles in processing order.
    #[must_use]
    pub fn ragdolls(&self) -> &[RagdollId] {
        &self.registry
    }

    /// Number of registered ragdolls.
    #[must_use]
    pub fn num_ragdolls(&self) -> usize {
        self.registry.len()
    }

    /// Deregister every handle that no longer resolves in `arena`.
    ///
    /// Returns the number of handles removed.
    pub fn prune_stale<R>(&mut self, arena: &RagdollArena<R>) -> usize {
        let stale: Vec<RagdollId> = self
            .registry
            .iter()
            .copied()
            .filter(|&id| !arena.contains(id))
            .collect();
        for &id in &stale {
            self.remove_ragdoll(id);
        }
        stale.len()
    }

    // ==================== Pipeline ====================

    /// Replace the collision list with the current overlaps.
    ///
    /// Returns the number of records produced.
    pub fn compute_collisions<R, G>(&mut self, arena: &RagdollArena<R>, geometry: &G) -> usize
    where
        R: Collidable,
        G: OverlapTest<R> + ?Sized,
    {
        self.detector.detect(
            &self.registry,
            arena,
            geometry,
            &mut self.collisions,
            &mut self.warnings,
        )
    }

    /// Apply corrections for every record in the collision list, in order.
    ///
    /// The list itself is left unchanged.
    pub fn process_collisions<R: Collidable>(&mut self, arena: &mut RagdollArena<R>) {
        self.resolver
            .resolve(self.collisions.as_slice(), arena, &mut self.warnings);
    }

    /// Relax the registered ragdolls until the error drops to `min_error`,
    /// `max_iterations` passes have run, or `max_usec` microseconds have
    /// elapsed.
    ///
    /// Results are read back through [`enforcement_iterations`],
    /// [`enforcement_error`] and [`enforcement_time`].
    ///
    /// [`enforcement_iterations`]: Self::enforcement_iterations
    /// [`enforcement_error`]: Self::enforcement_error
    /// [`enforcement_time`]: Self::enforcement_time
    pub fn enforce_constraints<R: Relaxable>(
        &mut self,
        arena: &mut RagdollArena<R>,
        min_error: f64,
        max_iterations: usize,
        max_usec: u64,
    ) {
        let budget = EnforcementBudget::new(min_error, max_iterations, max_usec);
        self.enforce_with_budget(arena, &budget);
    }

    /// Relax the registered ragdolls under an explicit budget.
    pub fn enforce_with_budget<R: Relaxable>(
        &mut self,
        arena: &mut RagdollArena<R>,
        budget: &EnforcementBudget,
    ) -> EnforcementStats {
        let stats =
            ConstraintEnforcer::new(*budget).enforce(&self.registry, arena, &mut self.warnings);
        self.last_enforcement = Some(stats);
        stats
    }

    /// Run detection, resolution and enforcement with the configured budget.
    pub fn step<R, G>(&mut self, arena: &mut RagdollArena<R>, geometry: &G) -> TickReport
    where
        R: Ragdoll,
        G: OverlapTest<R> + ?Sized,
    {
        let collisions = self.compute_collisions(arena, geometry);
        self.process_collisions(arena);
        let budget = self.config.budget;
        let stats = self.enforce_with_budget(arena, &budget);
        TickReport { collisions, stats }
    }

    // ==================== Results ====================

    /// Current collision records, in detection order.
    #[must_use]
    pub fn collisions(&self) -> &[CollisionRecord] {
        self.collisions.as_slice()
    }

    /// Passes performed by the last enforcement call (0 before any call).
    #[must_use]
    pub fn enforcement_iterations(&self) -> usize {
        self.last_enforcement.map_or(0, |s| s.iterations)
    }

    /// Residual error after the last enforcement call (0 before any call).
    #[must_use]
    pub fn enforcement_error(&self) -> f64 {
        self.last_enforcement.map_or(0.0, |s| s.error)
    }

    /// Time spent in the last enforcement call (zero before any call).
    #[must_use]
    pub fn enforcement_time(&self) -> Duration {
        self.last_enforcement.map_or(Duration::ZERO, |s| s.elapsed)
    }

    /// Full statistics of the last enforcement call.
    #[must_use]
    pub fn last_enforcement(&self) -> Option<&EnforcementStats> {
        self.last_enforcement.as_ref()
    }

    // ==================== Warnings ====================

    /// Warning counters.
    #[must_use]
    pub fn warnings(&self) -> &WarningTable {
        &self.warnings
    }

    /// Occurrences of a warning since the last reset.
    #[must_use]
    pub fn warning_count(&self, warning: Warning) -> u64 {
        self.warnings.count(warning)
    }

    /// Latest occurrence details of a warning.
    #[must_use]
    pub fn warning(&self, warning: Warning) -> WarningStat {
        self.warnings.get(warning)
    }

    /// Clear warning counters; the next occurrence of each kind logs again.
    pub fn reset_warnings(&mut self) {
        self.warnings.reset();
    }
}
