//! Caller-owned ragdoll storage keyed by [`RagdollId`].
//!
//! The engine only stores handles. Ragdoll data lives in a [`SlotMap`] and is
//! handed to each pipeline call, so the caller keeps full ownership between
//! ticks. Freed slots are reused with a bumped version: a stale handle
//! resolves to `None` rather than to whichever ragdoll took its slot.

use slotmap::SlotMap;

use sim_types::RagdollId;

/// Caller-owned storage for ragdolls.
///
/// # Example
///
/// ```
/// use sim_ragdoll::{ParticleRagdoll, RagdollArena};
///
/// let mut arena = RagdollArena::new();
/// let id = arena.insert(ParticleRagdoll::new());
/// assert!(arena.contains(id));
///
/// let doll = arena.remove(id);
/// assert!(doll.is_some());
/// assert!(arena.get(id).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct RagdollArena<R> {
    slots: SlotMap<RagdollId, R>,
}

impl<R> Default for RagdollArena<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> RagdollArena<R> {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
        }
    }

    /// Create an empty arena with room for `capacity` ragdolls.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }

    /// Insert a ragdoll and return its handle.
    pub fn insert(&mut self, ragdoll: R) -> RagdollId {
        self.slots.insert(ragdoll)
    }

    /// Remove a ragdoll, returning it if the handle was live.
    pub fn remove(&mut self, id: RagdollId) -> Option<R> {
        self.slots.remove(id)
    }

    /// Look up a ragdoll.
    #[must_use]
    pub fn get(&self, id: RagdollId) -> Option<&R> {
        self.slots.get(id)
    }

    /// Look up a ragdoll mutably.
    #[must_use]
    pub fn get_mut(&mut self, id: RagdollId) -> Option<&mut R> {
        self.slots.get_mut(id)
    }

    /// Whether the handle refers to a live ragdoll.
    #[must_use]
    pub fn contains(&self, id: RagdollId) -> bool {
        self.slots.contains_key(id)
    }

    /// Number of live ragdolls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena holds no ragdolls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over live ragdolls in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (RagdollId, &R)> {
        self.slots.iter()
    }
}
