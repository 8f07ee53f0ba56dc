//! Non-owning handles to caller-owned ragdolls.
//!
//! A [`RagdollId`] is a [`slotmap`] key. The slot index locates the ragdoll
//! inside its arena; the version is bumped every time a slot is reused, so a
//! handle kept past its ragdoll's removal never resolves to a different
//! ragdoll. [`RagdollId::default`] is the null key and never resolves.

use slotmap::{Key, KeyData, new_key_type};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

new_key_type! {
    /// Handle to a ragdoll stored in a caller-owned arena.
    pub struct RagdollId;
}

impl RagdollId {
    /// Packed index and version, as carried in logs and warning payloads.
    #[must_use]
    pub fn to_bits(self) -> u64 {
        self.data().as_ffi()
    }

    /// Rebuild a handle from [`to_bits`](Self::to_bits).
    ///
    /// A handle built from arbitrary bits is valid to compare and look up
    /// but only resolves if the arena issued it.
    #[must_use]
    pub fn from_bits(bits: u64) -> Self {
        KeyData::from_ffi(bits).into()
    }
}

impl std::fmt::Display for RagdollId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "Ragdoll(null)")
        } else {
            write!(f, "Ragdoll({:?})", self.data())
        }
    }
}

/// The second participant of a collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Collider {
    /// Another registered ragdoll.
    Ragdoll(RagdollId),
    /// The static environment. Immovable.
    Environment,
}

impl Collider {
    /// The ragdoll handle, if this collider is a ragdoll.
    #[must_use]
    pub const fn ragdoll(self) -> Option<RagdollId> {
        match self {
            Self::Ragdoll(id) => Some(id),
            Self::Environment => None,
        }
    }

    /// Whether this collider is the static environment.
    #[must_use]
    pub const fn is_environment(self) -> bool {
        matches!(self, Self::Environment)
    }

    /// Whether this collider refers to the given ragdoll.
    #[must_use]
    pub fn refers_to(self, id: RagdollId) -> bool {
        self == Self::Ragdoll(id)
    }
}

impl From<RagdollId> for Collider {
    fn from(id: RagdollId) -> Self {
        Self::Ragdoll(id)
    }
}
