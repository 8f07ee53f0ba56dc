//! Warning tracking for pipeline diagnostics.
//!
//! The pipeline tolerates bad input rather than failing: stale handles,
//! degenerate contacts and a full collision list are skipped. Each kind is
//! counted per engine and logged only on its first occurrence since the last
//! [`WarningTable::reset`]. There is no process-wide state.

use sim_types::RagdollId;

/// Warning kinds raised by the pipeline.
/// `repr(u8)` for compact storage; cast to `usize` for array indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Warning {
    /// A registered handle no longer resolves in the arena.
    StaleHandle = 0,
    /// The geometry layer produced a contact with a bad normal, depth or point.
    DegenerateContact = 1,
    /// The collision list reached capacity; later contacts were dropped.
    CollisionListFull = 2,
    /// A ragdoll reported a NaN or infinite constraint violation.
    NonFiniteViolation = 3,
}

/// Number of warning kinds.
pub const NUM_WARNINGS: usize = 4;

impl Warning {
    /// All warning kinds, in index order.
    pub const ALL: [Self; NUM_WARNINGS] = [
        Self::StaleHandle,
        Self::DegenerateContact,
        Self::CollisionListFull,
        Self::NonFiniteViolation,
    ];
}

/// Per-warning statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarningStat {
    /// Detail of the latest occurrence: packed handle bits
    /// ([`RagdollId::to_bits`]) or a record count.
    pub last_info: u64,
    /// Cumulative count since last reset.
    pub count: u64,
}

/// Format a warning message for display.
fn warning_text(warning: Warning, info: u64) -> String {
    let ragdoll = RagdollId::from_bits(info);
    match warning {
        Warning::StaleHandle => {
            format!("registered {ragdoll} no longer exists; deregister before destroying")
        }
        Warning::DegenerateContact => format!("degenerate contact skipped for {ragdoll}"),
        Warning::CollisionListFull => {
            format!("collision list full ({info} records); further contacts dropped")
        }
        Warning::NonFiniteViolation => format!("non-finite constraint violation from {ragdoll}"),
    }
}

/// Engine-local warning counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarningTable {
    stats: [WarningStat; NUM_WARNINGS],
}

impl WarningTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it on first occurrence only.
    pub fn raise(&mut self, warning: Warning, info: u64) {
        let w = &mut self.stats[warning as usize];
        if w.count == 0 {
            tracing::warn!("{}", warning_text(warning, info));
        }
        w.last_info = info;
        w.count += 1;
    }

    /// Statistics for one warning kind.
    #[must_use]
    pub fn get(&self, warning: Warning) -> WarningStat {
        self.stats[warning as usize]
    }

    /// Occurrences of one warning kind since the last reset.
    #[must_use]
    pub fn count(&self, warning: Warning) -> u64 {
        self.stats[warning as usize].count
    }

    /// Whether any warning was raised since the last reset.
    #[must_use]
    pub fn any(&self) -> bool {
        self.stats.iter().any(|w| w.count > 0)
    }

    /// Clear all counters so the next occurrence of each kind logs again.
    pub fn reset(&mut self) {
        self.stats = [WarningStat::default(); NUM_WARNINGS];
    }
}
