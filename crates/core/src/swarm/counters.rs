//! # Swarm Counters
//!
//! Process-wide aggregates shared between the controller, every session
//! driver, and the reporter. All updates are lock-free read-modify-write
//! operations.
//!
//! `sessions_created` and `sessions_active` live in one 64-bit word (high
//! and low halves) so a single load always observes a pair that satisfies
//! `active <= created`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

const ACTIVE_MASK: u64 = 0xFFFF_FFFF;
const CREATED_ONE: u64 = 1 << 32;

fn created_of(word: u64) -> u32 {
    (word >> 32) as u32
}

fn active_of(word: u64) -> u32 {
    (word & ACTIVE_MASK) as u32
}

/// Shared, atomically updated swarm counters
#[derive(Debug, Default)]
pub struct SwarmCounters {
    /// created (high half) | active (low half)
    sessions: AtomicU64,
    failed: AtomicU32,
    world_units: AtomicU64,
}

impl SwarmCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an admitted session. Returns the new `sessions_created`.
    pub fn session_created(&self) -> u32 {
        let prev = self.sessions.fetch_add(CREATED_ONE, Ordering::AcqRel);
        created_of(prev) + 1
    }

    /// Record a session reaching `Active`.
    ///
    /// Refuses (returns `false`) if it would push active past created.
    pub fn session_joined(&self) -> bool {
        self.sessions
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                (active_of(word) < created_of(word)).then(|| word + 1)
            })
            .is_ok()
    }

    /// Record an active session leaving. Returns `false` if nothing was active.
    pub fn session_left(&self) -> bool {
        self.sessions
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                (active_of(word) > 0).then(|| word - 1)
            })
            .is_ok()
    }

    /// Record a session that failed before reaching `Active`
    pub fn session_failed(&self) {
        self.failed.fetch_add(1, Ordering::AcqRel);
    }

    /// Add received world-data units
    pub fn add_world_units(&self, units: u64) {
        self.world_units.fetch_add(units, Ordering::AcqRel);
    }

    /// `(sessions_created, sessions_active)` from one atomic load
    pub fn created_and_active(&self) -> (u32, u32) {
        let word = self.sessions.load(Ordering::Acquire);
        (created_of(word), active_of(word))
    }

    /// Immutable copy of the counters for the reporter
    pub fn snapshot(&self, target_count: u32) -> SwarmSnapshot {
        let (sessions_created, sessions_active) = self.created_and_active();
        SwarmSnapshot {
            sessions_created,
            sessions_active,
            sessions_failed: self.failed.load(Ordering::Acquire),
            world_units_loaded: self.world_units.load(Ordering::Acquire),
            target_count,
        }
    }
}

/// Point-in-time view of the swarm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmSnapshot {
    /// Sessions ever admitted (attempts, not successes)
    pub sessions_created: u32,
    /// Sessions currently in the `Active` state
    pub sessions_active: u32,
    /// Sessions that ended in `Failed`
    pub sessions_failed: u32,
    /// World-data units received across all sessions
    pub world_units_loaded: u64,
    /// Configured swarm size
    pub target_count: u32,
}

impl SwarmSnapshot {
    /// Sessions admitted but not currently active
    pub fn unconfirmed(&self) -> u32 {
        self.sessions_created.saturating_sub(self.sessions_active)
    }

    /// All sessions the swarm will ever admit have been admitted
    pub fn is_saturated(&self) -> bool {
        self.sessions_created >= self.target_count
    }
}
