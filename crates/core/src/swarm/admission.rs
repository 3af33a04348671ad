//! # Admission Policy
//!
//! Pure decision functions used by the controller's admission tick.

/// Decide whether one more session may be admitted.
///
/// Caps total swarm size at `target_count` and the number of sessions
/// created but not yet active at `buffer`.
pub fn should_admit(created: u32, active: u32, target_count: u32, buffer: u32) -> bool {
    created < target_count && created.saturating_sub(active) < buffer
}

/// Display name for the session with sequence number `seq` (0-based).
///
/// Zero-padded to at least four digits, widening past 9999.
pub fn session_name(prefix: &str, seq: u64) -> String {
    format!("{prefix}{seq:04}")
}
