//! # Protocol Constants
//!
//! Identifiers and time units shared by every peer.
//!
//! **CRITICAL:** These values are part of the wire contract.
//! Changing one requires every peer to be rebuilt.

// =============================================================================
// AUTHORITIES
// =============================================================================

/// Identifies a peer that can author field values.
pub type AuthorityId = u32;

/// No authority has been assigned yet.
pub const AUTHORITY_UNSET: AuthorityId = 0;

/// The server's authority id.
pub const AUTHORITY_SERVER: AuthorityId = u32::MAX;

// =============================================================================
// ENTITIES
// =============================================================================

/// Session-wide identity of a network-aware entity.
pub type NetworkId = u32;

// =============================================================================
// TIME
// =============================================================================

/// Monotonic timestamp unit used for receive times and history samples.
pub type Ticks = i64;

/// Number of ticks in one second (100ns resolution).
pub const TICKS_PER_SECOND: Ticks = 10_000_000;

/// Converts seconds to ticks, rounding to the nearest tick.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn seconds_to_ticks(seconds: f64) -> Ticks {
    (seconds * TICKS_PER_SECOND as f64).round() as Ticks
}

/// Converts ticks to seconds.
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ticks_to_seconds(ticks: Ticks) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_conversion() {
        assert_eq!(seconds_to_ticks(1.0), TICKS_PER_SECOND);
        assert_eq!(seconds_to_ticks(0.25), 2_500_000);
        assert!((ticks_to_seconds(5_000_000) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_authority_sentinels_differ() {
        assert_ne!(AUTHORITY_UNSET, AUTHORITY_SERVER);
    }
}
