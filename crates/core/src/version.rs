//! Row version tokens.
//!
//! Every registry transition stamps `updated_at` with a fresh token. Mutators
//! pass back the token they last observed and the registry rejects the write
//! when it no longer matches. Tokens are truncated to microseconds so they
//! compare equal after a round-trip through any supported database.

use time::{Duration, OffsetDateTime, UtcOffset};

/// Produce the token for the next version of a row.
///
/// The result is never earlier than `now` (after truncation) and always
/// strictly later than `previous`, so two transitions within the same
/// microsecond still yield distinct tokens.
pub fn next_version(previous: Option<OffsetDateTime>, now: OffsetDateTime) -> OffsetDateTime {
    let candidate = truncate_to_micros(now.to_offset(UtcOffset::UTC));
    match previous {
        Some(prev) if candidate <= prev => truncate_to_micros(prev) + Duration::microseconds(1),
        _ => candidate,
    }
}

/// Drop sub-microsecond precision.
pub fn truncate_to_micros(t: OffsetDateTime) -> OffsetDateTime {
    t - Duration::nanoseconds(i64::from(t.nanosecond() % 1_000))
}
