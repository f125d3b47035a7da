//! Simulation time helpers

pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Combine an OSI `Timestamp { seconds, nanos }` into nanoseconds.
///
/// Negative components (invalid in OSI but representable on the wire) yield
/// `None`, as does overflow.
pub fn timestamp_ns(seconds: i64, nanos: u32) -> Option<u64> {
    let seconds = u64::try_from(seconds).ok()?;
    seconds
        .checked_mul(NANOS_PER_SECOND)?
        .checked_add(u64::from(nanos))
}
