//! Signed/unsigned conversion helpers for CBOR's negative-integer major type.
//!
//! CBOR's negative-integer major type encodes `n` such that the decoded
//! value is `-1 - n`; the two's-complement identity `~n == -n - 1` lets
//! that be computed without an intermediate that could overflow for
//! `n == u64::MAX` (which maps to `i64::MIN`).

/// Decode a CBOR negative-integer argument into a signed 64-bit value.
/// Returns `None` on overflow (argument `> u64::MAX as i64 range`, i.e.
/// anything that doesn't fit once negated).
pub fn cbor_negint_to_i64(arg: u64) -> Option<i64> {
    // value = -1 - arg. This fits in i64 exactly when arg <= i64::MAX as
    // u64 (arg == i64::MAX gives value == i64::MIN); anything larger
    // underflows i64 and is rejected rather than silently wrapping.
    if arg > i64::MAX as u64 {
        return None;
    }
    // `!n == -n - 1` in two's complement, so `-1 - arg == !(arg as i64)`.
    Some(!(arg as i64))
}

/// Encode a negative `i64` (must be `< 0`) as the CBOR negative-integer
/// argument `-1 - n`, i.e. `!n` via the two's-complement identity.
pub fn i64_to_cbor_negint_arg(n: i64) -> u64 {
    debug_assert!(n < 0);
    (!n) as u64
}
