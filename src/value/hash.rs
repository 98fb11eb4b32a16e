//! Multiplicative hashing used by `Value::long_hash`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// 2^64 divided by the golden ratio, rounded to odd.
pub const GOLDEN_RATIO_64: u64 = 0x9e37_79b9_7f4a_7c13;

pub(super) const SEED: i64 = GOLDEN_RATIO_64 as i64;
pub(super) const NULL_HASH: i64 = 0;

pub(super) fn hash_long(v: i64) -> i64 {
    (v as u64).wrapping_mul(GOLDEN_RATIO_64) as i64
}

/// Integral doubles hash like the equal long.
pub(super) fn hash_double(v: f64) -> i64 {
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        hash_long(v as i64)
    } else {
        hash_long(v.to_bits() as i64)
    }
}

/// Scale-insensitive: `1.0` and `1.00` hash the same, and integral decimals
/// hash like the equal long.
pub(super) fn hash_decimal(v: Decimal) -> i64 {
    let normalized = v.normalize();
    if normalized.scale() == 0 {
        if let Some(long) = normalized.to_i64() {
            return hash_long(long);
        }
    }
    hash_bytes(&normalized.serialize())
}

pub(super) fn hash_bytes(bytes: &[u8]) -> i64 {
    let mut h = GOLDEN_RATIO_64;
    for b in bytes {
        h ^= u64::from(*b);
        h = h.wrapping_mul(GOLDEN_RATIO_64);
    }
    h as i64
}

pub(super) fn combine(h: i64, next: i64) -> i64 {
    ((h as u64 ^ next as u64).wrapping_mul(GOLDEN_RATIO_64)) as i64
}
