//! CPython-compatible hash helpers used for deterministic hashing.
//!
//! Hashing is deterministic and equivalent to `PYTHONHASHSEED=0`. CPython
//! hashes text/bytes with SipHash-1-3 and a zeroed key under that seed; these
//! helpers expose that behavior for the generic hash fallback.
//!
//! ## Cross-type hash invariant
//!
//! CPython guarantees that if `a == b`, then `hash(a) == hash(b)`. Since
//! `0 == 0.0 == False` and `1 == 1.0 == True`, the hash functions for int,
//! float, and bool must produce identical values for equivalent inputs.
//! [`cpython_hash_int`], [`cpython_hash_bigint`] and [`cpython_hash_float`]
//! implement the same Mersenne-prime modular algorithm used by CPython's
//! `Objects/longobject.c` and `Objects/floatobject.c`.
//!
//! All helpers return the signed Python hash value (what `hash(x)` prints).

use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Mersenne prime used by CPython for numeric hashing: `2^61 - 1`.
///
/// All numeric types hash modulo this prime so that equal values across
/// types produce identical hashes.
pub const MODULUS: i64 = (1 << 61) - 1;

/// Hash of positive infinity (`sys.hash_info.inf`).
pub const HASH_INF: i64 = 314_159;

/// Hash of NaN (`sys.hash_info.nan`, 0 since CPython 3.10 for the shared fallback).
pub const HASH_NAN: i64 = 0;

/// Hash of `None` (`_Py_HashNone` constant since CPython 3.12).
pub const HASH_NONE: i64 = 0xFCA8_6420;

/// Hashes raw bytes using CPython's `PYTHONHASHSEED=0` SipHash-1-3 behavior.
///
/// This applies CPython's two key conventions:
/// - empty input hashes to `0`
/// - a computed hash of `-1` is remapped to `-2`
#[must_use]
pub fn cpython_hash_bytes_seed0(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let signed = siphash13_with_seed0(bytes) as i64;
    if signed == -1 { -2 } else { signed }
}

/// Hashes string content with CPython's deterministic seed-0 algorithm.
///
/// CPython hashes the compact representation, not UTF-8: one byte per
/// code point when every character is Latin-1, two bytes when every
/// character is in the BMP, four bytes otherwise.
#[must_use]
pub fn cpython_hash_str_seed0(value: &str) -> i64 {
    let max = value.chars().map(u32::from).max().unwrap_or(0);
    if max < 0x80 {
        return cpython_hash_bytes_seed0(value.as_bytes());
    }
    let bytes: Vec<u8> = if max <= 0xFF {
        value.chars().map(|c| u32::from(c) as u8).collect()
    } else if max <= 0xFFFF {
        value
            .chars()
            .flat_map(|c| (u32::from(c) as u16).to_ne_bytes())
            .collect()
    } else {
        value.chars().flat_map(|c| u32::from(c).to_ne_bytes()).collect()
    };
    cpython_hash_bytes_seed0(&bytes)
}

/// Hashes a signed 64-bit integer using CPython's modular algorithm.
///
/// The algorithm is `n % MODULUS` (sign-preserving), with the special case
/// that a result of `-1` is remapped to `-2` (CPython reserves `-1` as an
/// internal error sentinel in C). This matches CPython's `long_hash` in
/// `Objects/longobject.c`.
#[must_use]
pub fn cpython_hash_int(value: i64) -> i64 {
    if value == 0 {
        return 0;
    }
    let sign: i64 = if value < 0 { -1 } else { 1 };
    // i64::MIN has no positive counterpart, so reduce the unsigned magnitude.
    let remainder = (value.unsigned_abs() % MODULUS as u64) as i64;
    let result = sign * remainder;
    if result == -1 { -2 } else { result }
}

/// Hashes an arbitrary-precision integer with the same modular algorithm.
#[must_use]
pub fn cpython_hash_bigint(value: &BigInt) -> i64 {
    if let Some(i) = value.to_i64() {
        return cpython_hash_int(i);
    }
    // BigInt `%` truncates toward zero, so the remainder keeps the sign of the
    // dividend exactly as `long_hash` does.
    let remainder = value % BigInt::from(MODULUS);
    let result = remainder.to_i64().unwrap_or(0);
    if result == -1 { -2 } else { result }
}

/// Hashes an `f64` using CPython's float hashing algorithm.
///
/// For integral float values (like `1.0`, `42.0`), this delegates to
/// [`cpython_hash_int`] so that `hash(n) == hash(float(n))` holds. For
/// non-integral floats it uses a `frexp`-based decomposition identical to
/// CPython's `_Py_HashDouble` in `Python/pyhash.c`.
///
/// Special values:
/// - `+inf` hashes to `314159`
/// - `-inf` hashes to `-314159`
/// - `NaN` hashes to `0`
#[must_use]
pub fn cpython_hash_float(value: f64) -> i64 {
    if value.is_infinite() {
        return if value > 0.0 { HASH_INF } else { -HASH_INF };
    }
    if value.is_nan() {
        return HASH_NAN;
    }

    // 2^63 itself is not an i64, so the upper bound is exclusive.
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    let truncated = value.trunc();
    if value == truncated && (-TWO_POW_63..TWO_POW_63).contains(&truncated) {
        return cpython_hash_int(truncated as i64);
    }

    let (frac, exp) = frexp(value);
    let mut m = frac;
    let mut e = exp;

    let sign: i64 = if m < 0.0 {
        m = -m;
        -1
    } else {
        1
    };

    // Process the mantissa bits in 28-bit chunks (matching CPython).
    let modulus = MODULUS as u64;
    let mut x: u64 = 0;
    while m > 0.0 {
        x = ((x << 28) & modulus) | (x >> 33);
        m *= 268_435_456.0; // 2^28
        e -= 28;
        let w = m as u64;
        m -= w as f64;
        x = x.wrapping_add(w);
        if x >= modulus {
            x -= modulus;
        }
    }

    e = e.rem_euclid(61);
    x = ((x << e as u32) & modulus) | (x >> (61 - e) as u32);

    let result = (sign * x as i64) % MODULUS;
    if result == -1 { -2 } else { result }
}

/// Combines already-computed element hashes with CPython's xxHash-based tuple hash.
///
/// Used for values whose CPython hash is defined through a tuple of their
/// components (e.g. `range` hashes `(len, start, step)`).
#[must_use]
pub fn cpython_tuple_hash(lanes: &[i64]) -> i64 {
    const XXPRIME_1: u64 = 11_400_714_785_074_694_791;
    const XXPRIME_2: u64 = 14_029_467_366_897_019_727;
    const XXPRIME_5: u64 = 2_870_177_450_012_600_261;
    const TUPLE_HASH_SUFFIX: u64 = 3_527_539;

    let mut acc = XXPRIME_5;
    for &lane in lanes {
        acc = acc.wrapping_add((lane as u64).wrapping_mul(XXPRIME_2));
        acc = acc.rotate_left(31);
        acc = acc.wrapping_mul(XXPRIME_1);
    }
    acc = acc.wrapping_add((lanes.len() as u64) ^ (XXPRIME_5 ^ TUPLE_HASH_SUFFIX));
    if acc == u64::MAX {
        acc = 1_546_275_796;
    }
    acc as i64
}

/// Returns `(frac, exp)` such that `value == frac * 2^exp` with `0.5 <= |frac| < 1.0`.
///
/// This is equivalent to C's `frexp()` and Python's `math.frexp()`.
fn frexp(value: f64) -> (f64, i32) {
    if value == 0.0 || value.is_nan() || value.is_infinite() {
        return (value, 0);
    }
    let bits = value.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32;
    if exponent == 0 {
        // Subnormal: scale by 2^64 to normalize, then adjust exponent
        let normalized = value * 18_446_744_073_709_551_616.0;
        let (frac, exp) = frexp(normalized);
        return (frac, exp - 64);
    }
    let frac_bits = (bits & 0x800F_FFFF_FFFF_FFFF) | 0x3FE0_0000_0000_0000;
    (f64::from_bits(frac_bits), exponent - 1022)
}

/// Computes SipHash-1-3 with a zero key, matching CPython seed-0 parameters.
fn siphash13_with_seed0(bytes: &[u8]) -> u64 {
    let mut v0: u64 = 0x736f_6d65_7073_6575;
    let mut v1: u64 = 0x646f_7261_6e64_6f6d;
    let mut v2: u64 = 0x6c79_6765_6e65_7261;
    let mut v3: u64 = 0x7465_6462_7974_6573;

    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let mut block = [0_u8; 8];
        block.copy_from_slice(chunk);
        let message = u64::from_le_bytes(block);
        v3 ^= message;
        sip_round(&mut v0, &mut v1, &mut v2, &mut v3);
        v0 ^= message;
    }

    let mut tail = (bytes.len() as u64) << 56;
    for (index, byte) in chunks.remainder().iter().copied().enumerate() {
        tail |= u64::from(byte) << (index * 8);
    }

    v3 ^= tail;
    sip_round(&mut v0, &mut v1, &mut v2, &mut v3);
    v0 ^= tail;
    v2 ^= 0xff;
    sip_round(&mut v0, &mut v1, &mut v2, &mut v3);
    sip_round(&mut v0, &mut v1, &mut v2, &mut v3);
    sip_round(&mut v0, &mut v1, &mut v2, &mut v3);

    v0 ^ v1 ^ v2 ^ v3
}

fn sip_round(v0: &mut u64, v1: &mut u64, v2: &mut u64, v3: &mut u64) {
    *v0 = v0.wrapping_add(*v1);
    *v1 = v1.rotate_left(13);
    *v1 ^= *v0;
    *v0 = v0.rotate_left(32);

    *v2 = v2.wrapping_add(*v3);
    *v3 = v3.rotate_left(16);
    *v3 ^= *v2;

    *v0 = v0.wrapping_add(*v3);
    *v3 = v3.rotate_left(21);
    *v3 ^= *v0;

    *v2 = v2.wrapping_add(*v1);
    *v1 = v1.rotate_left(17);
    *v1 ^= *v2;
    *v2 = v2.rotate_left(32);
}
