//! Unbounded integers.
//!
//! Element values normally travel as `Value::Int`/`Value::Long`; a `LongInt`
//! only appears for values outside `i64` (including `Q`/`L` elements above
//! `i64::MAX`) or when a host hands one over unnormalized.

use std::fmt::{self, Display};

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use crate::{py_hash::cpython_hash_bigint, value::Value};

/// An arbitrary precision integer value; `.0` is the raw `BigInt`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct LongInt(pub BigInt);

impl LongInt {
    /// Creates a new `LongInt` from a `BigInt`.
    #[must_use]
    pub fn new(bi: BigInt) -> Self {
        Self(bi)
    }

    /// Converts to a `Value`, demoting to the narrowest machine kind that fits.
    #[must_use]
    pub fn into_value(self) -> Value {
        if let Some(i) = self.0.to_i32() {
            Value::Int(i)
        } else if let Some(i) = self.0.to_i64() {
            Value::Long(i)
        } else {
            Value::BigInt(self)
        }
    }

    /// Computes a CPython-compatible hash using the Mersenne-prime modular algorithm.
    #[must_use]
    pub fn hash(&self) -> i64 {
        cpython_hash_bigint(&self.0)
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Tries to convert to i64.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }

    /// Tries to convert to u64.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        self.0.to_u64()
    }

    /// Converts to f64, returning `None` when the magnitude exceeds the double range.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        self.0.to_f64().filter(|f| f.is_finite())
    }
}

impl From<BigInt> for LongInt {
    fn from(bi: BigInt) -> Self {
        Self(bi)
    }
}

impl From<i64> for LongInt {
    fn from(i: i64) -> Self {
        Self(BigInt::from(i))
    }
}

impl From<u64> for LongInt {
    fn from(i: u64) -> Self {
        Self(BigInt::from(i))
    }
}

impl Display for LongInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
