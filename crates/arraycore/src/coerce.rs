//! Numeric coercion between machine int, machine long, unbounded integer and double.
//!
//! Each target has an exact variant (raises on values it cannot represent)
//! and, where meaningful, a lossy variant (wraps or saturates silently).
//! Non-numeric inputs go through the host object's `__index__` / `__float__`
//! protocol exactly once: whatever the protocol returns must already be of an
//! accepted kind, otherwise a `TypeError` names the returned type.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    exception::{ExcType, RunResult},
    interp::Interp,
    value::Value,
};

/// An integer resolved from a value, before narrowing to a target width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Integral {
    Machine(i64),
    Unbounded(BigInt),
}

impl Integral {
    /// Resolves values that are already integers, without calling any protocol.
    fn direct(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Machine(i64::from(*b))),
            Value::Int(i) => Some(Self::Machine(i64::from(*i))),
            Value::Long(i) => Some(Self::Machine(*i)),
            Value::BigInt(b) => Some(match b.to_i64() {
                Some(i) => Self::Machine(i),
                None => Self::Unbounded(b.0.clone()),
            }),
            _ => None,
        }
    }

    /// Resolves any value to an integer, calling `__index__` at most once.
    pub(crate) fn resolve(value: &Value, interp: &mut Interp) -> RunResult<Self> {
        if let Some(integral) = Self::direct(value) {
            return Ok(integral);
        }
        let Value::Object(obj) = value else {
            return Err(ExcType::not_an_integer(value.type_name()));
        };
        let returned = interp
            .call_protocol(obj.type_name(), "__index__", |interp| obj.dunder_index(interp))?
            .ok_or_else(|| ExcType::not_an_integer(obj.type_name()))?;
        Self::direct(&returned)
            .ok_or_else(|| ExcType::protocol_returned_wrong_type("__index__", "int", returned.type_name()))
    }

    /// Signedness without materialising a bigint.
    pub(crate) fn is_negative(&self) -> bool {
        match self {
            Self::Machine(i) => *i < 0,
            Self::Unbounded(b) => b.sign() == num_bigint::Sign::Minus,
        }
    }

    /// The low 64 bits in two's complement.
    fn wrapping_u64(&self) -> u64 {
        match self {
            Self::Machine(i) => *i as u64,
            Self::Unbounded(b) => (b & BigInt::from(u64::MAX)).to_u64().unwrap_or(0),
        }
    }

    pub(crate) fn into_bigint(self) -> BigInt {
        match self {
            Self::Machine(i) => BigInt::from(i),
            Self::Unbounded(b) => b,
        }
    }
}

/// Converts to a machine int, raising `OverflowError` outside `i32`.
pub fn to_i32_exact(value: &Value, interp: &mut Interp) -> RunResult<i32> {
    match Integral::resolve(value, interp)? {
        Integral::Machine(i) => {
            i32::try_from(i).map_err(|_| ExcType::overflow_error("Python int too large to convert to C int"))
        }
        Integral::Unbounded(_) => Err(ExcType::overflow_error("Python int too large to convert to C int")),
    }
}

/// Converts to a machine int, keeping the low 32 bits (two's-complement wraparound).
pub fn to_i32_lossy(value: &Value, interp: &mut Interp) -> RunResult<i32> {
    Ok(Integral::resolve(value, interp)?.wrapping_u64() as u32 as i32)
}

/// Converts to a machine long, raising `OverflowError` outside `i64`.
pub fn to_i64_exact(value: &Value, interp: &mut Interp) -> RunResult<i64> {
    match Integral::resolve(value, interp)? {
        Integral::Machine(i) => Ok(i),
        Integral::Unbounded(_) => Err(ExcType::overflow_error("Python int too large to convert to C long")),
    }
}

/// Converts to a machine long, keeping the low 64 bits (two's-complement wraparound).
pub fn to_i64_lossy(value: &Value, interp: &mut Interp) -> RunResult<i64> {
    Ok(Integral::resolve(value, interp)?.wrapping_u64() as i64)
}

/// Converts to an unsigned 64-bit value, rejecting negatives and values above `u64::MAX`.
pub fn to_u64_exact(value: &Value, interp: &mut Interp) -> RunResult<u64> {
    let integral = Integral::resolve(value, interp)?;
    if integral.is_negative() {
        return Err(ExcType::overflow_error("can't convert negative int to unsigned"));
    }
    match integral {
        Integral::Machine(i) => Ok(i as u64),
        Integral::Unbounded(b) => b
            .to_u64()
            .ok_or_else(|| ExcType::overflow_error("int too big to convert")),
    }
}

/// Converts to an unsigned 64-bit value without raising.
///
/// Machine-range negatives are sign-extended (`-1` becomes `u64::MAX`);
/// magnitudes beyond the 64-bit ranges saturate to `u64::MAX` for positive
/// values and to the sign-extended `i64::MIN` for negative ones.
pub fn to_u64_lossy(value: &Value, interp: &mut Interp) -> RunResult<u64> {
    Ok(match Integral::resolve(value, interp)? {
        Integral::Machine(i) => i as u64,
        Integral::Unbounded(b) => match b.to_u64() {
            Some(u) => u,
            None if b.sign() == num_bigint::Sign::Minus => i64::MIN as u64,
            None => u64::MAX,
        },
    })
}

/// Converts to an unbounded integer; only the protocol path can fail.
pub fn to_bigint(value: &Value, interp: &mut Interp) -> RunResult<BigInt> {
    Ok(Integral::resolve(value, interp)?.into_bigint())
}

/// Converts to a double, raising `OverflowError` for integers beyond the double range.
///
/// Host objects are asked for `__float__` first and `__index__` second.
pub fn to_f64_exact(value: &Value, interp: &mut Interp) -> RunResult<f64> {
    to_f64(value, interp, true)
}

/// Converts to a double, mapping out-of-range integers to signed infinity.
pub fn to_f64_lossy(value: &Value, interp: &mut Interp) -> RunResult<f64> {
    to_f64(value, interp, false)
}

fn to_f64(value: &Value, interp: &mut Interp, exact: bool) -> RunResult<f64> {
    if let Some(f) = direct_f64(value, exact)? {
        return Ok(f);
    }
    let Value::Object(obj) = value else {
        return Err(ExcType::not_a_real_number(value.type_name()));
    };
    let name = obj.type_name();
    if let Some(returned) = interp.call_protocol(name, "__float__", |interp| obj.dunder_float(interp))? {
        return match returned {
            Value::Float(f) => Ok(f),
            other => Err(ExcType::protocol_returned_wrong_type(
                "__float__",
                "float",
                other.type_name(),
            )),
        };
    }
    let returned = interp
        .call_protocol(name, "__index__", |interp| obj.dunder_index(interp))?
        .ok_or_else(|| ExcType::not_a_real_number(name))?;
    if !returned.is_int() {
        return Err(ExcType::protocol_returned_wrong_type(
            "__index__",
            "int",
            returned.type_name(),
        ));
    }
    direct_f64(&returned, exact)?.ok_or_else(|| ExcType::not_a_real_number(name))
}

fn direct_f64(value: &Value, exact: bool) -> RunResult<Option<f64>> {
    Ok(match value {
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Int(i) => Some(f64::from(*i)),
        Value::Long(i) => Some(*i as f64),
        Value::BigInt(b) => match b.to_f64() {
            Some(f) => Some(f),
            None if exact => return Err(ExcType::overflow_error("int too large to convert to float")),
            None if b.is_negative() => Some(f64::NEG_INFINITY),
            None => Some(f64::INFINITY),
        },
        _ => None,
    })
}
