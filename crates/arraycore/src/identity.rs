//! Identity, equality, ordering and hashing across value representations.
//!
//! Integers are one logical type spread over `Bool`, `Int`, `Long` and
//! `BigInt`; all four compare and hash identically for equal values, and
//! integral floats hash like the integer they equal.

use std::{cmp::Ordering, rc::Rc};

use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::{
    array::CompareOp,
    exception::{ExcType, RunError, RunResult},
    interp::Interp,
    py_hash::{
        HASH_NONE, cpython_hash_bytes_seed0, cpython_hash_float, cpython_hash_int, cpython_hash_str_seed0,
        cpython_tuple_hash,
    },
    value::Value,
};

/// Identity-like fast path; narrower than `==` and never user-visible.
///
/// Same-kind pairs compare by value (floats by bit pattern, so `NaN` is the
/// same as itself and `0.0` is not `-0.0`). Integer representations compare by
/// value across `Int`/`Long`/`BigInt`. A boolean only matches an unbounded
/// integer holding 0 or 1; it is never the same as a machine int. Arrays and
/// objects compare by reference.
#[must_use]
pub fn is_same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::Bool(x), Value::BigInt(y)) | (Value::BigInt(y), Value::Bool(x)) => {
            y.to_i64() == Some(i64::from(*x))
        }
        (Value::Bool(_), Value::Int(_) | Value::Long(_)) | (Value::Int(_) | Value::Long(_), Value::Bool(_)) => false,
        (Value::Int(_) | Value::Long(_) | Value::BigInt(_), Value::Int(_) | Value::Long(_) | Value::BigInt(_)) => {
            integer_cmp(a, b) == Some(Ordering::Equal)
        }
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => x.ptr_eq(y),
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Numeric equality across bool, the three integer kinds and float.
///
/// Tri-state: `None` means at least one side isn't numeric, so the caller
/// must fall back to the generic protocol. Integer/float comparison is exact
/// (no rounding of the integer to a double).
#[must_use]
pub fn numeric_eq(a: &Value, b: &Value) -> Option<bool> {
    numeric_cmp(a, b).map(|ordering| ordering == Some(Ordering::Equal))
}

/// Numeric ordering; the inner `None` means unordered (a NaN is involved).
#[must_use]
pub fn numeric_cmp(a: &Value, b: &Value) -> Option<Option<Ordering>> {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Some(x.partial_cmp(y)),
        (Value::Float(x), other) if other.is_int() => Some(float_int_cmp(*x, other).map(Ordering::reverse)),
        (other, Value::Float(y)) if other.is_int() => Some(float_int_cmp(*y, other)),
        _ if a.is_int() && b.is_int() => Some(integer_cmp(a, b)),
        _ => None,
    }
}

fn integer_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    Some(to_bigint(a)?.cmp(&to_bigint(b)?))
}

fn to_bigint(value: &Value) -> Option<BigInt> {
    match value {
        Value::BigInt(b) => Some(b.0.clone()),
        other => other.as_i64().map(BigInt::from),
    }
}

/// Compares integer `int` against float `f`, returning `int.cmp(f)`.
fn float_int_cmp(f: f64, int: &Value) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f.is_infinite() {
        return Some(if f > 0.0 { Ordering::Less } else { Ordering::Greater });
    }
    let floor = f.floor();
    let int = to_bigint(int)?;
    let floor_big = BigInt::from_f64(floor)?;
    Some(match int.cmp(&floor_big) {
        Ordering::Equal if floor == f => Ordering::Equal,
        // f lies strictly between floor and floor + 1.
        Ordering::Equal => Ordering::Less,
        other => other,
    })
}

/// Python `a == b`.
///
/// Host objects get `__eq__` first on the left operand, then reflected on the
/// right; if neither implements it, identity decides.
pub fn py_eq(a: &Value, b: &Value, interp: &mut Interp) -> RunResult<bool> {
    if let Some(eq) = numeric_eq(a, b) {
        return Ok(eq);
    }
    match (a, b) {
        (Value::Object(obj), other) | (other, Value::Object(obj)) => object_eq(obj, other, a, b, interp),
        (Value::None, Value::None) => Ok(true),
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        (Value::Bytes(x), Value::Bytes(y)) => Ok(x == y),
        (Value::Range(x), Value::Range(y)) => {
            let len = x.len();
            Ok(len == y.len() && (len == 0 || (x.start == y.start && (len == 1 || x.step == y.step))))
        }
        (Value::List(x), Value::List(y)) => {
            if x.len() != y.len() {
                return Ok(false);
            }
            for (left, right) in x.iter().zip(y) {
                if !is_same(left, right) && !py_eq(left, right, interp)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Array(x), Value::Array(y)) => {
            let (left, right) = (borrow_array(x)?, borrow_array(y)?);
            left.compare(&right, CompareOp::Eq)
        }
        _ => Ok(false),
    }
}

fn object_eq(
    obj: &Rc<dyn crate::PyObject>,
    other: &Value,
    a: &Value,
    b: &Value,
    interp: &mut Interp,
) -> RunResult<bool> {
    if let Value::Object(left) = a
        && let Some(eq) = interp.call_protocol(left.type_name(), "__eq__", |interp| left.dunder_eq(b, interp))?
    {
        return Ok(eq);
    }
    if let Value::Object(right) = b
        && let Some(eq) = interp.call_protocol(right.type_name(), "__eq__", |interp| right.dunder_eq(a, interp))?
    {
        return Ok(eq);
    }
    Ok(matches!(other, Value::Object(o) if Rc::ptr_eq(o, obj)))
}

fn borrow_array(array: &crate::ArrayRef) -> RunResult<std::cell::Ref<'_, crate::TypedArray>> {
    array
        .try_borrow()
        .map_err(|_| RunError::internal("array compared while mutably borrowed"))
}

/// Python rich comparison `a <op> b`.
///
/// Ordering is defined for numbers, strings, bytes, lists and arrays; host
/// objects participate through `__lt__` (reflected for `>`).
pub fn py_compare(a: &Value, b: &Value, op: CompareOp, interp: &mut Interp) -> RunResult<bool> {
    match op {
        CompareOp::Eq => return py_eq(a, b, interp),
        CompareOp::Ne => return Ok(!py_eq(a, b, interp)?),
        _ => {}
    }
    if let Some(ordering) = numeric_cmp(a, b) {
        return Ok(ordering.is_some_and(|o| op.matches(o)));
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(op.matches(x.cmp(y))),
        (Value::Bytes(x), Value::Bytes(y)) => Ok(op.matches(x.cmp(y))),
        (Value::List(x), Value::List(y)) => {
            for (left, right) in x.iter().zip(y) {
                if !is_same(left, right) && !py_eq(left, right, interp)? {
                    return py_compare(left, right, op, interp);
                }
            }
            Ok(op.matches(x.len().cmp(&y.len())))
        }
        (Value::Array(x), Value::Array(y)) => {
            let (left, right) = (borrow_array(x)?, borrow_array(y)?);
            left.compare(&right, op)
        }
        _ => {
            let (receiver, other) = match op {
                CompareOp::Lt => (a, b),
                CompareOp::Gt => (b, a),
                _ => return Err(ExcType::compare_not_supported(op.symbol(), a.type_name(), b.type_name())),
            };
            if let Value::Object(obj) = receiver
                && let Some(lt) =
                    interp.call_protocol(obj.type_name(), "__lt__", |interp| obj.dunder_lt(other, interp))?
            {
                return Ok(lt);
            }
            Err(ExcType::compare_not_supported(op.symbol(), a.type_name(), b.type_name()))
        }
    }
}

/// Python `hash(value)`.
///
/// Numbers hash by value modulo `2^61 - 1` (never `-1`), strings and bytes
/// with seed-0 SipHash, ranges like the tuple CPython derives from them.
/// Lists and arrays are unhashable. Host objects use `__hash__` if present,
/// otherwise their address.
pub fn py_hash(value: &Value, interp: &mut Interp) -> RunResult<i64> {
    Ok(match value {
        Value::None => HASH_NONE,
        Value::Bool(b) => i64::from(*b),
        Value::Int(i) => cpython_hash_int(i64::from(*i)),
        Value::Long(i) => cpython_hash_int(*i),
        Value::BigInt(b) => b.hash(),
        Value::Float(f) => cpython_hash_float(*f),
        Value::Str(s) => cpython_hash_str_seed0(s),
        Value::Bytes(b) => cpython_hash_bytes_seed0(b),
        Value::Range(r) => {
            let len = r.len();
            let len_hash = cpython_hash_int(len as i64);
            match len {
                0 => cpython_tuple_hash(&[len_hash, HASH_NONE, HASH_NONE]),
                1 => cpython_tuple_hash(&[len_hash, cpython_hash_int(r.start), HASH_NONE]),
                _ => cpython_tuple_hash(&[len_hash, cpython_hash_int(r.start), cpython_hash_int(r.step)]),
            }
        }
        Value::List(_) | Value::Array(_) => return Err(ExcType::unhashable(value.type_name())),
        Value::Object(obj) => {
            match interp.call_protocol(obj.type_name(), "__hash__", |interp| obj.dunder_hash(interp))? {
                Some(-1) => -2,
                Some(hash) => hash,
                None => pointer_hash(Rc::as_ptr(obj).cast::<()>() as usize),
            }
        }
    })
}

/// CPython's `_Py_HashPointer`: rotate the address right by 4 bits.
fn pointer_hash(addr: usize) -> i64 {
    let rotated = addr.rotate_right(4) as i64;
    if rotated == -1 { -2 } else { rotated }
}
