//! Host object protocol surface.
//!
//! Values the core doesn't natively understand arrive as [`Value::Object`]
//! wrapping a [`PyObject`]. The core only ever talks to them through the
//! dunder hooks below, each invoked through [`Interp::call_protocol`] so the
//! re-entry depth is bounded and traced.

use std::fmt;

use crate::{
    exception::{ExcType, RunError, RunResult},
    interp::Interp,
    value::Value,
};

/// User-level protocol methods a host object may implement.
///
/// Every hook returns `None` when the object does not implement that
/// protocol, mirroring a missing slot on a CPython type. Hooks take `&self`;
/// stateful objects such as iterators use interior mutability.
pub trait PyObject: fmt::Debug {
    /// The Python-visible type name used in error messages.
    fn type_name(&self) -> &str;

    /// `__index__`: lossless conversion to an integer.
    fn dunder_index(&self, _interp: &mut Interp) -> Option<RunResult<Value>> {
        None
    }

    /// `__float__`: conversion to a float.
    fn dunder_float(&self, _interp: &mut Interp) -> Option<RunResult<Value>> {
        None
    }

    /// `__eq__`: `None` plays the role of `NotImplemented`.
    fn dunder_eq(&self, _other: &Value, _interp: &mut Interp) -> Option<RunResult<bool>> {
        None
    }

    /// `__lt__`: `None` plays the role of `NotImplemented`.
    fn dunder_lt(&self, _other: &Value, _interp: &mut Interp) -> Option<RunResult<bool>> {
        None
    }

    /// `__hash__`.
    fn dunder_hash(&self, _interp: &mut Interp) -> Option<RunResult<i64>> {
        None
    }

    /// `__len__` for objects that support indexed access.
    fn sequence_len(&self) -> Option<usize> {
        None
    }

    /// `__getitem__` with an already-normalized index below `sequence_len()`.
    fn sequence_item(&self, _index: usize, _interp: &mut Interp) -> Option<RunResult<Value>> {
        None
    }

    /// `__next__`: `Ok(None)` signals exhaustion, which is not an error.
    fn iter_next(&self, _interp: &mut Interp) -> Option<RunResult<Option<Value>>> {
        None
    }
}

/// Feeds every item of an iterable value to `each`, in order.
///
/// Lists, ranges, strings (one-character strings), bytes (ints) and arrays
/// are walked directly; host objects are walked through their sequence
/// protocol if they have one, otherwise through `__next__`. An error from
/// `each` stops the walk, leaving earlier effects in place.
pub(crate) fn for_each_item(
    iterable: &Value,
    interp: &mut Interp,
    mut each: impl FnMut(Value, &mut Interp) -> RunResult<()>,
) -> RunResult<()> {
    match iterable {
        Value::List(items) => {
            for item in items {
                each(item.clone(), interp)?;
            }
        }
        Value::Range(range) => {
            for i in range.iter() {
                each(Value::from(i), interp)?;
            }
        }
        Value::Str(s) => {
            for c in s.chars() {
                each(Value::Str(c.to_string()), interp)?;
            }
        }
        Value::Bytes(bytes) => {
            for &byte in bytes {
                each(Value::Int(i32::from(byte)), interp)?;
            }
        }
        Value::Array(array) => {
            let items = array
                .try_borrow()
                .map_err(|_| RunError::internal("array iterated while mutably borrowed"))?
                .tolist()?;
            for item in items {
                each(item, interp)?;
            }
        }
        Value::Object(obj) => {
            let name = obj.type_name();
            if let Some(len) = obj.sequence_len() {
                for index in 0..len {
                    let item = interp
                        .call_protocol(name, "__getitem__", |interp| obj.sequence_item(index, interp))?
                        .ok_or_else(|| ExcType::not_iterable(name))?;
                    each(item, interp)?;
                }
            } else {
                loop {
                    let next = interp
                        .call_protocol(name, "__next__", |interp| obj.iter_next(interp))?
                        .ok_or_else(|| ExcType::not_iterable(name))?;
                    match next {
                        Some(item) => each(item, interp)?,
                        None => break,
                    }
                }
            }
        }
        other => return Err(ExcType::not_iterable(other.type_name())),
    }
    Ok(())
}
