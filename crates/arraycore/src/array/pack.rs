//! Value-check and pack/unpack of single elements.
//!
//! Packing is a pure function from a value to the element's native bytes: it
//! validates and encodes without touching any array, so every write path can
//! check first and commit afterwards.

use num_traits::ToPrimitive;
use smallvec::SmallVec;

use super::format::{ElementKind, TypeCode};
use crate::{
    coerce::{Integral, to_f64_exact},
    exception::{ExcType, RunResult},
    interp::Interp,
    value::Value,
};

/// Native-endian bytes of one element; never longer than 8 bytes.
pub type ElementBytes = SmallVec<[u8; 8]>;

/// Validates `value` against `typecode` and returns its packed bytes.
///
/// Integers outside the element's range raise `OverflowError`, floats given
/// to integer formats raise `TypeError`, and `'u'` accepts only
/// one-character strings. Host objects are converted through `__index__`
/// (integer formats) or `__float__`/`__index__` (float formats).
pub fn pack_element(typecode: TypeCode, value: &Value, interp: &mut Interp) -> RunResult<ElementBytes> {
    match typecode.kind() {
        ElementKind::SignedInt | ElementKind::UnsignedInt => pack_integer(typecode, value, interp),
        ElementKind::Float => {
            let f = to_f64_exact(value, interp)?;
            Ok(if typecode == TypeCode::F32 {
                ElementBytes::from_slice(&(f as f32).to_ne_bytes())
            } else {
                ElementBytes::from_slice(&f.to_ne_bytes())
            })
        }
        ElementKind::UnicodeCodepoint => {
            let Value::Str(s) = value else {
                return Err(ExcType::array_item_not_char(value.type_name()));
            };
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(ElementBytes::from_slice(&u32::from(c).to_ne_bytes())),
                _ => Err(ExcType::array_item_wrong_length(s.chars().count())),
            }
        }
    }
}

/// Dry-run form of [`pack_element`]: validates without producing bytes.
pub fn check_element(typecode: TypeCode, value: &Value, interp: &mut Interp) -> RunResult<()> {
    pack_element(typecode, value, interp).map(drop)
}

fn pack_integer(typecode: TypeCode, value: &Value, interp: &mut Interp) -> RunResult<ElementBytes> {
    let integral = Integral::resolve(value, interp)?;
    let Some((min, max)) = typecode.int_range() else {
        return Err(ExcType::bad_argument_type());
    };
    let v = match &integral {
        Integral::Machine(i) => i128::from(*i),
        Integral::Unbounded(b) => match b.to_i128() {
            Some(v) => v,
            None => return Err(ExcType::element_out_of_range(typecode, !integral.is_negative())),
        },
    };
    if v < min {
        return Err(ExcType::element_out_of_range(typecode, false));
    }
    if v > max {
        return Err(ExcType::element_out_of_range(typecode, true));
    }
    // In range, so truncating to the element width keeps the two's-complement bits.
    Ok(match typecode.itemsize() {
        1 => ElementBytes::from_slice(&[v as u8]),
        2 => ElementBytes::from_slice(&(v as u16).to_ne_bytes()),
        4 => ElementBytes::from_slice(&(v as u32).to_ne_bytes()),
        _ => ElementBytes::from_slice(&(v as u64).to_ne_bytes()),
    })
}

/// Decodes one element from its native bytes.
///
/// Only `'u'` can fail: storage filled through `frombytes` may hold a value
/// that is not a Unicode scalar.
pub fn unpack_element(typecode: TypeCode, bytes: &[u8]) -> RunResult<Value> {
    fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
        let mut out = [0; N];
        out.copy_from_slice(&bytes[..N]);
        out
    }
    Ok(match typecode {
        TypeCode::I8 => Value::Int(i32::from(i8::from_ne_bytes(array(bytes)))),
        TypeCode::U8 => Value::Int(i32::from(bytes[0])),
        TypeCode::I16 => Value::Int(i32::from(i16::from_ne_bytes(array(bytes)))),
        TypeCode::U16 => Value::Int(i32::from(u16::from_ne_bytes(array(bytes)))),
        TypeCode::I32 => Value::Int(i32::from_ne_bytes(array(bytes))),
        TypeCode::U32 => Value::int(i64::from(u32::from_ne_bytes(array(bytes)))),
        TypeCode::Long | TypeCode::I64 => Value::int(i64::from_ne_bytes(array(bytes))),
        TypeCode::ULong | TypeCode::U64 => Value::from(u64::from_ne_bytes(array(bytes))),
        TypeCode::F32 => Value::Float(f64::from(f32::from_ne_bytes(array(bytes)))),
        TypeCode::F64 => Value::Float(f64::from_ne_bytes(array(bytes))),
        TypeCode::Unicode => Value::Str(decode_code_point(u32::from_ne_bytes(array(bytes)))?.to_string()),
    })
}

/// Converts a stored `'u'` slot to a `char`.
pub(crate) fn decode_code_point(code: u32) -> RunResult<char> {
    if let Some(c) = char::from_u32(code) {
        return Ok(c);
    }
    if (0xD800..=0xDFFF).contains(&code) {
        Err(ExcType::value_error(format!(
            "character U+{code:x} is a lone surrogate and cannot be represented"
        )))
    } else {
        Err(ExcType::value_error(format!(
            "character U+{code:x} is not in range [U+0000; U+10ffff]"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_char_bounds() {
        let mut interp = Interp::new();
        assert_eq!(
            pack_element(TypeCode::I8, &Value::Int(-128), &mut interp).unwrap().as_slice(),
            &[0x80]
        );
        let err = pack_element(TypeCode::I8, &Value::Int(128), &mut interp).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::OverflowError);
        assert_eq!(err.message(), Some("signed char is greater than maximum"));
    }

    #[test]
    fn unsigned_rejects_negative() {
        let mut interp = Interp::new();
        let err = pack_element(TypeCode::U16, &Value::Int(-1), &mut interp).unwrap_err();
        assert_eq!(err.message(), Some("unsigned short is less than minimum"));
    }

    #[test]
    fn float_into_int_format_is_type_error() {
        let mut interp = Interp::new();
        let err = pack_element(TypeCode::I32, &Value::Float(1.0), &mut interp).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::TypeError);
        assert_eq!(
            err.message(),
            Some("'float' object cannot be interpreted as an integer")
        );
    }

    #[test]
    fn u64_round_trips_above_i64_max() {
        let mut interp = Interp::new();
        let value = Value::from(u64::MAX);
        let bytes = pack_element(TypeCode::U64, &value, &mut interp).unwrap();
        let back = unpack_element(TypeCode::U64, &bytes).unwrap();
        assert_eq!(back.py_repr().unwrap(), "18446744073709551615");
    }

    #[test]
    fn unicode_requires_single_char() {
        let mut interp = Interp::new();
        let err = pack_element(TypeCode::Unicode, &Value::from("ab"), &mut interp).unwrap_err();
        assert_eq!(
            err.message(),
            Some("array item must be a unicode character, not a string of length 2")
        );
        let err = pack_element(TypeCode::Unicode, &Value::Int(1), &mut interp).unwrap_err();
        assert_eq!(err.message(), Some("array item must be a unicode character, not int"));
    }

    #[test]
    fn invalid_code_point_fails_to_unpack() {
        let err = unpack_element(TypeCode::Unicode, &0x11_0000u32.to_ne_bytes()).unwrap_err();
        assert_eq!(err.exc_type(), ExcType::ValueError);
    }
}
