use std::{fmt::Write, rc::Rc};

use num_bigint::BigInt;

use crate::{
    array::{ArrayRef, TypedArray},
    exception::{RunError, RunResult},
    object::PyObject,
    types::{LongInt, Range, Type},
};

/// A runtime value as seen by the array core.
///
/// Integers come in three representations: `Int` (machine int), `Long`
/// (machine long) and `BigInt` (unbounded). They are one Python type; every
/// comparison and hash treats equal integers alike regardless of
/// representation.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    /// Machine int (32-bit).
    Int(i32),
    /// Machine long (64-bit).
    Long(i64),
    /// Unbounded integer.
    BigInt(LongInt),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Self>),
    Range(Range),
    Array(ArrayRef),
    /// Host-defined object, reached only through its protocol hooks.
    Object(Rc<dyn PyObject>),
}

impl Value {
    /// Builds an integer value in the narrowest representation that fits.
    #[must_use]
    pub fn from_bigint(value: BigInt) -> Self {
        LongInt::new(value).into_value()
    }

    /// Builds an integer value from an `i64`, using `Int` when it fits.
    #[must_use]
    pub fn int(value: i64) -> Self {
        match i32::try_from(value) {
            Ok(i) => Self::Int(i),
            Err(_) => Self::Long(value),
        }
    }

    /// Builds a list of integers.
    #[must_use]
    pub fn int_list(values: impl IntoIterator<Item = i64>) -> Self {
        Self::List(values.into_iter().map(Self::int).collect())
    }

    /// Builds a list of floats.
    #[must_use]
    pub fn float_list(values: impl IntoIterator<Item = f64>) -> Self {
        Self::List(values.into_iter().map(Self::Float).collect())
    }

    #[must_use]
    pub fn py_type(&self) -> Type {
        match self {
            Self::None => Type::NoneType,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) | Self::Long(_) | Self::BigInt(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::Str(_) => Type::Str,
            Self::Bytes(_) => Type::Bytes,
            Self::List(_) => Type::List,
            Self::Range(_) => Type::Range,
            Self::Array(_) => Type::Array,
            Self::Object(_) => Type::Object,
        }
    }

    /// The type name CPython would print for this value.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Object(obj) => obj.type_name(),
            other => other.py_type().into(),
        }
    }

    /// Whether this value is one of the integer representations (bool included).
    #[must_use]
    pub fn is_int(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Int(_) | Self::Long(_) | Self::BigInt(_))
    }

    /// Returns the integer as an `i64` if it is one and fits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(i64::from(*i)),
            Self::Long(i) => Some(*i),
            Self::BigInt(b) => b.to_i64(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Python `repr()` of the value.
    ///
    /// Fails only for arrays whose storage holds an invalid code point.
    pub fn py_repr(&self) -> RunResult<String> {
        let mut out = String::new();
        self.py_repr_fmt(&mut out)?;
        Ok(out)
    }

    pub(crate) fn py_repr_fmt(&self, out: &mut String) -> RunResult<()> {
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => write!(out, "{i}").map_err(fmt_error)?,
            Self::Long(i) => write!(out, "{i}").map_err(fmt_error)?,
            Self::BigInt(b) => write!(out, "{b}").map_err(fmt_error)?,
            Self::Float(f) => out.push_str(&float_repr(*f)),
            Self::Str(s) => string_repr_fmt(s, out),
            Self::Bytes(b) => bytes_repr_fmt(b, out),
            Self::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.py_repr_fmt(out)?;
                }
                out.push(']');
            }
            Self::Range(r) => {
                if r.step == 1 {
                    write!(out, "range({}, {})", r.start, r.stop).map_err(fmt_error)?;
                } else {
                    write!(out, "range({}, {}, {})", r.start, r.stop, r.step).map_err(fmt_error)?;
                }
            }
            Self::Array(array) => {
                let array = array
                    .try_borrow()
                    .map_err(|_| RunError::internal("array repr while mutably borrowed"))?;
                out.push_str(&array.py_repr()?);
            }
            Self::Object(obj) => write!(out, "<{} object>", obj.type_name()).map_err(fmt_error)?,
        }
        Ok(())
    }
}

fn fmt_error(_: std::fmt::Error) -> RunError {
    RunError::internal("formatting into a String failed")
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::int(i)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        match i64::try_from(i) {
            Ok(i) => Self::int(i),
            Err(_) => Self::BigInt(LongInt::from(i)),
        }
    }
}

impl From<BigInt> for Value {
    fn from(b: BigInt) -> Self {
        Self::from_bigint(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Self::Str(c.to_string())
    }
}

impl From<Range> for Value {
    fn from(r: Range) -> Self {
        Self::Range(r)
    }
}

impl From<TypedArray> for Value {
    fn from(array: TypedArray) -> Self {
        Self::Array(ArrayRef::new(array))
    }
}

impl From<ArrayRef> for Value {
    fn from(array: ArrayRef) -> Self {
        Self::Array(array)
    }
}

/// Formats a float the way CPython's `repr(float)` does.
///
/// ryu supplies the shortest round-tripping digits; the layout follows
/// CPython's `float_repr_style = 'short'`: positional notation for decimal
/// exponents in `-4..16`, otherwise scientific with a signed, at least
/// two-digit exponent (`1e+16`, `1e-05`).
#[must_use]
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f.is_sign_negative() { "-inf" } else { "inf" }.to_owned();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_owned();
    }

    let mut buffer = ryu::Buffer::new();
    let shortest = buffer.format_finite(f.abs());
    let (digits, point) = decimal_digits(shortest);

    let mut out = String::with_capacity(24);
    if f.is_sign_negative() {
        out.push('-');
    }
    let exponent = point - 1;
    if (-4..16).contains(&exponent) {
        if point <= 0 {
            out.push_str("0.");
            out.extend(std::iter::repeat_n('0', point.unsigned_abs() as usize));
            out.push_str(&digits);
        } else if point as usize >= digits.len() {
            out.push_str(&digits);
            out.extend(std::iter::repeat_n('0', point as usize - digits.len()));
            out.push_str(".0");
        } else {
            let (int_part, frac_part) = digits.split_at(point as usize);
            out.push_str(int_part);
            out.push('.');
            out.push_str(frac_part);
        }
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "e{sign}{:02}", exponent.unsigned_abs());
    }
    out
}

/// Splits ryu output into significant digits and the decimal point position,
/// so that the value is `0.DIGITS * 10^point`.
fn decimal_digits(shortest: &str) -> (String, i32) {
    let (mantissa, exp) = match shortest.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (shortest, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut digits: String = int_part.chars().chain(frac_part.chars()).collect();
    let mut point = int_part.len() as i32 + exp;

    let leading = digits.len() - digits.trim_start_matches('0').len();
    digits.drain(..leading);
    point -= leading as i32;
    let trimmed = digits.trim_end_matches('0').len();
    digits.truncate(trimmed);
    (digits, point)
}

/// Writes a CPython-style `repr(str)` into `out`.
///
/// Uses single quotes unless the text contains a single quote and no double quote.
pub(crate) fn string_repr_fmt(s: &str, out: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || (0x7f..0xa0).contains(&(c as u32)) => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

fn bytes_repr_fmt(bytes: &[u8], out: &mut String) {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') { b'"' } else { b'\'' };
    out.push('b');
    out.push(char::from(quote));
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(char::from(b));
            }
            0x20..=0x7e => out.push(char::from(byte)),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push(char::from(quote));
}
