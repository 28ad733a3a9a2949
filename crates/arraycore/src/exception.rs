use std::{
    borrow::Cow,
    fmt::{self, Display},
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::array::TypeCode;

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Python exception types raised by the array core.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `ValueError` -> "ValueError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// primary exception class - matches any exception in isinstance checks.
    Exception,

    // --- ArithmeticError hierarchy ---
    /// Intermediate class for arithmetic errors.
    ArithmeticError,
    /// Subclass of ArithmeticError, raised for values outside an element kind's range.
    OverflowError,

    // --- LookupError hierarchy ---
    /// Intermediate class for lookup errors.
    LookupError,
    /// Subclass of LookupError.
    IndexError,

    // --- RuntimeError hierarchy ---
    RuntimeError,
    /// Subclass of RuntimeError, raised when user protocols re-enter too deeply.
    RecursionError,

    // --- ValueError hierarchy ---
    ValueError,
    /// Subclass of ValueError - for encoding/decoding errors.
    UnicodeDecodeError,

    TypeError,
    MemoryError,
    /// Raised when a resize is attempted while buffer views are outstanding.
    BufferError,
    #[strum(serialize = "EOFError")]
    EOFError,
    StopIteration,
}

impl ExcType {
    /// Checks if this exception type is a subclass of another exception type.
    ///
    /// Implements the `except` matching hierarchy for the types the core raises.
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        if self == handler_type {
            return true;
        }
        match handler_type {
            Self::Exception => true,
            Self::LookupError => matches!(self, Self::IndexError),
            Self::ArithmeticError => matches!(self, Self::OverflowError),
            Self::RuntimeError => matches!(self, Self::RecursionError),
            Self::ValueError => matches!(self, Self::UnicodeDecodeError),
            _ => false,
        }
    }

    /// Creates a TypeError with a custom message.
    #[must_use]
    pub(crate) fn type_error(msg: impl Into<String>) -> RunError {
        SimpleException::new_msg(Self::TypeError, msg.into()).into()
    }

    /// Creates a ValueError with a custom message.
    #[must_use]
    pub(crate) fn value_error(msg: impl Into<String>) -> RunError {
        SimpleException::new_msg(Self::ValueError, msg.into()).into()
    }

    /// Creates an OverflowError with a custom message.
    #[must_use]
    pub(crate) fn overflow_error(msg: impl Into<String>) -> RunError {
        SimpleException::new_msg(Self::OverflowError, msg.into()).into()
    }

    /// Creates an IndexError with a custom message.
    #[must_use]
    pub(crate) fn index_error(msg: &'static str) -> RunError {
        SimpleException::new_msg(Self::IndexError, msg).into()
    }

    /// Creates a bare, catchable MemoryError.
    ///
    /// Raised when a requested size cannot be expressed in bytes, mirroring
    /// CPython's `PyErr_NoMemory()` which carries no message.
    #[must_use]
    pub(crate) fn memory_error() -> RunError {
        SimpleException::new(Self::MemoryError, None).into()
    }

    /// Creates the ValueError for an unknown typecode.
    ///
    /// Matches CPython's format: `bad typecode (must be b, B, u, h, H, i, I, l, L, q, Q, f or d)`
    #[must_use]
    pub(crate) fn bad_typecode() -> RunError {
        Self::value_error("bad typecode (must be b, B, u, h, H, i, I, l, L, q, Q, f or d)")
    }

    /// Creates the TypeError for a typecode argument that isn't a single character.
    ///
    /// Matches CPython's format: `array() argument 1 must be a unicode character, not str`
    #[must_use]
    pub(crate) fn typecode_not_char(len: usize) -> RunError {
        if len == 0 {
            Self::type_error("array() argument 1 must be a unicode character, not an empty string")
        } else {
            Self::type_error(format!(
                "array() argument 1 must be a unicode character, not a string of length {len}"
            ))
        }
    }

    /// Creates the BufferError raised when a resize is attempted while views are exported.
    ///
    /// Matches CPython's format: `Existing exports of data: object cannot be re-sized`
    #[must_use]
    pub(crate) fn buffer_error_exported() -> RunError {
        SimpleException::new_msg(Self::BufferError, "Existing exports of data: object cannot be re-sized").into()
    }

    /// Creates the TypeError for combining arrays of different typecodes.
    ///
    /// Matches CPython's `PyErr_BadArgument()` text.
    #[must_use]
    pub(crate) fn bad_argument_type() -> RunError {
        Self::type_error("bad argument type for built-in operation")
    }

    /// Creates the TypeError for an object that cannot be iterated.
    ///
    /// Matches CPython's format: `'int' object is not iterable`
    #[must_use]
    pub(crate) fn not_iterable(type_name: impl Display) -> RunError {
        Self::type_error(format!("'{type_name}' object is not iterable"))
    }

    /// Creates the TypeError for a value that has no integer protocol.
    ///
    /// Matches CPython's format: `'float' object cannot be interpreted as an integer`
    #[must_use]
    pub(crate) fn not_an_integer(type_name: impl Display) -> RunError {
        Self::type_error(format!("'{type_name}' object cannot be interpreted as an integer"))
    }

    /// Creates the TypeError for a value that has no float protocol.
    ///
    /// Matches CPython's format: `must be real number, not str`
    #[must_use]
    pub(crate) fn not_a_real_number(type_name: impl Display) -> RunError {
        Self::type_error(format!("must be real number, not {type_name}"))
    }

    /// Creates the TypeError for a protocol method that returned the wrong type.
    ///
    /// Matches CPython's format: `__index__ returned non-int (type str)`
    #[must_use]
    pub(crate) fn protocol_returned_wrong_type(
        protocol: &str,
        expected: &str,
        type_name: impl Display,
    ) -> RunError {
        Self::type_error(format!("{protocol} returned non-{expected} (type {type_name})"))
    }

    /// Creates the TypeError for an ordering comparison between unsupported types.
    ///
    /// Matches CPython's format: `'<' not supported between instances of 'str' and 'int'`
    #[must_use]
    pub(crate) fn compare_not_supported(op: &str, left: impl Display, right: impl Display) -> RunError {
        Self::type_error(format!(
            "'{op}' not supported between instances of '{left}' and '{right}'"
        ))
    }

    /// Creates the TypeError for an unhashable value.
    ///
    /// Matches CPython's format: `unhashable type: 'list'`
    #[must_use]
    pub(crate) fn unhashable(type_name: impl Display) -> RunError {
        Self::type_error(format!("unhashable type: '{type_name}'"))
    }

    /// Creates the TypeError for a non-unicode element stored into a `'u'` array.
    ///
    /// Matches CPython's format: `array item must be a unicode character, not int`
    #[must_use]
    pub(crate) fn array_item_not_char(type_name: impl Display) -> RunError {
        Self::type_error(format!("array item must be a unicode character, not {type_name}"))
    }

    /// Creates the TypeError for a multi-character string stored into a `'u'` array.
    #[must_use]
    pub(crate) fn array_item_wrong_length(len: usize) -> RunError {
        Self::type_error(format!(
            "array item must be a unicode character, not a string of length {len}"
        ))
    }

    /// Creates the OverflowError for an integer outside an element kind's range.
    ///
    /// `too_big` selects between CPython's "greater than maximum" and "less than minimum" texts.
    #[must_use]
    pub(crate) fn element_out_of_range(typecode: TypeCode, too_big: bool) -> RunError {
        let msg = match (typecode, too_big) {
            (TypeCode::I8, true) => "signed char is greater than maximum",
            (TypeCode::I8, false) => "signed char is less than minimum",
            (TypeCode::U8, true) => "unsigned byte integer is greater than maximum",
            (TypeCode::U8, false) => "unsigned byte integer is less than minimum",
            (TypeCode::I16, true) => "signed short integer is greater than maximum",
            (TypeCode::I16, false) => "signed short integer is less than minimum",
            (TypeCode::U16, true) => "unsigned short is greater than maximum",
            (TypeCode::U16, false) => "unsigned short is less than minimum",
            (TypeCode::I32, true) => "signed integer is greater than maximum",
            (TypeCode::I32, false) => "signed integer is less than minimum",
            (TypeCode::U32, true) => "unsigned int is greater than maximum",
            (TypeCode::U32, false) => "unsigned int is less than minimum",
            (TypeCode::Long | TypeCode::I64, _) => "Python int too large to convert to C long",
            (TypeCode::ULong, true) => "Python int too large to convert to C unsigned long",
            (TypeCode::ULong, false) => "unsigned long is less than minimum",
            (TypeCode::U64, true) => "int too big to convert",
            (TypeCode::U64, false) => "can't convert negative int to unsigned",
            (TypeCode::Unicode | TypeCode::F32 | TypeCode::F64, _) => "value out of range",
        };
        Self::overflow_error(msg)
    }

    /// Creates the TypeError for assigning a non-array to an array slice.
    ///
    /// Matches CPython's format: `can only assign array (not "list") to array slice`
    #[must_use]
    pub(crate) fn slice_assign_not_array(type_name: impl Display) -> RunError {
        Self::type_error(format!(
            "can only assign array (not \"{type_name}\") to array slice"
        ))
    }

    /// Creates the ValueError for an extended-slice assignment of the wrong size.
    ///
    /// Matches CPython's format: `attempt to assign array of size 2 to extended slice of size 3`
    #[must_use]
    pub(crate) fn extended_slice_size_mismatch(needed: usize, slice_len: usize) -> RunError {
        Self::value_error(format!(
            "attempt to assign array of size {needed} to extended slice of size {slice_len}"
        ))
    }

    /// Creates a UnicodeDecodeError for bytes a UTF-16/UTF-32 codec rejects.
    ///
    /// Matches CPython's format: `'utf-32-le' codec can't decode bytes in position 0-3: code point not in range(0x110000)`
    #[must_use]
    pub(crate) fn unicode_decode_error(codec: &str, start: usize, end: usize, reason: &str) -> RunError {
        SimpleException::new_msg(
            Self::UnicodeDecodeError,
            format!("'{codec}' codec can't decode bytes in position {start}-{end}: {reason}"),
        )
        .into()
    }

    /// Creates the EOFError raised by `fromfile` after a short read.
    #[must_use]
    pub(crate) fn short_read() -> RunError {
        SimpleException::new_msg(Self::EOFError, "read() didn't return enough bytes").into()
    }
}

/// Simple lightweight representation of an exception.
///
/// Carries the exception type and an optional message, matching how CPython
/// renders `repr(exc)` for single-argument exceptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimpleException {
    exc_type: ExcType,
    arg: Option<String>,
}

impl fmt::Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{}: {arg}", self.exc_type),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

impl SimpleException {
    /// Creates a new exception with the given type and optional argument message.
    #[must_use]
    pub fn new(exc_type: ExcType, arg: Option<String>) -> Self {
        Self { exc_type, arg }
    }

    /// Creates a new exception with a message.
    #[must_use]
    pub fn new_msg(exc_type: ExcType, arg: impl Display) -> Self {
        Self {
            exc_type,
            arg: Some(arg.to_string()),
        }
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    /// The exception's message, if it has one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.arg.as_deref()
    }
}

/// Runtime error types that can occur during array operations.
///
/// Three variants:
/// - `Internal`: Bug in the core implementation (static message)
/// - `Exc`: Python exception that a caller can catch and handle
/// - `UncatchableExc`: Python exception from resource limits that callers should not swallow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunError {
    /// Internal error - indicates a bug in the core, not in caller input.
    Internal(Cow<'static, str>),
    /// Catchable Python exception (e.g., ValueError, TypeError).
    Exc(Box<SimpleException>),
    /// Exception produced by a configured resource limit (MemoryError).
    UncatchableExc(Box<SimpleException>),
}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Exc(Box::new(exc))
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(msg) => write!(f, "RuntimeError: internal error: {msg}"),
            Self::Exc(exc) | Self::UncatchableExc(exc) => exc.fmt(f),
        }
    }
}

impl std::error::Error for RunError {}

impl RunError {
    /// Creates an internal error for broken core invariants.
    #[must_use]
    pub(crate) fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal(msg.into())
    }

    /// The Python exception type this error surfaces as.
    ///
    /// Internal errors surface as `RuntimeError`.
    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        match self {
            Self::Internal(_) => ExcType::RuntimeError,
            Self::Exc(exc) | Self::UncatchableExc(exc) => exc.exc_type(),
        }
    }

    /// The exception message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Internal(msg) => Some(msg),
            Self::Exc(exc) | Self::UncatchableExc(exc) => exc.message(),
        }
    }

    /// Whether an `except handler_type:` clause would catch this error.
    ///
    /// Uncatchable resource-limit errors never match.
    #[must_use]
    pub fn is_instance_of(&self, handler_type: ExcType) -> bool {
        match self {
            Self::Exc(exc) => exc.exc_type().is_subclass_of(handler_type),
            Self::Internal(_) | Self::UncatchableExc(_) => false,
        }
    }
}
