//! Element formats: the logical typecodes and the machine encodings used for
//! pickling and reconstruction.

use serde::{Deserialize, Serialize};

use crate::exception::{ExcType, RunError, RunResult};

/// Every typecode the array type accepts, in CPython's `array.typecodes` order.
pub const TYPECODES: &str = "bBuhHiIlLqQfd";

/// Broad element kind, shared by all widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    SignedInt,
    UnsignedInt,
    Float,
    /// One Unicode code point per slot, stored as a native-endian `u32`.
    UnicodeCodepoint,
}

/// The logical element format of an array.
///
/// `l`/`L` are 8 bytes wide, matching LP64 hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCode {
    /// `b`: signed char
    I8,
    /// `B`: unsigned char
    U8,
    /// `u`: Unicode character
    Unicode,
    /// `h`: signed short
    I16,
    /// `H`: unsigned short
    U16,
    /// `i`: signed int
    I32,
    /// `I`: unsigned int
    U32,
    /// `l`: signed long
    Long,
    /// `L`: unsigned long
    ULong,
    /// `q`: signed long long
    I64,
    /// `Q`: unsigned long long
    U64,
    /// `f`: float
    F32,
    /// `d`: double
    F64,
}

impl TypeCode {
    /// All typecodes in [`TYPECODES`] order.
    pub const ALL: [Self; 13] = [
        Self::I8,
        Self::U8,
        Self::Unicode,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::Long,
        Self::ULong,
        Self::I64,
        Self::U64,
        Self::F32,
        Self::F64,
    ];

    /// Looks up a single typecode character; `None` for unknown codes.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'b' => Self::I8,
            'B' => Self::U8,
            'u' => Self::Unicode,
            'h' => Self::I16,
            'H' => Self::U16,
            'i' => Self::I32,
            'I' => Self::U32,
            'l' => Self::Long,
            'L' => Self::ULong,
            'q' => Self::I64,
            'Q' => Self::U64,
            'f' => Self::F32,
            'd' => Self::F64,
            _ => return None,
        })
    }

    /// Parses the typecode argument of `array(typecode, ...)`.
    ///
    /// Anything but exactly one character is a `TypeError`; an unknown
    /// character is a `ValueError`.
    pub fn for_array(format: &str) -> RunResult<Self> {
        let mut chars = format.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c).ok_or_else(ExcType::bad_typecode),
            _ => Err(ExcType::typecode_not_char(format.chars().count())),
        }
    }

    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::I8 => 'b',
            Self::U8 => 'B',
            Self::Unicode => 'u',
            Self::I16 => 'h',
            Self::U16 => 'H',
            Self::I32 => 'i',
            Self::U32 => 'I',
            Self::Long => 'l',
            Self::ULong => 'L',
            Self::I64 => 'q',
            Self::U64 => 'Q',
            Self::F32 => 'f',
            Self::F64 => 'd',
        }
    }

    /// Element width in bytes.
    #[must_use]
    pub fn itemsize(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::Unicode | Self::I32 | Self::U32 | Self::F32 => 4,
            Self::Long | Self::ULong | Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    #[must_use]
    pub fn kind(self) -> ElementKind {
        match self {
            Self::I8 | Self::I16 | Self::I32 | Self::Long | Self::I64 => ElementKind::SignedInt,
            Self::U8 | Self::U16 | Self::U32 | Self::ULong | Self::U64 => ElementKind::UnsignedInt,
            Self::F32 | Self::F64 => ElementKind::Float,
            Self::Unicode => ElementKind::UnicodeCodepoint,
        }
    }

    /// Inclusive value range for integer kinds.
    #[must_use]
    pub fn int_range(self) -> Option<(i128, i128)> {
        Some(match self {
            Self::I8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            Self::U8 => (0, i128::from(u8::MAX)),
            Self::I16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            Self::U16 => (0, i128::from(u16::MAX)),
            Self::I32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            Self::U32 => (0, i128::from(u32::MAX)),
            Self::Long | Self::I64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            Self::ULong | Self::U64 => (0, i128::from(u64::MAX)),
            Self::Unicode | Self::F32 | Self::F64 => return None,
        })
    }

    /// The machine encoding this format packs to when no byte order is requested.
    #[must_use]
    pub fn native_encoding(self) -> MachineFormat {
        let big_endian = cfg!(target_endian = "big");
        match self {
            Self::I8 => MachineFormat::Int8 { signed: true },
            Self::U8 => MachineFormat::Int8 { signed: false },
            Self::I16 | Self::U16 => MachineFormat::Int16 {
                signed: self == Self::I16,
                big_endian,
            },
            Self::I32 | Self::U32 => MachineFormat::Int32 {
                signed: self == Self::I32,
                big_endian,
            },
            Self::Long | Self::ULong | Self::I64 | Self::U64 => MachineFormat::Int64 {
                signed: matches!(self, Self::Long | Self::I64),
                big_endian,
            },
            Self::F32 => MachineFormat::Float32 { big_endian },
            Self::F64 => MachineFormat::Float64 { big_endian },
            Self::Unicode => MachineFormat::Utf32 { big_endian },
        }
    }
}

impl TryFrom<char> for TypeCode {
    type Error = RunError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Self::from_char(c).ok_or_else(ExcType::bad_typecode)
    }
}

/// Machine-level encoding of an element, identified on the wire by a small
/// integer code (`array._array_reconstructor`'s `mformat_code`).
///
/// Codes: `Int8` 0-1, `Int16` 2-5, `Int32` 6-9, `Int64` 10-13, each laid out
/// as `base + 2 * signed + big_endian`; `Float32` 14-15, `Float64` 16-17,
/// `Utf16` 18-19, `Utf32` 20-21, each `base + big_endian`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineFormat {
    Int8 { signed: bool },
    Int16 { signed: bool, big_endian: bool },
    Int32 { signed: bool, big_endian: bool },
    Int64 { signed: bool, big_endian: bool },
    Float32 { big_endian: bool },
    Float64 { big_endian: bool },
    Utf16 { big_endian: bool },
    Utf32 { big_endian: bool },
}

impl MachineFormat {
    /// The full catalog, in code order.
    #[must_use]
    pub fn all() -> Vec<Self> {
        (0..=21).filter_map(|code| Self::try_from(code).ok()).collect()
    }

    #[must_use]
    pub fn code(self) -> u8 {
        u8::from(self)
    }

    /// Bytes per encoded unit.
    #[must_use]
    pub fn item_size(self) -> usize {
        match self {
            Self::Int8 { .. } => 1,
            Self::Int16 { .. } | Self::Utf16 { .. } => 2,
            Self::Int32 { .. } | Self::Float32 { .. } | Self::Utf32 { .. } => 4,
            Self::Int64 { .. } | Self::Float64 { .. } => 8,
        }
    }

    #[must_use]
    pub fn is_big_endian(self) -> bool {
        match self {
            Self::Int8 { .. } => false,
            Self::Int16 { big_endian, .. }
            | Self::Int32 { big_endian, .. }
            | Self::Int64 { big_endian, .. }
            | Self::Float32 { big_endian }
            | Self::Float64 { big_endian }
            | Self::Utf16 { big_endian }
            | Self::Utf32 { big_endian } => big_endian,
        }
    }

    /// Whether this encoding is byte-for-byte the host's in-memory layout.
    #[must_use]
    pub fn is_native(self) -> bool {
        matches!(self, Self::Int8 { .. }) || self.is_big_endian() == cfg!(target_endian = "big")
    }

    /// Whether values of `typecode` can be stored under this encoding
    /// without reinterpretation (same kind, width and signedness).
    #[must_use]
    pub fn represents(self, typecode: TypeCode) -> bool {
        let native = typecode.native_encoding();
        match (self, native) {
            (Self::Int8 { signed: a }, Self::Int8 { signed: b }) => a == b,
            (Self::Int16 { signed: a, .. }, Self::Int16 { signed: b, .. })
            | (Self::Int32 { signed: a, .. }, Self::Int32 { signed: b, .. })
            | (Self::Int64 { signed: a, .. }, Self::Int64 { signed: b, .. }) => a == b,
            (Self::Float32 { .. }, Self::Float32 { .. })
            | (Self::Float64 { .. }, Self::Float64 { .. })
            | (Self::Utf32 { .. }, Self::Utf32 { .. }) => true,
            _ => false,
        }
    }
}

impl From<MachineFormat> for u8 {
    fn from(format: MachineFormat) -> Self {
        let endian = |big_endian: bool| u8::from(big_endian);
        match format {
            MachineFormat::Int8 { signed } => u8::from(signed),
            MachineFormat::Int16 { signed, big_endian } => 2 + 2 * u8::from(signed) + endian(big_endian),
            MachineFormat::Int32 { signed, big_endian } => 6 + 2 * u8::from(signed) + endian(big_endian),
            MachineFormat::Int64 { signed, big_endian } => 10 + 2 * u8::from(signed) + endian(big_endian),
            MachineFormat::Float32 { big_endian } => 14 + endian(big_endian),
            MachineFormat::Float64 { big_endian } => 16 + endian(big_endian),
            MachineFormat::Utf16 { big_endian } => 18 + endian(big_endian),
            MachineFormat::Utf32 { big_endian } => 20 + endian(big_endian),
        }
    }
}

impl TryFrom<u8> for MachineFormat {
    type Error = RunError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        let big_endian = code % 2 == 1;
        Ok(match code {
            0 | 1 => Self::Int8 { signed: code == 1 },
            2..=5 => Self::Int16 {
                signed: code >= 4,
                big_endian,
            },
            6..=9 => Self::Int32 {
                signed: code >= 8,
                big_endian,
            },
            10..=13 => Self::Int64 {
                signed: code >= 12,
                big_endian,
            },
            14 | 15 => Self::Float32 { big_endian },
            16 | 17 => Self::Float64 { big_endian },
            18 | 19 => Self::Utf16 { big_endian },
            20 | 21 => Self::Utf32 { big_endian },
            _ => {
                return Err(ExcType::value_error(
                    "third argument must be a valid machine format code.",
                ));
            }
        })
    }
}
