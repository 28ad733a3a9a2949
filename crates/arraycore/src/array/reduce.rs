//! Pickling support and snapshot serialization.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

use super::{MachineFormat, TypeCode, TypedArray};
use crate::{
    exception::{ExcType, RunResult},
    interp::Interp,
    value::Value,
};

/// The state `array.__reduce_ex__` hands to the pickler.
#[derive(Debug, Clone)]
pub enum ReduceState {
    /// Protocols 0-2: rebuilt as `array(typecode, items)`.
    Legacy { typecode: char, items: Vec<Value> },
    /// Protocol 3 and later: rebuilt by [`array_reconstructor`].
    Modern {
        typecode: char,
        mformat_code: u8,
        items: Vec<u8>,
    },
}

impl ReduceState {
    /// Rebuilds the array this state was taken from.
    pub fn reconstruct(&self, interp: &mut Interp) -> RunResult<TypedArray> {
        match self {
            Self::Legacy { typecode, items } => TypedArray::with_initializer(
                TypeCode::try_from(*typecode)?,
                Some(&Value::List(items.clone())),
                interp,
            ),
            Self::Modern {
                typecode,
                mformat_code,
                items,
            } => array_reconstructor(*typecode, *mformat_code, items, interp),
        }
    }
}

impl TypedArray {
    /// `a.__reduce_ex__(protocol)`.
    pub fn reduce(&self, protocol: u8) -> RunResult<ReduceState> {
        let typecode = self.typecode.as_char();
        if protocol < 3 {
            return Ok(ReduceState::Legacy {
                typecode,
                items: self.tolist()?,
            });
        }
        Ok(ReduceState::Modern {
            typecode,
            mformat_code: self.typecode.native_encoding().code(),
            items: self.tobytes(),
        })
    }

    /// Serializes the array with postcard.
    pub fn dump(&self) -> RunResult<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|error| ExcType::value_error(format!("failed to serialize array: {error}")))
    }

    /// Restores an array written by [`dump`](Self::dump) on a host with the same byte order.
    pub fn load(bytes: &[u8]) -> RunResult<Self> {
        postcard::from_bytes(bytes)
            .map_err(|error| ExcType::value_error(format!("array snapshot was truncated or corrupted: {error}")))
    }
}

/// `array._array_reconstructor(array, typecode, mformat_code, items)`.
///
/// Bytes already in `typecode`'s native encoding are copied as is. Anything
/// else is decoded into values first: floats, text (UTF-16/UTF-32, either
/// byte order) and integers. Integer data picks the last typecode in
/// [`TYPECODES`](super::TYPECODES) order with the same width and signedness,
/// so the result may be narrower or wider than `typecode`.
pub fn array_reconstructor(
    typecode: char,
    mformat_code: u8,
    items: &[u8],
    interp: &mut Interp,
) -> RunResult<TypedArray> {
    let typecode =
        TypeCode::from_char(typecode).ok_or_else(|| ExcType::value_error("second argument must be a valid type code"))?;
    let format = MachineFormat::try_from(mformat_code)?;
    if format == typecode.native_encoding() {
        return TypedArray::with_initializer(typecode, Some(&Value::Bytes(items.to_vec())), interp);
    }

    let unit = format.item_size();
    if items.len() % unit != 0 {
        return Err(ExcType::value_error("string length not a multiple of item size"));
    }
    let big_endian = format.is_big_endian();
    let units = items.chunks_exact(unit).map(|chunk| read_unsigned(chunk, big_endian));
    let (typecode, decoded) = match format {
        MachineFormat::Float32 { .. } => (
            typecode,
            Value::List(units.map(|bits| Value::Float(f64::from(f32::from_bits(bits as u32)))).collect()),
        ),
        MachineFormat::Float64 { .. } => (
            typecode,
            Value::List(units.map(|bits| Value::Float(f64::from_bits(bits))).collect()),
        ),
        MachineFormat::Utf16 { .. } => (typecode, Value::Str(decode_utf16(items, big_endian)?)),
        MachineFormat::Utf32 { .. } => (typecode, Value::Str(decode_utf32(items, big_endian)?)),
        MachineFormat::Int8 { signed }
        | MachineFormat::Int16 { signed, .. }
        | MachineFormat::Int32 { signed, .. }
        | MachineFormat::Int64 { signed, .. } => {
            let best = TypeCode::ALL
                .iter()
                .rev()
                .find(|t| t.int_range().is_some_and(|(min, _)| (min < 0) == signed) && t.itemsize() == unit)
                .copied()
                .unwrap_or(typecode);
            let shift = 64 - 8 * unit as u32;
            let values = units
                .map(|raw| {
                    if signed {
                        Value::int(((raw << shift) as i64) >> shift)
                    } else {
                        Value::from(raw)
                    }
                })
                .collect();
            (best, Value::List(values))
        }
    };
    TypedArray::with_initializer(typecode, Some(&decoded), interp)
}

/// Reads a 1-8 byte unsigned integer.
fn read_unsigned(chunk: &[u8], big_endian: bool) -> u64 {
    let mut buf = [0u8; 8];
    if big_endian {
        buf[8 - chunk.len()..].copy_from_slice(chunk);
        u64::from_be_bytes(buf)
    } else {
        buf[..chunk.len()].copy_from_slice(chunk);
        u64::from_le_bytes(buf)
    }
}

fn decode_utf16(items: &[u8], big_endian: bool) -> RunResult<String> {
    let codec = if big_endian { "utf-16-be" } else { "utf-16-le" };
    let units = items.chunks_exact(2).map(|pair| {
        let pair = [pair[0], pair[1]];
        if big_endian {
            u16::from_be_bytes(pair)
        } else {
            u16::from_le_bytes(pair)
        }
    });
    let mut out = String::with_capacity(items.len() / 2);
    let mut position = 0;
    for decoded in char::decode_utf16(units) {
        let Ok(c) = decoded else {
            return Err(ExcType::unicode_decode_error(
                codec,
                position,
                position + 1,
                "illegal UTF-16 surrogate",
            ));
        };
        position += c.len_utf16() * 2;
        out.push(c);
    }
    Ok(out)
}

fn decode_utf32(items: &[u8], big_endian: bool) -> RunResult<String> {
    let codec = if big_endian { "utf-32-be" } else { "utf-32-le" };
    items
        .chunks_exact(4)
        .enumerate()
        .map(|(i, chunk)| {
            let code = read_unsigned(chunk, big_endian) as u32;
            char::from_u32(code).ok_or_else(|| {
                let reason = if (0xD800..0xE000).contains(&code) {
                    "code point in surrogate code point range(0xd800, 0xe000)"
                } else {
                    "code point not in range(0x110000)"
                };
                ExcType::unicode_decode_error(codec, i * 4, i * 4 + 3, reason)
            })
        })
        .collect()
}

/// On-disk form of an array: typecode, the machine format the bytes are in, and the bytes.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    typecode: TypeCode,
    mformat_code: u8,
    bytes: &'a [u8],
}

#[derive(Deserialize)]
struct Snapshot {
    typecode: TypeCode,
    mformat_code: u8,
    bytes: Vec<u8>,
}

impl Serialize for TypedArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SnapshotRef {
            typecode: self.typecode,
            mformat_code: self.typecode.native_encoding().code(),
            bytes: self.buffer.as_bytes(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TypedArray {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let snapshot = Snapshot::deserialize(deserializer)?;
        let native = snapshot.typecode.native_encoding().code();
        if snapshot.mformat_code != native {
            return Err(D::Error::custom(format!(
                "array snapshot holds machine format {} but this host stores '{}' as {native}",
                snapshot.mformat_code,
                snapshot.typecode.as_char()
            )));
        }
        if snapshot.bytes.len() % snapshot.typecode.itemsize() != 0 {
            return Err(D::Error::custom("array snapshot length is not a multiple of the item size"));
        }
        Ok(Self::from_packed(snapshot.typecode, snapshot.bytes))
    }
}
