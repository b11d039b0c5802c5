use crate::binxml::deserializer::decode_document_at_depth;
use crate::err::{DeserializationErrorKind, DeserializationResult as Result};
use crate::guid::Guid;
use crate::model::Document;
use crate::ntsid::Sid;
use crate::settings::ParserSettings;
use crate::utils::utf16::{decode_utf16_units_z, split_utf16_units_on_nul, utf16le_units};
use crate::utils::{ByteCursor, bytes, filetime_to_timestamp, systime_from_bytes};

use jiff::Timestamp;
use log::{trace, warn};
use serde::Serialize;
use std::fmt::Write;

pub(crate) const ARRAY_FLAG: u8 = 0x80;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum BinXmlValueType {
    Null,
    String,
    AnsiString,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Real32,
    Real64,
    Bool,
    Binary,
    Guid,
    SizeT,
    FileTime,
    SysTime,
    Sid,
    HexInt32,
    HexInt64,
    EvtHandle,
    BinXml,
    EvtXml,
    /// A type code outside the known table. The raw bytes are kept, rendering it fails.
    Unknown(u8),
}

impl BinXmlValueType {
    /// Maps a 7-bit type code (array flag already removed).
    pub fn from_u8(code: u8) -> BinXmlValueType {
        match code {
            0x00 => BinXmlValueType::Null,
            0x01 => BinXmlValueType::String,
            0x02 => BinXmlValueType::AnsiString,
            0x03 => BinXmlValueType::Int8,
            0x04 => BinXmlValueType::UInt8,
            0x05 => BinXmlValueType::Int16,
            0x06 => BinXmlValueType::UInt16,
            0x07 => BinXmlValueType::Int32,
            0x08 => BinXmlValueType::UInt32,
            0x09 => BinXmlValueType::Int64,
            0x0a => BinXmlValueType::UInt64,
            0x0b => BinXmlValueType::Real32,
            0x0c => BinXmlValueType::Real64,
            0x0d => BinXmlValueType::Bool,
            0x0e => BinXmlValueType::Binary,
            0x0f => BinXmlValueType::Guid,
            0x10 => BinXmlValueType::SizeT,
            0x11 => BinXmlValueType::FileTime,
            0x12 => BinXmlValueType::SysTime,
            0x13 => BinXmlValueType::Sid,
            0x14 => BinXmlValueType::HexInt32,
            0x15 => BinXmlValueType::HexInt64,
            0x20 => BinXmlValueType::EvtHandle,
            0x21 => BinXmlValueType::BinXml,
            0x23 => BinXmlValueType::EvtXml,
            other => BinXmlValueType::Unknown(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            BinXmlValueType::Null => 0x00,
            BinXmlValueType::String => 0x01,
            BinXmlValueType::AnsiString => 0x02,
            BinXmlValueType::Int8 => 0x03,
            BinXmlValueType::UInt8 => 0x04,
            BinXmlValueType::Int16 => 0x05,
            BinXmlValueType::UInt16 => 0x06,
            BinXmlValueType::Int32 => 0x07,
            BinXmlValueType::UInt32 => 0x08,
            BinXmlValueType::Int64 => 0x09,
            BinXmlValueType::UInt64 => 0x0a,
            BinXmlValueType::Real32 => 0x0b,
            BinXmlValueType::Real64 => 0x0c,
            BinXmlValueType::Bool => 0x0d,
            BinXmlValueType::Binary => 0x0e,
            BinXmlValueType::Guid => 0x0f,
            BinXmlValueType::SizeT => 0x10,
            BinXmlValueType::FileTime => 0x11,
            BinXmlValueType::SysTime => 0x12,
            BinXmlValueType::Sid => 0x13,
            BinXmlValueType::HexInt32 => 0x14,
            BinXmlValueType::HexInt64 => 0x15,
            BinXmlValueType::EvtHandle => 0x20,
            BinXmlValueType::BinXml => 0x21,
            BinXmlValueType::EvtXml => 0x23,
            BinXmlValueType::Unknown(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BinXmlValueType::Null => "Null",
            BinXmlValueType::String => "String",
            BinXmlValueType::AnsiString => "AnsiString",
            BinXmlValueType::Int8 => "Int8",
            BinXmlValueType::UInt8 => "UInt8",
            BinXmlValueType::Int16 => "Int16",
            BinXmlValueType::UInt16 => "UInt16",
            BinXmlValueType::Int32 => "Int32",
            BinXmlValueType::UInt32 => "UInt32",
            BinXmlValueType::Int64 => "Int64",
            BinXmlValueType::UInt64 => "UInt64",
            BinXmlValueType::Real32 => "Real32",
            BinXmlValueType::Real64 => "Real64",
            BinXmlValueType::Bool => "Bool",
            BinXmlValueType::Binary => "Binary",
            BinXmlValueType::Guid => "Guid",
            BinXmlValueType::SizeT => "SizeT",
            BinXmlValueType::FileTime => "FileTime",
            BinXmlValueType::SysTime => "SysTime",
            BinXmlValueType::Sid => "Sid",
            BinXmlValueType::HexInt32 => "HexInt32",
            BinXmlValueType::HexInt64 => "HexInt64",
            BinXmlValueType::EvtHandle => "EvtHandle",
            BinXmlValueType::BinXml => "BinXml",
            BinXmlValueType::EvtXml => "EvtXml",
            BinXmlValueType::Unknown(_) => "Unknown",
        }
    }

    /// Types that are carried through decoding but have no textual form.
    pub fn is_unsupported(self) -> bool {
        matches!(
            self,
            BinXmlValueType::EvtHandle | BinXmlValueType::EvtXml | BinXmlValueType::Unknown(_)
        )
    }
}

/// A declared value type byte: the 7-bit type code plus the array flag (`0x80`).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct ValueTypeCode {
    pub value_type: BinXmlValueType,
    pub is_array: bool,
}

impl ValueTypeCode {
    pub fn from_u8(byte: u8) -> Self {
        ValueTypeCode {
            value_type: BinXmlValueType::from_u8(byte & !ARRAY_FLAG),
            is_array: byte & ARRAY_FLAG != 0,
        }
    }

    pub fn to_u8(self) -> u8 {
        let flag = if self.is_array { ARRAY_FLAG } else { 0 };
        self.value_type.to_u8() | flag
    }

    pub fn is_null(self) -> bool {
        self.value_type == BinXmlValueType::Null
    }
}

/// One decoded item of a value slot.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub enum ValueData {
    String(String),
    AnsiString(String),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Real32(f32),
    Real64(f64),
    Bool(bool),
    /// Uppercase hex of the whole span.
    Binary(String),
    Guid(Guid),
    /// `0x`-prefixed, zero-padded lowercase hex.
    SizeT(String),
    FileTime(Timestamp),
    SysTime(Timestamp),
    Sid(Sid),
    HexInt32(String),
    HexInt64(String),
    BinXml(Box<Document>),
}

/// A slot of a template's value table.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Value {
    pub id: u16,
    /// Declared byte length of the slot.
    pub length: u16,
    pub value_type: ValueTypeCode,
    #[serde(skip)]
    pub raw: Vec<u8>,
    /// One item for scalars, N for arrays, none for Null and unsupported types.
    pub data: Vec<ValueData>,
}

impl Value {
    /// Decode the value body that `cursor` spans. The caller's region check makes sure the whole
    /// span is consumed.
    pub(crate) fn from_cursor(
        cursor: &mut ByteCursor<'_>,
        id: u16,
        value_type: ValueTypeCode,
        settings: &ParserSettings,
        depth: usize,
    ) -> Result<Value> {
        let raw = cursor.buf().to_vec();
        let length = raw.len() as u16;
        trace!(
            "Offset `0x{:08x}`: value {} of type {:?} ({} bytes)",
            cursor.offset(),
            id,
            value_type,
            length
        );
        let data = decode_value_data(cursor, value_type, settings, depth)?;

        Ok(Value {
            id,
            length,
            value_type,
            raw,
            data,
        })
    }

    /// A slot with a declared length of zero.
    pub(crate) fn empty(id: u16, value_type: ValueTypeCode) -> Value {
        Value {
            id,
            length: 0,
            value_type,
            raw: Vec::new(),
            data: Vec::new(),
        }
    }
}

/// Decode every item in the span of `cursor` according to `value_type`. `depth` is the nesting
/// level of the value table, nested BinXML documents continue from it.
pub(crate) fn decode_value_data(
    cursor: &mut ByteCursor<'_>,
    value_type: ValueTypeCode,
    settings: &ParserSettings,
    depth: usize,
) -> Result<Vec<ValueData>> {
    let is_array = value_type.is_array;

    let data = match value_type.value_type {
        BinXmlValueType::Null => {
            skip_rest(cursor, "null")?;
            Vec::new()
        }
        BinXmlValueType::String => read_utf16_strings(cursor, is_array)?,
        BinXmlValueType::AnsiString => read_ansi_strings(cursor, is_array, settings)?,
        BinXmlValueType::Int8 => {
            read_strided::<1, _>(cursor, "i8", |b| Some(ValueData::Int8(b[0] as i8)))?
        }
        BinXmlValueType::UInt8 => {
            read_strided::<1, _>(cursor, "u8", |b| Some(ValueData::UInt8(b[0])))?
        }
        BinXmlValueType::Int16 => read_strided::<2, _>(cursor, "i16", |b| {
            Some(ValueData::Int16(i16::from_le_bytes(b)))
        })?,
        BinXmlValueType::UInt16 => read_strided::<2, _>(cursor, "u16", |b| {
            Some(ValueData::UInt16(u16::from_le_bytes(b)))
        })?,
        BinXmlValueType::Int32 => read_strided::<4, _>(cursor, "i32", |b| {
            Some(ValueData::Int32(i32::from_le_bytes(b)))
        })?,
        BinXmlValueType::UInt32 => read_strided::<4, _>(cursor, "u32", |b| {
            Some(ValueData::UInt32(u32::from_le_bytes(b)))
        })?,
        BinXmlValueType::Int64 => read_strided::<8, _>(cursor, "i64", |b| {
            Some(ValueData::Int64(i64::from_le_bytes(b)))
        })?,
        BinXmlValueType::UInt64 => read_strided::<8, _>(cursor, "u64", |b| {
            Some(ValueData::UInt64(u64::from_le_bytes(b)))
        })?,
        BinXmlValueType::Real32 => read_strided::<4, _>(cursor, "f32", |b| {
            Some(ValueData::Real32(f32::from_le_bytes(b)))
        })?,
        BinXmlValueType::Real64 => read_strided::<8, _>(cursor, "f64", |b| {
            Some(ValueData::Real64(f64::from_le_bytes(b)))
        })?,
        BinXmlValueType::Bool => read_strided::<4, _>(cursor, "bool", |b| {
            let raw = u32::from_le_bytes(b);
            if raw > 1 {
                warn!("{:?} is an unknown value for bool, coercing to `true`", raw);
            }
            Some(ValueData::Bool(raw != 0))
        })?,
        BinXmlValueType::Binary => {
            let span = cursor.take_bytes(cursor.remaining(), "binary")?;
            vec![ValueData::Binary(to_hex_upper(span))]
        }
        BinXmlValueType::Guid => read_strided::<16, _>(cursor, "guid", |b| {
            Some(ValueData::Guid(Guid::from_bytes(&b)))
        })?,
        BinXmlValueType::SizeT => read_size_t(cursor, is_array)?,
        BinXmlValueType::FileTime => read_strided::<8, _>(cursor, "filetime", |b| {
            filetime_to_timestamp(u64::from_le_bytes(b)).map(ValueData::FileTime)
        })?,
        BinXmlValueType::SysTime => read_strided::<16, _>(cursor, "systime", |b| {
            systime_from_bytes(&b).map(ValueData::SysTime)
        })?,
        BinXmlValueType::Sid => read_sids(cursor)?,
        BinXmlValueType::HexInt32 => read_strided::<4, _>(cursor, "hex32", |b| {
            Some(ValueData::HexInt32(format!("0x{:08x}", u32::from_le_bytes(b))))
        })?,
        BinXmlValueType::HexInt64 => read_strided::<8, _>(cursor, "hex64", |b| {
            Some(ValueData::HexInt64(format!("0x{:016x}", u64::from_le_bytes(b))))
        })?,
        BinXmlValueType::BinXml => {
            let start = cursor.offset();
            let span = cursor.take_bytes(cursor.remaining(), "binxml")?;
            let nested = decode_document_at_depth(span, settings, depth).map_err(|e| {
                cursor.fail_at(start, DeserializationErrorKind::NestedDocument(Box::new(e)))
            })?;
            vec![ValueData::BinXml(Box::new(nested))]
        }
        unsupported @ (BinXmlValueType::EvtHandle
        | BinXmlValueType::EvtXml
        | BinXmlValueType::Unknown(_)) => {
            trace!(
                "Keeping {} raw bytes of unsupported value type `{}`",
                cursor.remaining(),
                unsupported.name()
            );
            skip_rest(cursor, "unsupported")?;
            Vec::new()
        }
    };

    Ok(data)
}

fn skip_rest(cursor: &mut ByteCursor<'_>, what: &'static str) -> Result<()> {
    cursor.take_bytes(cursor.remaining(), what).map(|_| ())
}

/// Walks the whole span in `N`-byte strides, one element per stride. The array flag plays no
/// part: a span that is not a multiple of `N` is a fault either way.
///
/// `parse` returns `None` for element bytes that do not form a valid value.
fn read_strided<const N: usize, T>(
    cursor: &mut ByteCursor<'_>,
    what: &'static str,
    parse: impl Fn([u8; N]) -> Option<T>,
) -> Result<Vec<T>> {
    let size = cursor.remaining();
    if size % N != 0 {
        return Err(cursor.fail(DeserializationErrorKind::MisalignedArray {
            what,
            size,
            elem: N,
        }));
    }
    let count = size / N;

    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = cursor.offset();
        let item = cursor.array::<N>(what)?;
        match parse(item) {
            Some(v) => out.push(v),
            None => {
                return Err(cursor.fail_at(offset, DeserializationErrorKind::InvalidDateTime { what }));
            }
        }
    }
    Ok(out)
}

fn read_utf16_strings(cursor: &mut ByteCursor<'_>, is_array: bool) -> Result<Vec<ValueData>> {
    let start = cursor.offset();
    let span = cursor.take_bytes(cursor.remaining(), "string")?;
    let invalid = |cursor: &mut ByteCursor<'_>| {
        cursor.fail_at(start, DeserializationErrorKind::InvalidUtf16 { what: "string" })
    };

    let units = match utf16le_units(span) {
        Ok(units) => units,
        Err(_) => return Err(invalid(cursor)),
    };

    if is_array {
        match split_utf16_units_on_nul(&units) {
            Ok(items) => Ok(items.into_iter().map(ValueData::String).collect()),
            Err(_) => Err(invalid(cursor)),
        }
    } else {
        match decode_utf16_units_z(&units) {
            Ok(s) => Ok(vec![ValueData::String(s)]),
            Err(_) => Err(invalid(cursor)),
        }
    }
}

fn read_ansi_strings(
    cursor: &mut ByteCursor<'_>,
    is_array: bool,
    settings: &ParserSettings,
) -> Result<Vec<ValueData>> {
    let start = cursor.offset();
    let span = cursor.take_bytes(cursor.remaining(), "ansi_string")?;
    let codec = settings.get_ansi_codec();

    let items: Vec<Vec<u8>> = if is_array {
        let mut parts: Vec<&[u8]> = span.split(|&b| b == 0).collect();
        if span.last() == Some(&0) || span.is_empty() {
            parts.pop();
        }
        parts.into_iter().map(<[u8]>::to_vec).collect()
    } else {
        vec![span.iter().copied().filter(|&b| b != 0).collect()]
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match codec.decode(&item, encoding::DecoderTrap::Strict) {
            Ok(s) => out.push(ValueData::AnsiString(s)),
            Err(m) => {
                return Err(cursor.fail_at(
                    start,
                    DeserializationErrorKind::AnsiDecode {
                        encoding: codec.name(),
                        message: m.to_string(),
                    },
                ));
            }
        }
    }
    Ok(out)
}

fn read_size_t(cursor: &mut ByteCursor<'_>, is_array: bool) -> Result<Vec<ValueData>> {
    if !is_array && cursor.remaining() == 4 {
        return read_strided::<4, _>(cursor, "size_t", |b| {
            Some(ValueData::SizeT(format!("0x{:08x}", u32::from_le_bytes(b))))
        });
    }
    read_strided::<8, _>(cursor, "size_t", |b| {
        Some(ValueData::SizeT(format!("0x{:016x}", u64::from_le_bytes(b))))
    })
}

/// SIDs are variable-length: each one is `8 + sub_authority_count * 4` bytes.
fn read_sids(cursor: &mut ByteCursor<'_>) -> Result<Vec<ValueData>> {
    let mut out = Vec::new();
    loop {
        let count = match bytes::read_u8(cursor.buf(), cursor.pos() + 1) {
            Some(count) => count,
            None => {
                let have = cursor.remaining();
                return Err(cursor.fail(DeserializationErrorKind::Truncated {
                    what: "sid",
                    need: 8,
                    have,
                }));
            }
        };
        let len = Sid::wire_len(count);
        let sid_bytes = cursor.take_bytes(len, "sid")?;
        match Sid::from_exact_bytes(sid_bytes) {
            Some(sid) => out.push(ValueData::Sid(sid)),
            None => {
                return Err(cursor.fail(DeserializationErrorKind::Truncated {
                    what: "sid",
                    need: len,
                    have: sid_bytes.len(),
                }));
            }
        }

        if cursor.remaining() == 0 {
            break;
        }
    }
    Ok(out)
}

fn to_hex_upper(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02X}", b);
    }
    s
}
