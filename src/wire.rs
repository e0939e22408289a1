//! Tag-prefixed wire records.
//!
//! Every record starts with a varint tag `(field_number << 3) | wire_type`
//! followed by a payload whose shape the wire type determines.

use std::fmt;

use crate::bytestream::{ByteReader, ByteWriter};
use crate::{Error, Result, varint};

/// Largest field number the tag encoding can carry (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Payload shape of a record (low 3 bits of the tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Varint payload (int32, int64, uint*, sint*, bool, enum).
    Varint = 0,
    /// 8 bytes little-endian (fixed64, sfixed64, double).
    Fixed64 = 1,
    /// Varint length followed by that many bytes (string, bytes, messages, packed).
    LengthDelimited = 2,
    /// 4 bytes little-endian (fixed32, sfixed32, float).
    Fixed32 = 5,
}

impl WireType {
    /// Maps a 3-bit wire-type code. Group codes (3, 4) and 6/7 are rejected.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => Err(Error::malformed(format!("unsupported wire type {other}"))),
        }
    }

    /// Numeric code as written into the tag.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Varint => "varint",
            Self::Fixed64 => "fixed64",
            Self::LengthDelimited => "length-delimited",
            Self::Fixed32 => "fixed32",
        };
        f.write_str(name)
    }
}

/// A decoded record payload borrowing from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValue<'a> {
    Varint(u64),
    Fixed64(u64),
    LengthDelimited(&'a [u8]),
    Fixed32(u32),
}

impl<'a> RawValue<'a> {
    /// Wire type this payload was read with.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Varint(_) => WireType::Varint,
            Self::Fixed64(_) => WireType::Fixed64,
            Self::LengthDelimited(_) => WireType::LengthDelimited,
            Self::Fixed32(_) => WireType::Fixed32,
        }
    }

    /// Copies the payload into an owned value.
    pub fn to_owned_value(&self) -> OwnedRawValue {
        match *self {
            Self::Varint(v) => OwnedRawValue::Varint(v),
            Self::Fixed64(v) => OwnedRawValue::Fixed64(v),
            Self::LengthDelimited(b) => OwnedRawValue::LengthDelimited(b.to_vec()),
            Self::Fixed32(v) => OwnedRawValue::Fixed32(v),
        }
    }
}

/// Owned counterpart of [`RawValue`], kept for fields the schema does not know.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnedRawValue {
    Varint(u64),
    Fixed64(u64),
    LengthDelimited(Vec<u8>),
    Fixed32(u32),
}

impl OwnedRawValue {
    /// Borrowed view of the payload.
    pub fn as_raw(&self) -> RawValue<'_> {
        match self {
            Self::Varint(v) => RawValue::Varint(*v),
            Self::Fixed64(v) => RawValue::Fixed64(*v),
            Self::LengthDelimited(b) => RawValue::LengthDelimited(b),
            Self::Fixed32(v) => RawValue::Fixed32(*v),
        }
    }
}

/// One `(field_number, wire_type, payload)` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub field_number: u32,
    pub value: RawValue<'a>,
}

impl Record<'_> {
    /// Wire type of the payload.
    pub fn wire_type(&self) -> WireType {
        self.value.wire_type()
    }
}

/// A record retained verbatim because its field number is not in the schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnknownRecord {
    pub field_number: u32,
    pub value: OwnedRawValue,
}

impl UnknownRecord {
    /// Re-emits the record exactly as it was read.
    pub fn write(&self, writer: &mut ByteWriter) {
        write_raw(writer, self.field_number, self.value.as_raw());
    }
}

/// Writes a tag for `field_number` / `wire_type`.
#[inline]
pub fn write_tag(writer: &mut ByteWriter, field_number: u32, wire_type: WireType) {
    debug_assert!(
        (1..=MAX_FIELD_NUMBER).contains(&field_number),
        "field number {field_number} out of range"
    );
    varint::encode(writer, (u64::from(field_number) << 3) | u64::from(wire_type.code()));
}

/// Writes a varint length prefix followed by `bytes`.
#[inline]
pub fn write_length_delimited(writer: &mut ByteWriter, bytes: &[u8]) {
    varint::encode(writer, bytes.len() as u64);
    writer.write_bytes(bytes);
}

/// Writes a complete record with the given payload.
pub fn write_raw(writer: &mut ByteWriter, field_number: u32, value: RawValue<'_>) {
    write_tag(writer, field_number, value.wire_type());
    match value {
        RawValue::Varint(v) => varint::encode(writer, v),
        RawValue::Fixed64(v) => writer.write_u64_le(v),
        RawValue::LengthDelimited(b) => write_length_delimited(writer, b),
        RawValue::Fixed32(v) => writer.write_u32_le(v),
    }
}

/// Reads and validates a tag, returning `(field_number, wire_type)`.
pub fn read_tag(reader: &mut ByteReader) -> Result<(u32, WireType)> {
    let tag = varint::decode(reader)?;
    let wire_type = WireType::from_code((tag & 0x7) as u8)?;
    let number = tag >> 3;
    if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
        return Err(Error::malformed(format!("invalid field number {number}")));
    }
    Ok((number as u32, wire_type))
}

/// Reads the next record from the stream.
pub fn read_record<'a>(reader: &mut ByteReader<'a>) -> Result<Record<'a>> {
    let (field_number, wire_type) = read_tag(reader)?;
    let value = match wire_type {
        WireType::Varint => RawValue::Varint(varint::decode(reader)?),
        WireType::Fixed64 => RawValue::Fixed64(reader.read_u64_le()?),
        WireType::LengthDelimited => {
            let len = varint::decode(reader)?;
            let len = usize::try_from(len)
                .map_err(|_| Error::malformed(format!("length {len} does not fit in memory")))?;
            RawValue::LengthDelimited(reader.read_slice(len)?)
        }
        WireType::Fixed32 => RawValue::Fixed32(reader.read_u32_le()?),
    };
    log::trace!("record #{field_number} ({wire_type})");
    Ok(Record { field_number, value })
}

/// Reads one record at `offset`, returning it with the offset of the next record.
pub fn read_record_at(buffer: &[u8], offset: usize) -> Result<(Record<'_>, usize)> {
    if offset >= buffer.len() {
        return Err(Error::truncated());
    }
    let mut reader = ByteReader::at(buffer, offset);
    let record = read_record(&mut reader)?;
    Ok((record, reader.position()))
}

/// Iterates over every record in a buffer; stops after the first error.
pub struct Records<'a> {
    reader: ByteReader<'a>,
    failed: bool,
}

impl<'a> Records<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { reader: ByteReader::new(data), failed: false }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let item = read_record(&mut self.reader);
        self.failed = item.is_err();
        Some(item)
    }
}
