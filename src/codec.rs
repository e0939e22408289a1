//! Binary serialization of [`MessageValue`]s.
//!
//! Encoding writes the present fields in ascending field-number order and then
//! re-emits retained unknown records unchanged. Decoding accepts records in any
//! order, merges repeated occurrences the protobuf way (last scalar wins,
//! repeated fields append, singular messages merge) and accepts both packed
//! and unpacked encodings of repeated numeric fields.
//!
//! # Beispiel
//!
//! ```
//! use protodyn::{catalog, codec, MessageValue};
//!
//! let mut simple = MessageValue::new(catalog::simple());
//! simple.set(1, 150).unwrap();
//!
//! let bytes = codec::encode(&simple).unwrap();
//! assert_eq!(bytes, vec![0x08, 0x96, 0x01]);
//!
//! let decoded = codec::decode(&bytes, &catalog::simple()).unwrap();
//! assert_eq!(decoded, simple);
//! ```

use std::sync::Arc;

use crate::bytestream::{ByteReader, ByteWriter};
use crate::message::MessageValue;
use crate::schema::{FieldDescriptor, FieldKind, FieldType, MessageSchema, ScalarType};
use crate::value::{MapKey, Value};
use crate::wire::{self, RawValue, Records, UnknownRecord, WireType};
use crate::{Error, Result, varint};

/// Maximum nesting depth of messages accepted by the parser.
pub const RECURSION_LIMIT: usize = 100;

/// Field numbers inside a map entry message.
const MAP_KEY: u32 = 1;
const MAP_VALUE: u32 = 2;

/// Encoder-Konfiguration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderConfig {
    /// Repeated numerische Felder als ein length-delimited Record schreiben.
    pub packed_repeated: bool,
}

impl EncoderConfig {
    /// Konfiguration mit packed repeated fields.
    pub fn with_packed_repeated() -> Self {
        Self { packed_repeated: true }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Serializes `message` with the default configuration (unpacked repeated fields).
pub fn encode(message: &MessageValue) -> Result<Vec<u8>> {
    encode_with_config(message, &EncoderConfig::default())
}

/// Serializes `message`.
///
/// Only fails with `TypeMismatch` if a value stored through a mutable handle
/// no longer matches its field type.
pub fn encode_with_config(message: &MessageValue, config: &EncoderConfig) -> Result<Vec<u8>> {
    let mut writer = ByteWriter::new();
    encode_message(&mut writer, message, config)?;
    Ok(writer.into_vec())
}

fn encode_message(writer: &mut ByteWriter, message: &MessageValue, config: &EncoderConfig) -> Result<()> {
    for (field, value) in message.fields() {
        encode_field(writer, field, value, config)?;
    }
    for record in message.unknown_fields() {
        record.write(writer);
    }
    Ok(())
}

fn encode_field(writer: &mut ByteWriter, field: &FieldDescriptor, value: &Value, config: &EncoderConfig) -> Result<()> {
    let number = field.number();
    match (field.kind(), value) {
        (FieldKind::Singular(ty), value) => encode_record(writer, field, number, ty, value, config),
        (FieldKind::Repeated(ty), Value::List(items)) => {
            if config.packed_repeated && ty.is_packable() && !items.is_empty() {
                let mut payload = ByteWriter::new();
                for item in items {
                    encode_payload(&mut payload, field, ty, item, config)?;
                }
                wire::write_tag(writer, number, WireType::LengthDelimited);
                wire::write_length_delimited(writer, payload.bytes());
                return Ok(());
            }
            for item in items {
                encode_record(writer, field, number, ty, item, config)?;
            }
            Ok(())
        }
        (FieldKind::Map { key, value: value_type }, Value::Map(map)) => {
            let key_type = FieldType::Scalar(*key);
            for (k, v) in map.iter() {
                let mut entry = ByteWriter::new();
                encode_record(&mut entry, field, MAP_KEY, &key_type, &k.to_value(), config)?;
                encode_record(&mut entry, field, MAP_VALUE, value_type, v, config)?;
                wire::write_tag(writer, number, WireType::LengthDelimited);
                wire::write_length_delimited(writer, entry.bytes());
            }
            Ok(())
        }
        (kind, value) => Err(Error::type_mismatch(field.name().to_string(), kind.describe(), value.describe())),
    }
}

/// Tag plus payload of one value.
fn encode_record(
    writer: &mut ByteWriter,
    field: &FieldDescriptor,
    number: u32,
    ty: &FieldType,
    value: &Value,
    config: &EncoderConfig,
) -> Result<()> {
    wire::write_tag(writer, number, ty.wire_type());
    encode_payload(writer, field, ty, value, config)
}

/// Payload of one value, without its tag.
fn encode_payload(
    writer: &mut ByteWriter,
    field: &FieldDescriptor,
    ty: &FieldType,
    value: &Value,
    config: &EncoderConfig,
) -> Result<()> {
    match (ty, value) {
        (FieldType::Scalar(s), v) => encode_scalar(writer, field, *s, v),
        // negative Enum-Nummern werden wie int32 auf 10 Bytes sign-extended
        (FieldType::Enum(_), Value::Enum(n)) => {
            varint::encode(writer, i64::from(*n) as u64);
            Ok(())
        }
        (FieldType::Message(_), Value::Message(m)) if value.matches_type(ty) => {
            let mut nested = ByteWriter::new();
            encode_message(&mut nested, m, config)?;
            wire::write_length_delimited(writer, nested.bytes());
            Ok(())
        }
        (ty, value) => Err(Error::type_mismatch(field.name().to_string(), ty.type_name(), value.describe())),
    }
}

fn encode_scalar(writer: &mut ByteWriter, field: &FieldDescriptor, ty: ScalarType, value: &Value) -> Result<()> {
    match (ty, value) {
        (ScalarType::Int32, Value::I32(v)) => varint::encode(writer, i64::from(*v) as u64),
        (ScalarType::Int64, Value::I64(v)) => varint::encode(writer, *v as u64),
        (ScalarType::UInt32, Value::U32(v)) => varint::encode(writer, u64::from(*v)),
        (ScalarType::UInt64, Value::U64(v)) => varint::encode(writer, *v),
        (ScalarType::SInt32, Value::I32(v)) => varint::encode(writer, u64::from(varint::zigzag_encode_32(*v))),
        (ScalarType::SInt64, Value::I64(v)) => varint::encode(writer, varint::zigzag_encode_64(*v)),
        (ScalarType::Bool, Value::Bool(b)) => writer.write_byte(u8::from(*b)),
        (ScalarType::Fixed32, Value::U32(v)) => writer.write_u32_le(*v),
        (ScalarType::SFixed32, Value::I32(v)) => writer.write_u32_le(*v as u32),
        (ScalarType::Float, Value::F32(v)) => writer.write_u32_le(v.to_bits()),
        (ScalarType::Fixed64, Value::U64(v)) => writer.write_u64_le(*v),
        (ScalarType::SFixed64, Value::I64(v)) => writer.write_u64_le(*v as u64),
        (ScalarType::Double, Value::F64(v)) => writer.write_u64_le(v.to_bits()),
        (ScalarType::String, Value::String(s)) => wire::write_length_delimited(writer, s.as_bytes()),
        (ScalarType::Bytes, Value::Bytes(b)) => wire::write_length_delimited(writer, b),
        (ty, value) => {
            return Err(Error::type_mismatch(field.name().to_string(), ty.name(), value.describe()));
        }
    }
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Parses `bytes` as an instance of `schema`.
///
/// Fails with `MalformedInput` on truncated records, overlong varints,
/// unsupported wire types, wire types that contradict the schema, invalid
/// UTF-8 in string fields and nesting deeper than [`RECURSION_LIMIT`].
pub fn decode(bytes: &[u8], schema: &Arc<MessageSchema>) -> Result<MessageValue> {
    let mut message = MessageValue::new(Arc::clone(schema));
    merge_at_depth(&mut message, bytes, 0)?;
    Ok(message)
}

/// Parses `bytes` into an existing message, merging with its current contents.
pub fn merge(message: &mut MessageValue, bytes: &[u8]) -> Result<()> {
    merge_at_depth(message, bytes, 0)
}

fn merge_at_depth(message: &mut MessageValue, bytes: &[u8], depth: usize) -> Result<()> {
    if depth > RECURSION_LIMIT {
        return Err(Error::malformed(format!("message nesting exceeds {RECURSION_LIMIT} levels")));
    }
    let schema = Arc::clone(message.schema());
    for record in Records::new(bytes) {
        let record = record?;
        match schema.field(record.field_number) {
            Some(field) => decode_field(message, field, record.value, depth)?,
            None => {
                log::debug!(
                    "{}: retaining unknown field #{} ({})",
                    schema.full_name(),
                    record.field_number,
                    record.wire_type()
                );
                message.push_unknown(UnknownRecord {
                    field_number: record.field_number,
                    value: record.value.to_owned_value(),
                });
            }
        }
    }
    Ok(())
}

fn decode_field(message: &mut MessageValue, field: &FieldDescriptor, raw: RawValue<'_>, depth: usize) -> Result<()> {
    match field.kind() {
        FieldKind::Singular(FieldType::Message(_)) => {
            let bytes = expect_length_delimited(field, raw)?;
            // wiederholte Records eines Message-Felds werden gemergt
            let nested = message.message_mut(field.number())?;
            merge_at_depth(nested, bytes, depth + 1)
        }
        FieldKind::Singular(ty) => {
            let value = decode_value(field, ty, raw)?;
            message.store(field, value);
            Ok(())
        }
        FieldKind::Repeated(FieldType::Message(schema)) => {
            let bytes = expect_length_delimited(field, raw)?;
            let mut element = MessageValue::new(Arc::clone(schema));
            merge_at_depth(&mut element, bytes, depth + 1)?;
            message.push_element(field, Value::from(element))
        }
        FieldKind::Repeated(ty) => match raw {
            RawValue::LengthDelimited(payload) if ty.is_packable() => {
                log::debug!("{}: packed payload of {} bytes", field.name(), payload.len());
                let mut reader = ByteReader::new(payload);
                while !reader.is_empty() {
                    let element = match ty.wire_type() {
                        WireType::Varint => RawValue::Varint(varint::decode(&mut reader)?),
                        WireType::Fixed32 => RawValue::Fixed32(reader.read_u32_le()?),
                        WireType::Fixed64 => RawValue::Fixed64(reader.read_u64_le()?),
                        WireType::LengthDelimited => {
                            return Err(Error::malformed(format!("field {}: cannot pack {}", field.name(), ty.type_name())));
                        }
                    };
                    message.push_element(field, decode_value(field, ty, element)?)?;
                }
                Ok(())
            }
            raw => {
                let value = decode_value(field, ty, raw)?;
                message.push_element(field, value)
            }
        },
        FieldKind::Map { key, value } => {
            let bytes = expect_length_delimited(field, raw)?;
            let (k, v) = decode_map_entry(field, *key, value, bytes, depth)?;
            message.insert_entry(field, k, v)
        }
    }
}

/// Parses one map entry; a missing key or value takes its type's zero value.
fn decode_map_entry(
    field: &FieldDescriptor,
    key_type: ScalarType,
    value_type: &FieldType,
    bytes: &[u8],
    depth: usize,
) -> Result<(MapKey, Value)> {
    let mut key = None;
    let mut value = None;
    for record in Records::new(bytes) {
        let record = record?;
        match record.field_number {
            MAP_KEY => {
                let scalar = decode_value(field, &FieldType::Scalar(key_type), record.value)?;
                key = scalar.to_map_key();
            }
            MAP_VALUE => match value_type {
                FieldType::Message(schema) => {
                    let payload = expect_length_delimited(field, record.value)?;
                    let slot = value.get_or_insert_with(|| Value::from(MessageValue::new(Arc::clone(schema))));
                    if let Some(nested) = slot.as_message_mut() {
                        merge_at_depth(nested, payload, depth + 1)?;
                    }
                }
                ty => value = Some(decode_value(field, ty, record.value)?),
            },
            other => log::debug!("{}: ignoring map entry field #{other}", field.name()),
        }
    }
    let key = match key.or_else(|| MapKey::default_for(key_type)) {
        Some(key) => key,
        None => return Err(Error::malformed(format!("field {}: invalid map key type {key_type}", field.name()))),
    };
    let value = value.unwrap_or_else(|| Value::default_for(value_type));
    Ok((key, value))
}

fn expect_length_delimited<'a>(field: &FieldDescriptor, raw: RawValue<'a>) -> Result<&'a [u8]> {
    match raw {
        RawValue::LengthDelimited(bytes) => Ok(bytes),
        other => Err(wire_type_mismatch(field, WireType::LengthDelimited, other.wire_type())),
    }
}

fn wire_type_mismatch(field: &FieldDescriptor, expected: WireType, found: WireType) -> Error {
    Error::malformed(format!(
        "field {} (#{}): expected wire type {expected}, found {found}",
        field.name(),
        field.number()
    ))
}

/// Converts one scalar or enum payload into a [`Value`].
fn decode_value(field: &FieldDescriptor, ty: &FieldType, raw: RawValue<'_>) -> Result<Value> {
    let expected = ty.wire_type();
    if raw.wire_type() != expected {
        return Err(wire_type_mismatch(field, expected, raw.wire_type()));
    }
    let scalar = match (ty, raw) {
        (FieldType::Scalar(s), _) => *s,
        (FieldType::Enum(_), RawValue::Varint(v)) => return Ok(Value::Enum(v as i32)),
        (FieldType::Enum(_), raw) => return Err(wire_type_mismatch(field, expected, raw.wire_type())),
        (FieldType::Message(_), _) => {
            return Err(Error::malformed(format!("field {}: message payload in scalar position", field.name())));
        }
    };
    Ok(match (scalar, raw) {
        (ScalarType::Int32, RawValue::Varint(v)) => Value::I32(v as i32),
        (ScalarType::Int64, RawValue::Varint(v)) => Value::I64(v as i64),
        (ScalarType::UInt32, RawValue::Varint(v)) => Value::U32(v as u32),
        (ScalarType::UInt64, RawValue::Varint(v)) => Value::U64(v),
        (ScalarType::SInt32, RawValue::Varint(v)) => Value::I32(varint::zigzag_decode_32(v as u32)),
        (ScalarType::SInt64, RawValue::Varint(v)) => Value::I64(varint::zigzag_decode_64(v)),
        (ScalarType::Bool, RawValue::Varint(v)) => Value::Bool(v != 0),
        (ScalarType::Fixed32, RawValue::Fixed32(v)) => Value::U32(v),
        (ScalarType::SFixed32, RawValue::Fixed32(v)) => Value::I32(v as i32),
        (ScalarType::Float, RawValue::Fixed32(v)) => Value::F32(f32::from_bits(v)),
        (ScalarType::Fixed64, RawValue::Fixed64(v)) => Value::U64(v),
        (ScalarType::SFixed64, RawValue::Fixed64(v)) => Value::I64(v as i64),
        (ScalarType::Double, RawValue::Fixed64(v)) => Value::F64(f64::from_bits(v)),
        (ScalarType::String, RawValue::LengthDelimited(b)) => match std::str::from_utf8(b) {
            Ok(s) => Value::String(s.to_string()),
            Err(e) => {
                return Err(Error::malformed(format!("field {}: invalid UTF-8 in string: {e}", field.name())));
            }
        },
        (ScalarType::Bytes, RawValue::LengthDelimited(b)) => Value::Bytes(b.to_vec()),
        (_, raw) => return Err(wire_type_mismatch(field, expected, raw.wire_type())),
    })
}
