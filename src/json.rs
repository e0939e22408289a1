//! JSON mapping of [`MessageValue`]s.
//!
//! Follows the proto3 JSON conventions: one object per message, keys in
//! lowerCamelCase (or the declared name), enums by name, 64-bit integers as
//! decimal strings, `bytes` as base64 and non-finite floats as the strings
//! `"NaN"`, `"Infinity"` and `"-Infinity"`. Properties appear in field-number
//! order; map entries and list elements keep their insertion order.
//!
//! # Beispiel
//!
//! ```
//! use protodyn::json::{to_json, JsonOptions};
//! use protodyn::{catalog, MessageValue, Value};
//!
//! let mut simple = MessageValue::new(catalog::simple());
//! simple.set_by_name("id", 10).unwrap();
//! simple.set_by_name("name", "hello").unwrap();
//! simple.set_by_name("sample_list", vec![Value::I32(1), Value::I32(2), Value::I32(3)]).unwrap();
//!
//! let json = to_json(&simple, &JsonOptions::default().with_preserve_field_names()).unwrap();
//! assert_eq!(json, r#"{"id":10,"name":"hello","sample_list":[1,2,3]}"#);
//! ```

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use serde::Serialize;
use serde_json::{Map, Number, Value as Json};

use crate::message::MessageValue;
use crate::schema::{FieldDescriptor, FieldKind, FieldType, MessageSchema, ScalarType};
use crate::value::{MapKey, Value};
use crate::{Error, Result};

/// Optionen fuer beide Richtungen des JSON-Mappings.
#[derive(Debug, Clone, Default)]
pub struct JsonOptions {
    /// Deklarierte Feldnamen statt lowerCamelCase ausgeben.
    pub preserve_field_names: bool,
    /// Auch abwesende Skalar-, Listen- und Map-Felder mit ihrem Default ausgeben.
    pub include_defaults: bool,
    /// Unbekannte Properties (und unbekannte Enum-Namen) beim Parsen verwerfen.
    pub ignore_unknown_fields: bool,
    /// Enums immer als Zahl ausgeben.
    pub use_integers_for_enums: bool,
    /// `None` = einzeilig, `Some(n)` = eingerueckt mit n Leerzeichen.
    pub indent: Option<usize>,
}

impl JsonOptions {
    pub fn preserve_field_names(&self) -> bool { self.preserve_field_names }

    pub fn include_defaults(&self) -> bool { self.include_defaults }

    pub fn ignore_unknown_fields(&self) -> bool { self.ignore_unknown_fields }

    pub fn use_integers_for_enums(&self) -> bool { self.use_integers_for_enums }

    pub fn indent(&self) -> Option<usize> { self.indent }

    pub fn with_preserve_field_names(mut self) -> Self { self.preserve_field_names = true; self }

    pub fn with_include_defaults(mut self) -> Self { self.include_defaults = true; self }

    pub fn with_ignore_unknown_fields(mut self) -> Self { self.ignore_unknown_fields = true; self }

    pub fn with_integers_for_enums(mut self) -> Self { self.use_integers_for_enums = true; self }

    pub fn with_indent(mut self, width: usize) -> Self { self.indent = Some(width); self }
}

// ============================================================================
// MessageValue -> JSON
// ============================================================================

/// Renders `message` as JSON text.
pub fn to_json(message: &MessageValue, options: &JsonOptions) -> Result<String> {
    let value = to_json_value(message, options)?;
    let Some(width) = options.indent else {
        return serde_json::to_string(&value)
            .map_err(|e| Error::malformed(format!("JSON encode error: {e}")));
    };
    let indent = " ".repeat(width);
    let mut out = Vec::with_capacity(128);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| Error::malformed(format!("JSON encode error: {e}")))?;
    String::from_utf8(out).map_err(|e| Error::malformed(format!("JSON encode error: {e}")))
}

/// Renders `message` as a `serde_json` tree.
pub fn to_json_value(message: &MessageValue, options: &JsonOptions) -> Result<Json> {
    let schema = message.schema();
    let mut object = Map::new();
    for field in schema.fields() {
        let number = field.number();
        if !message.has(number) && !emits_default(field, options) {
            continue;
        }
        let value = message.get(number)?;
        let key = if options.preserve_field_names { field.name() } else { field.json_name() };
        object.insert(key.to_string(), field_to_json(field, &value, options)?);
    }
    Ok(Json::Object(object))
}

/// Abwesende oneof-Member und Message-Felder werden nie mit Default ausgegeben.
fn emits_default(field: &FieldDescriptor, options: &JsonOptions) -> bool {
    options.include_defaults
        && field.oneof_index().is_none()
        && !matches!(field.kind(), FieldKind::Singular(FieldType::Message(_)))
}

fn field_to_json(field: &FieldDescriptor, value: &Value, options: &JsonOptions) -> Result<Json> {
    match (field.kind(), value) {
        (FieldKind::Singular(ty), value) => element_to_json(field, ty, value, options),
        (FieldKind::Repeated(ty), Value::List(items)) => items
            .iter()
            .map(|item| element_to_json(field, ty, item, options))
            .collect::<Result<Vec<_>>>()
            .map(Json::Array),
        (FieldKind::Map { value: value_type, .. }, Value::Map(map)) => {
            let mut object = Map::new();
            for (key, entry) in map.iter() {
                object.insert(key.to_string(), element_to_json(field, value_type, entry, options)?);
            }
            Ok(Json::Object(object))
        }
        (kind, value) => Err(Error::type_mismatch(field.name().to_string(), kind.describe(), value.describe())),
    }
}

fn element_to_json(field: &FieldDescriptor, ty: &FieldType, value: &Value, options: &JsonOptions) -> Result<Json> {
    Ok(match (ty, value) {
        (FieldType::Enum(desc), Value::Enum(n)) => match desc.name_of(*n) {
            Some(name) if !options.use_integers_for_enums => Json::String(name.to_string()),
            _ => Json::from(*n),
        },
        (FieldType::Message(_), Value::Message(m)) if value.matches_type(ty) => to_json_value(m, options)?,
        (FieldType::Scalar(s), v) if v.matches_type(ty) => scalar_to_json(*s, v),
        (ty, value) => {
            return Err(Error::type_mismatch(field.name().to_string(), ty.type_name(), value.describe()));
        }
    })
}

fn scalar_to_json(ty: ScalarType, value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::I32(v) => Json::from(*v),
        Value::U32(v) => Json::from(*v),
        Value::I64(v) => Json::String(v.to_string()),
        Value::U64(v) => Json::String(v.to_string()),
        // kuerzeste f32-Darstellung statt der f64-Erweiterung (0.1 statt 0.100000001...)
        Value::F32(v) => float_to_json(v.to_string().parse().unwrap_or(f64::from(*v))),
        Value::F64(v) => float_to_json(*v),
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(b) => Json::String(STANDARD.encode(b)),
        other => {
            log::warn!("{ty}: cannot render {} as JSON scalar", other.describe());
            Json::Null
        }
    }
}

fn float_to_json(v: f64) -> Json {
    if v.is_nan() {
        Json::String("NaN".into())
    } else if v.is_infinite() {
        Json::String(if v > 0.0 { "Infinity" } else { "-Infinity" }.into())
    } else {
        Number::from_f64(v).map_or(Json::Null, Json::Number)
    }
}

// ============================================================================
// JSON -> MessageValue
// ============================================================================

/// Parses JSON text into an instance of `schema`.
pub fn from_json(text: &str, schema: &Arc<MessageSchema>, options: &JsonOptions) -> Result<MessageValue> {
    let value: Json = serde_json::from_str(text)
        .map_err(|e| Error::malformed(format!("JSON parse error: {e}")))?;
    from_json_value(&value, schema, options)
}

/// Builds an instance of `schema` from a `serde_json` tree.
pub fn from_json_value(value: &Json, schema: &Arc<MessageSchema>, options: &JsonOptions) -> Result<MessageValue> {
    let Json::Object(object) = value else {
        return Err(Error::type_mismatch(schema.full_name().to_string(), "JSON object", json_kind(value)));
    };
    let mut message = MessageValue::new(Arc::clone(schema));
    for (key, item) in object {
        let Some(field) = schema.field_by_name(key) else {
            if options.ignore_unknown_fields {
                log::warn!("{}: dropping unknown JSON property '{key}'", schema.full_name());
                continue;
            }
            return Err(Error::UnknownField(format!("{}.{key}", schema.full_name())));
        };
        if item.is_null() {
            continue;
        }
        parse_field(&mut message, field, item, options)?;
    }
    Ok(message)
}

fn parse_field(message: &mut MessageValue, field: &FieldDescriptor, item: &Json, options: &JsonOptions) -> Result<()> {
    let number = field.number();
    match field.kind() {
        FieldKind::Singular(ty) => {
            if let Some(value) = parse_element(field, ty, item, options)? {
                message.set(number, value)?;
            }
        }
        FieldKind::Repeated(ty) => {
            let Json::Array(items) = item else {
                return Err(mismatch(field, "JSON array", item));
            };
            for element in items {
                if let Some(value) = parse_element(field, ty, element, options)? {
                    message.add_repeated(number, value)?;
                }
            }
        }
        FieldKind::Map { key, value } => {
            let Json::Object(entries) = item else {
                return Err(mismatch(field, "JSON object", item));
            };
            for (k, v) in entries {
                let map_key = parse_map_key(field, *key, k)?;
                if let Some(entry) = parse_element(field, value, v, options)? {
                    message.map_put(number, map_key, entry)?;
                }
            }
        }
    }
    Ok(())
}

/// `Ok(None)` only for an unknown enum name under `ignore_unknown_fields`.
fn parse_element(field: &FieldDescriptor, ty: &FieldType, item: &Json, options: &JsonOptions) -> Result<Option<Value>> {
    match ty {
        FieldType::Scalar(s) => parse_scalar(field, *s, item).map(Some),
        FieldType::Message(_) if !item.is_object() => Err(mismatch(field, "JSON object", item)),
        FieldType::Message(schema) => Ok(Some(Value::from(from_json_value(item, schema, options)?))),
        FieldType::Enum(desc) => match item {
            Json::String(name) => match desc.number_of(name) {
                Some(n) => Ok(Some(Value::Enum(n))),
                None if options.ignore_unknown_fields => {
                    log::warn!("{}: dropping unknown enum name '{name}'", field.name());
                    Ok(None)
                }
                None => Err(Error::type_mismatch(
                    field.name().to_string(),
                    format!("value of enum {}", desc.full_name()),
                    format!("'{name}'"),
                )),
            },
            Json::Number(_) => Ok(Some(Value::Enum(parse_int::<i32>(field, item, "int32")?))),
            other => Err(mismatch(field, "enum name or number", other)),
        },
    }
}

fn parse_scalar(field: &FieldDescriptor, ty: ScalarType, item: &Json) -> Result<Value> {
    Ok(match ty {
        ScalarType::Int32 | ScalarType::SInt32 | ScalarType::SFixed32 => Value::I32(parse_int(field, item, ty.name())?),
        ScalarType::Int64 | ScalarType::SInt64 | ScalarType::SFixed64 => Value::I64(parse_int(field, item, ty.name())?),
        ScalarType::UInt32 | ScalarType::Fixed32 => Value::U32(parse_int(field, item, ty.name())?),
        ScalarType::UInt64 | ScalarType::Fixed64 => Value::U64(parse_int(field, item, ty.name())?),
        ScalarType::Double => Value::F64(parse_float(field, item)?),
        ScalarType::Float => {
            let v = parse_float(field, item)?;
            let narrowed = v as f32;
            if v.is_finite() && narrowed.is_infinite() {
                return Err(mismatch(field, "float in range", item));
            }
            Value::F32(narrowed)
        }
        ScalarType::Bool => match item {
            Json::Bool(b) => Value::Bool(*b),
            other => return Err(mismatch(field, "bool", other)),
        },
        ScalarType::String => match item {
            Json::String(s) => Value::String(s.clone()),
            other => return Err(mismatch(field, "string", other)),
        },
        ScalarType::Bytes => match item {
            Json::String(s) => Value::Bytes(decode_base64(s).ok_or_else(|| mismatch(field, "base64 string", item))?),
            other => return Err(mismatch(field, "base64 string", other)),
        },
    })
}

/// Accepts integral JSON numbers and exact decimal strings.
fn parse_int<T: TryFrom<i128>>(field: &FieldDescriptor, item: &Json, type_name: &'static str) -> Result<T> {
    let wide: Option<i128> = match item {
        Json::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .or_else(|| {
                let f = n.as_f64()?;
                // 2^64 begrenzt den Bereich; alles darueber ist ohnehin out of range
                (f.fract() == 0.0 && f.abs() < 1.8e19).then_some(f as i128)
            }),
        Json::String(s) => s.parse::<i128>().ok(),
        _ => None,
    };
    wide.and_then(|w| T::try_from(w).ok())
        .ok_or_else(|| mismatch(field, type_name, item))
}

fn parse_float(field: &FieldDescriptor, item: &Json) -> Result<f64> {
    match item {
        Json::Number(n) => n.as_f64().ok_or_else(|| mismatch(field, "number", item)),
        Json::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other.parse::<f64>().map_err(|_| mismatch(field, "number", item)),
        },
        other => Err(mismatch(field, "number", other)),
    }
}

fn parse_map_key(field: &FieldDescriptor, key_type: ScalarType, key: &str) -> Result<MapKey> {
    let text = Json::String(key.to_string());
    let value = match key_type {
        ScalarType::Bool => match key {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(mismatch(field, "bool map key", &text)),
        },
        other => parse_scalar(field, other, &text)?,
    };
    value
        .to_map_key()
        .ok_or_else(|| Error::type_mismatch(field.name().to_string(), "map key", key_type.name()))
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    [STANDARD, URL_SAFE, STANDARD_NO_PAD, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(text).ok())
}

fn json_kind(value: &Json) -> String {
    match value {
        Json::Null => "null".into(),
        Json::Bool(b) => format!("bool {b}"),
        Json::Number(n) => format!("number {n}"),
        Json::String(s) => format!("string {s:?}"),
        Json::Array(_) => "array".into(),
        Json::Object(_) => "object".into(),
    }
}

fn mismatch(field: &FieldDescriptor, expected: &'static str, found: &Json) -> Error {
    Error::type_mismatch(field.name().to_string(), expected, json_kind(found))
}
