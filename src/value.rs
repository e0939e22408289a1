//! Typed field values.
//!
//! A [`Value`] is the tagged union stored per field of a
//! [`MessageValue`](crate::message::MessageValue): a scalar, an enum number,
//! a nested message, an ordered list or a map. Which variant a field accepts
//! follows from its [`FieldType`]:
//!
//! | proto type                    | variant        |
//! |-------------------------------|----------------|
//! | int32, sint32, sfixed32       | `I32`          |
//! | int64, sint64, sfixed64       | `I64`          |
//! | uint32, fixed32               | `U32`          |
//! | uint64, fixed64               | `U64`          |
//! | float / double                | `F32` / `F64`  |
//! | bool, string, bytes           | `Bool`, `String`, `Bytes` |
//! | enum                          | `Enum`         |
//! | message                       | `Message`      |

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::message::MessageValue;
use crate::schema::{FieldKind, FieldType, MessageSchema, ScalarType};
use crate::FastIndexMap;

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Enum number; need not have a symbolic name (open enums).
    Enum(i32),
    Message(Box<MessageValue>),
    List(Vec<Value>),
    Map(MapValue),
}

impl Value {
    /// Zero value of a scalar type.
    pub fn default_scalar(ty: ScalarType) -> Value {
        match ty {
            ScalarType::Int32 | ScalarType::SInt32 | ScalarType::SFixed32 => Value::I32(0),
            ScalarType::Int64 | ScalarType::SInt64 | ScalarType::SFixed64 => Value::I64(0),
            ScalarType::UInt32 | ScalarType::Fixed32 => Value::U32(0),
            ScalarType::UInt64 | ScalarType::Fixed64 => Value::U64(0),
            ScalarType::Float => Value::F32(0.0),
            ScalarType::Double => Value::F64(0.0),
            ScalarType::Bool => Value::Bool(false),
            ScalarType::String => Value::String(String::new()),
            ScalarType::Bytes => Value::Bytes(Vec::new()),
        }
    }

    /// Zero value of an element type; messages are empty instances.
    pub fn default_for(ty: &FieldType) -> Value {
        match ty {
            FieldType::Scalar(s) => Value::default_scalar(*s),
            FieldType::Enum(_) => Value::Enum(0),
            FieldType::Message(schema) => Value::empty_message(schema),
        }
    }

    /// Zero value of a whole field: empty list/map for repeated and map fields.
    pub fn default_for_kind(kind: &FieldKind) -> Value {
        match kind {
            FieldKind::Singular(ty) => Value::default_for(ty),
            FieldKind::Repeated(_) => Value::List(Vec::new()),
            FieldKind::Map { .. } => Value::Map(MapValue::new()),
        }
    }

    pub(crate) fn empty_message(schema: &Arc<MessageSchema>) -> Value {
        Value::Message(Box::new(MessageValue::new(Arc::clone(schema))))
    }

    /// Whether this is the zero value of its variant (implicit-presence default).
    ///
    /// Messages are never "default": their presence is explicit.
    pub fn is_default(&self) -> bool {
        match self {
            Value::Bool(b) => !*b,
            Value::I32(v) => *v == 0,
            Value::I64(v) => *v == 0,
            Value::U32(v) => *v == 0,
            Value::U64(v) => *v == 0,
            // -0.0 zaehlt nicht als Default (bitweiser Vergleich)
            Value::F32(v) => v.to_bits() == 0,
            Value::F64(v) => v.to_bits() == 0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Enum(v) => *v == 0,
            Value::Message(_) => false,
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
        }
    }

    /// Whether this value can be stored in a field element of type `ty`.
    pub fn matches_type(&self, ty: &FieldType) -> bool {
        match (ty, self) {
            (FieldType::Scalar(s), v) => v.matches_scalar(*s),
            (FieldType::Enum(_), Value::Enum(_)) => true,
            (FieldType::Message(schema), Value::Message(m)) => {
                m.schema().full_name() == schema.full_name()
            }
            _ => false,
        }
    }

    fn matches_scalar(&self, ty: ScalarType) -> bool {
        matches!(
            (ty, self),
            (ScalarType::Int32 | ScalarType::SInt32 | ScalarType::SFixed32, Value::I32(_))
                | (ScalarType::Int64 | ScalarType::SInt64 | ScalarType::SFixed64, Value::I64(_))
                | (ScalarType::UInt32 | ScalarType::Fixed32, Value::U32(_))
                | (ScalarType::UInt64 | ScalarType::Fixed64, Value::U64(_))
                | (ScalarType::Float, Value::F32(_))
                | (ScalarType::Double, Value::F64(_))
                | (ScalarType::Bool, Value::Bool(_))
                | (ScalarType::String, Value::String(_))
                | (ScalarType::Bytes, Value::Bytes(_))
        )
    }

    /// Whether this value can be stored in a field of the given kind.
    pub fn matches_kind(&self, kind: &FieldKind) -> bool {
        match (kind, self) {
            (FieldKind::Singular(ty), v) => v.matches_type(ty),
            (FieldKind::Repeated(ty), Value::List(items)) => items.iter().all(|v| v.matches_type(ty)),
            (FieldKind::Map { key, value }, Value::Map(map)) => map
                .iter()
                .all(|(k, v)| k.matches_scalar(*key) && v.matches_type(value)),
            _ => false,
        }
    }

    /// Short description of the variant, used in `TypeMismatch` errors.
    pub fn describe(&self) -> Cow<'static, str> {
        match self {
            Value::Bool(_) => Cow::Borrowed("bool"),
            Value::I32(_) => Cow::Borrowed("i32"),
            Value::I64(_) => Cow::Borrowed("i64"),
            Value::U32(_) => Cow::Borrowed("u32"),
            Value::U64(_) => Cow::Borrowed("u64"),
            Value::F32(_) => Cow::Borrowed("f32"),
            Value::F64(_) => Cow::Borrowed("f64"),
            Value::String(_) => Cow::Borrowed("string"),
            Value::Bytes(_) => Cow::Borrowed("bytes"),
            Value::Enum(_) => Cow::Borrowed("enum number"),
            Value::Message(m) => Cow::Owned(format!("message {}", m.schema().full_name())),
            Value::List(_) => Cow::Borrowed("list"),
            Value::Map(_) => Cow::Borrowed("map"),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            Value::F32(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<i32> {
        match self {
            Value::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageValue> {
        match self {
            Value::Message(m) => Some(&**m),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut MessageValue> {
        match self {
            Value::Message(m) => Some(&mut **m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Converts a scalar value into a map key, if the variant can key a map.
    pub fn to_map_key(&self) -> Option<MapKey> {
        match self {
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::I32(v) => Some(MapKey::I32(*v)),
            Value::I64(v) => Some(MapKey::I64(*v)),
            Value::U32(v) => Some(MapKey::U32(*v)),
            Value::U64(v) => Some(MapKey::U64(*v)),
            Value::String(s) => Some(MapKey::String(s.clone())),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    MapValue => Map,
}

impl From<MessageValue> for Value {
    fn from(m: MessageValue) -> Self {
        Value::Message(Box::new(m))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Key of a map field entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl MapKey {
    /// Zero key of a key type (used when an entry omits its key).
    pub fn default_for(ty: ScalarType) -> Option<MapKey> {
        Value::default_scalar(ty).to_map_key()
    }

    /// Whether this key fits a map declared with key type `ty`.
    pub fn matches_scalar(&self, ty: ScalarType) -> bool {
        self.to_value().matches_scalar(ty)
    }

    /// The key as a plain value.
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::I32(v) => Value::I32(*v),
            MapKey::I64(v) => Value::I64(*v),
            MapKey::U32(v) => Value::U32(*v),
            MapKey::U64(v) => Value::U64(*v),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            MapKey::Bool(_) => "bool",
            MapKey::I32(_) => "i32",
            MapKey::I64(_) => "i64",
            MapKey::U32(_) => "u32",
            MapKey::U64(_) => "u64",
            MapKey::String(_) => "string",
        }
    }

    pub(crate) fn describe_key(&self) -> Cow<'static, str> {
        Cow::Owned(format!("{} key", self.describe()))
    }
}

/// Renders the key the way JSON object keys spell it (`true`, `42`, `latte`).
impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{b}"),
            MapKey::I32(v) => write!(f, "{v}"),
            MapKey::I64(v) => write!(f, "{v}"),
            MapKey::U32(v) => write!(f, "{v}"),
            MapKey::U64(v) => write!(f, "{v}"),
            MapKey::String(s) => f.write_str(s),
        }
    }
}

macro_rules! key_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for MapKey {
                fn from(v: $ty) -> Self {
                    MapKey::$variant(v.into())
                }
            }
        )*
    };
}

key_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    String => String,
    &str => String,
}

/// Contents of a map field. Iteration follows insertion order; equality does not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapValue {
    entries: FastIndexMap<MapKey, Value>,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &MapKey) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &MapKey) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces an entry, returning the previous value.
    pub fn insert(&mut self, key: MapKey, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    /// Removes an entry, keeping the order of the others.
    pub fn remove(&mut self, key: &MapKey) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Returns the entry for `key`, inserting `default()` first if it is absent.
    pub fn get_or_insert_with(&mut self, key: MapKey, default: impl FnOnce() -> Value) -> &mut Value {
        self.entries.entry(key).or_insert_with(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.keys()
    }
}

impl FromIterator<(MapKey, Value)> for MapValue {
    fn from_iter<I: IntoIterator<Item = (MapKey, Value)>>(iter: I) -> Self {
        let mut map = MapValue::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumDescriptor, MessageSchema};

    #[test]
    fn scalar_defaults() {
        assert_eq!(Value::default_scalar(ScalarType::SInt32), Value::I32(0));
        assert_eq!(Value::default_scalar(ScalarType::Fixed64), Value::U64(0));
        assert_eq!(Value::default_scalar(ScalarType::String), Value::String(String::new()));
        assert!(Value::default_scalar(ScalarType::Double).is_default());
    }

    #[test]
    fn negative_zero_is_not_default() {
        assert!(Value::F64(0.0).is_default());
        assert!(!Value::F64(-0.0).is_default());
        assert!(!Value::F32(-0.0).is_default());
    }

    #[test]
    fn messages_are_never_default() {
        let schema = MessageSchema::builder("t.Empty").build().unwrap();
        let v = Value::default_for(&FieldType::Message(schema));
        assert!(!v.is_default());
        assert!(v.as_message().unwrap().is_empty());
    }

    #[test]
    fn scalar_type_matching() {
        let int64 = FieldType::Scalar(ScalarType::SFixed64);
        assert!(Value::I64(5).matches_type(&int64));
        assert!(!Value::I32(5).matches_type(&int64));
        assert!(!Value::U64(5).matches_type(&int64));
        assert!(Value::U32(1).matches_type(&FieldType::Scalar(ScalarType::Fixed32)));
    }

    #[test]
    fn enum_matching_is_open() {
        let color = EnumDescriptor::new("t.Color", [("GREEN", 1), ("BROWN", 2)]).unwrap();
        let ty = FieldType::Enum(color);
        assert!(Value::Enum(3).matches_type(&ty));
        assert!(!Value::I32(3).matches_type(&ty));
    }

    #[test]
    fn message_matching_by_type_name() {
        let a = MessageSchema::builder("t.A").build().unwrap();
        let b = MessageSchema::builder("t.B").build().unwrap();
        let value = Value::default_for(&FieldType::Message(Arc::clone(&a)));
        assert!(value.matches_type(&FieldType::Message(a)));
        assert!(!value.matches_type(&FieldType::Message(b)));
    }

    #[test]
    fn kind_matching() {
        let kind = FieldKind::Repeated(FieldType::Scalar(ScalarType::Int32));
        assert!(Value::List(vec![Value::I32(1), Value::I32(2)]).matches_kind(&kind));
        assert!(!Value::List(vec![Value::I32(1), Value::I64(2)]).matches_kind(&kind));
        assert!(!Value::I32(1).matches_kind(&kind));

        let map_kind = FieldKind::Map {
            key: ScalarType::String,
            value: FieldType::Scalar(ScalarType::Int32),
        };
        let good: MapValue = [(MapKey::from("a"), Value::I32(1))].into_iter().collect();
        let bad: MapValue = [(MapKey::from(1), Value::I32(1))].into_iter().collect();
        assert!(Value::Map(good).matches_kind(&map_kind));
        assert!(!Value::Map(bad).matches_kind(&map_kind));
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(10), Value::I32(10));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
        assert_eq!(MapKey::from("latte"), MapKey::String("latte".into()));
        assert_eq!(Value::I64(-3).to_map_key(), Some(MapKey::I64(-3)));
        assert_eq!(Value::F64(1.0).to_map_key(), None);
    }

    #[test]
    fn map_keys_display_like_json_keys() {
        assert_eq!(MapKey::Bool(true).to_string(), "true");
        assert_eq!(MapKey::I64(-7).to_string(), "-7");
        assert_eq!(MapKey::from("espresso").to_string(), "espresso");
    }

    #[test]
    fn map_value_preserves_insertion_order() {
        let mut map = MapValue::new();
        map.insert("latte".into(), Value::I32(40));
        map.insert("espresso".into(), Value::I32(20));
        map.insert("americano".into(), Value::I32(30));
        let keys: Vec<String> = map.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["latte", "espresso", "americano"]);

        map.remove(&MapKey::from("espresso"));
        let keys: Vec<String> = map.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["latte", "americano"]);
    }

    #[test]
    fn map_equality_ignores_order() {
        let a: MapValue = [(MapKey::from(1), Value::I32(1)), (MapKey::from(2), Value::I32(2))]
            .into_iter()
            .collect();
        let b: MapValue = [(MapKey::from(2), Value::I32(2)), (MapKey::from(1), Value::I32(1))]
            .into_iter()
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn get_or_insert_keeps_existing_entry() {
        let mut map = MapValue::new();
        *map.get_or_insert_with("k".into(), || Value::I32(0)) = Value::I32(5);
        let again = map.get_or_insert_with("k".into(), || Value::I32(0));
        assert_eq!(*again, Value::I32(5));
        assert_eq!(map.len(), 1);
    }
}
