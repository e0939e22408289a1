//! Static message type descriptions.
//!
//! A [`MessageSchema`] is the host-supplied, pre-compiled description of one
//! message type: its fields (number, name, kind), its oneof groups and the
//! enum/message types its fields refer to. Schemas are immutable once built
//! and shared via `Arc`, so a finished schema can be read from many threads.
//!
//! Nested message types are referenced by `Arc`, which means schemas are
//! assembled bottom-up and cannot describe self-recursive types.
//!
//! # Beispiel
//!
//! ```
//! use protodyn::schema::{FieldType, MessageSchema, ScalarType};
//!
//! let simple = MessageSchema::builder("example.simple.Simple")
//!     .singular(1, "id", FieldType::Scalar(ScalarType::Int32))
//!     .singular(2, "name", FieldType::Scalar(ScalarType::String))
//!     .repeated(3, "sample_list", FieldType::Scalar(ScalarType::Int32))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(simple.field(3).unwrap().json_name(), "sampleList");
//! assert_eq!(simple.field_by_name("sampleList").unwrap().number(), 3);
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::wire::{MAX_FIELD_NUMBER, WireType};
use crate::{Error, FastHashMap, Result};

/// Field numbers reserved for the protobuf implementation.
const RESERVED_NUMBERS: std::ops::RangeInclusive<u32> = 19_000..=19_999;

/// Scalar value types of the protobuf type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Double,
    Float,
    Int64,
    UInt64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Bytes,
    UInt32,
    SFixed32,
    SFixed64,
    SInt32,
    SInt64,
}

impl ScalarType {
    /// Name as written in a `.proto` file.
    pub fn name(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Int32 => "int32",
            Self::Fixed64 => "fixed64",
            Self::Fixed32 => "fixed32",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::UInt32 => "uint32",
            Self::SFixed32 => "sfixed32",
            Self::SFixed64 => "sfixed64",
            Self::SInt32 => "sint32",
            Self::SInt64 => "sint64",
        }
    }

    /// Wire type used for a single (unpacked) value.
    pub fn wire_type(self) -> WireType {
        match self {
            Self::Int32
            | Self::Int64
            | Self::UInt32
            | Self::UInt64
            | Self::SInt32
            | Self::SInt64
            | Self::Bool => WireType::Varint,
            Self::Fixed64 | Self::SFixed64 | Self::Double => WireType::Fixed64,
            Self::Fixed32 | Self::SFixed32 | Self::Float => WireType::Fixed32,
            Self::String | Self::Bytes => WireType::LengthDelimited,
        }
    }

    /// Numeric scalars can use packed repeated encoding.
    pub fn is_packable(self) -> bool {
        !matches!(self, Self::String | Self::Bytes)
    }

    /// Integral, bool and string scalars may key a map.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(self, Self::Double | Self::Float | Self::Bytes)
    }

    /// 64-bit integers are rendered as JSON strings.
    pub fn is_64bit_integer(self) -> bool {
        matches!(
            self,
            Self::Int64 | Self::UInt64 | Self::SInt64 | Self::Fixed64 | Self::SFixed64
        )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One named constant of an enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

/// Name ↔ number registry for one enum type.
///
/// Enums are open: a field of this type accepts integers without a name.
#[derive(Debug)]
pub struct EnumDescriptor {
    full_name: String,
    values: Vec<EnumValue>,
    by_name: FastHashMap<String, usize>,
    by_number: FastHashMap<i32, usize>,
}

impl EnumDescriptor {
    /// Builds an enum type from `(name, number)` pairs.
    ///
    /// Returns `SchemaViolation` for an empty value list, duplicate names or
    /// duplicate numbers.
    pub fn new<'n>(
        full_name: impl Into<String>,
        values: impl IntoIterator<Item = (&'n str, i32)>,
    ) -> Result<Arc<Self>> {
        let full_name = full_name.into();
        let mut desc = Self {
            full_name,
            values: Vec::new(),
            by_name: FastHashMap::default(),
            by_number: FastHashMap::default(),
        };
        for (name, number) in values {
            let idx = desc.values.len();
            if desc.by_name.insert(name.to_string(), idx).is_some() {
                return Err(Error::schema_violation(format!(
                    "enum {}: duplicate value name '{name}'",
                    desc.full_name
                )));
            }
            if desc.by_number.insert(number, idx).is_some() {
                return Err(Error::schema_violation(format!(
                    "enum {}: duplicate value number {number}",
                    desc.full_name
                )));
            }
            desc.values.push(EnumValue { name: name.to_string(), number });
        }
        if desc.values.is_empty() {
            return Err(Error::schema_violation(format!("enum {} has no values", desc.full_name)));
        }
        Ok(Arc::new(desc))
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn values(&self) -> &[EnumValue] {
        &self.values
    }

    /// Symbolic name of `number`, if it has one.
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.by_number.get(&number).map(|&i| self.values[i].name.as_str())
    }

    /// Number registered for `name`.
    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).map(|&i| self.values[i].number)
    }
}

/// Element type of a field.
#[derive(Debug, Clone)]
pub enum FieldType {
    Scalar(ScalarType),
    Enum(Arc<EnumDescriptor>),
    Message(Arc<MessageSchema>),
}

impl FieldType {
    /// Wire type of a single value of this type.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Scalar(s) => s.wire_type(),
            Self::Enum(_) => WireType::Varint,
            Self::Message(_) => WireType::LengthDelimited,
        }
    }

    /// Whether repeated fields of this type may be packed.
    pub fn is_packable(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_packable(),
            Self::Enum(_) => true,
            Self::Message(_) => false,
        }
    }

    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> Cow<'static, str> {
        match self {
            Self::Scalar(s) => Cow::Borrowed(s.name()),
            Self::Enum(e) => Cow::Owned(format!("enum {}", e.full_name())),
            Self::Message(m) => Cow::Owned(format!("message {}", m.full_name())),
        }
    }

    /// Two types are the same if they name the same scalar/enum/message.
    pub fn same_type(&self, other: &FieldType) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a.full_name() == b.full_name(),
            (Self::Message(a), Self::Message(b)) => a.full_name() == b.full_name(),
            _ => false,
        }
    }
}

/// Cardinality and shape of a field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// A single value (possibly a oneof member).
    Singular(FieldType),
    /// An ordered sequence of values.
    Repeated(FieldType),
    /// A key → value mapping, encoded as repeated entry messages (key = 1, value = 2).
    Map { key: ScalarType, value: FieldType },
}

impl FieldKind {
    /// Human-readable kind used in error messages.
    pub fn describe(&self) -> Cow<'static, str> {
        match self {
            Self::Singular(ty) => ty.type_name(),
            Self::Repeated(ty) => Cow::Owned(format!("repeated {}", ty.type_name())),
            Self::Map { key, value } => Cow::Owned(format!("map<{key}, {}>", value.type_name())),
        }
    }
}

/// Description of one field of a message type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    number: u32,
    name: String,
    json_name: String,
    kind: FieldKind,
    oneof: Option<usize>,
}

impl FieldDescriptor {
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Declared (snake_case) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// lowerCamelCase name used by the JSON mapping.
    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Index of the oneof group this field belongs to.
    pub fn oneof_index(&self) -> Option<usize> {
        self.oneof
    }

    /// Wire type of one record of this field (map entries and messages are length-delimited).
    pub fn wire_type(&self) -> WireType {
        match &self.kind {
            FieldKind::Singular(ty) | FieldKind::Repeated(ty) => ty.wire_type(),
            FieldKind::Map { .. } => WireType::LengthDelimited,
        }
    }

    pub fn is_repeated(&self) -> bool {
        matches!(self.kind, FieldKind::Repeated(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.kind, FieldKind::Map { .. })
    }
}

/// A named group of mutually exclusive fields.
#[derive(Debug, Clone)]
pub struct OneofDescriptor {
    name: String,
    fields: Vec<u32>,
}

impl OneofDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field numbers of the group members, in declaration order.
    pub fn field_numbers(&self) -> &[u32] {
        &self.fields
    }
}

/// Description of a message type: its fields ordered by number plus lookup tables.
#[derive(Debug)]
pub struct MessageSchema {
    full_name: String,
    fields: Vec<FieldDescriptor>,
    by_number: FastHashMap<u32, usize>,
    /// Deklarierter Name und JSON-Name zeigen beide auf dasselbe Feld.
    by_name: FastHashMap<String, usize>,
    oneofs: Vec<OneofDescriptor>,
}

impl MessageSchema {
    /// Starts building a message type with the given fully-qualified name.
    pub fn builder(full_name: impl Into<String>) -> MessageSchemaBuilder {
        MessageSchemaBuilder {
            full_name: full_name.into(),
            fields: Vec::new(),
            oneofs: Vec::new(),
        }
    }

    /// Fully-qualified name, e.g. `example.simple.Simple`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Last segment of the fully-qualified name.
    pub fn name(&self) -> &str {
        self.full_name.rsplit('.').next().unwrap_or(&self.full_name)
    }

    /// All fields in ascending field-number order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    /// Looks a field up by its declared name or its JSON (camelCase) name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn oneofs(&self) -> &[OneofDescriptor] {
        &self.oneofs
    }

    pub fn oneof(&self, index: usize) -> Option<&OneofDescriptor> {
        self.oneofs.get(index)
    }

    pub fn oneof_by_name(&self, name: &str) -> Option<(usize, &OneofDescriptor)> {
        self.oneofs.iter().enumerate().find(|(_, o)| o.name == name)
    }
}

/// Collects fields for a [`MessageSchema`]; all validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct MessageSchemaBuilder {
    full_name: String,
    fields: Vec<(u32, String, FieldKind, Option<usize>)>,
    oneofs: Vec<String>,
}

impl MessageSchemaBuilder {
    /// Adds a field of any kind.
    pub fn field(mut self, number: u32, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((number, name.into(), kind, None));
        self
    }

    /// Adds a singular field.
    pub fn singular(self, number: u32, name: impl Into<String>, ty: FieldType) -> Self {
        self.field(number, name, FieldKind::Singular(ty))
    }

    /// Adds a repeated field.
    pub fn repeated(self, number: u32, name: impl Into<String>, ty: FieldType) -> Self {
        self.field(number, name, FieldKind::Repeated(ty))
    }

    /// Adds a map field.
    pub fn map(self, number: u32, name: impl Into<String>, key: ScalarType, value: FieldType) -> Self {
        self.field(number, name, FieldKind::Map { key, value })
    }

    /// Adds a oneof group whose members are singular fields.
    pub fn oneof<'n>(
        mut self,
        group: impl Into<String>,
        members: impl IntoIterator<Item = (u32, &'n str, FieldType)>,
    ) -> Self {
        let index = self.oneofs.len();
        self.oneofs.push(group.into());
        for (number, name, ty) in members {
            self.fields
                .push((number, name.to_string(), FieldKind::Singular(ty), Some(index)));
        }
        self
    }

    /// Validates the collected fields and freezes the schema.
    pub fn build(self) -> Result<Arc<MessageSchema>> {
        let full_name = self.full_name;
        if full_name.is_empty() {
            return Err(Error::schema_violation("message type without a name"));
        }
        let violation = |msg: String| Error::schema_violation(format!("{full_name}: {msg}"));

        let mut oneofs: Vec<OneofDescriptor> = Vec::with_capacity(self.oneofs.len());
        for name in self.oneofs {
            if name.is_empty() {
                return Err(violation("oneof group without a name".into()));
            }
            if oneofs.iter().any(|o| o.name == name) {
                return Err(violation(format!("duplicate oneof group '{name}'")));
            }
            oneofs.push(OneofDescriptor { name, fields: Vec::new() });
        }

        let mut fields = Vec::with_capacity(self.fields.len());
        for (number, name, kind, oneof) in self.fields {
            if number == 0 || number > MAX_FIELD_NUMBER || RESERVED_NUMBERS.contains(&number) {
                return Err(violation(format!("field '{name}' has invalid number {number}")));
            }
            if name.is_empty() {
                return Err(violation(format!("field {number} has no name")));
            }
            if let FieldKind::Map { key, .. } = &kind {
                if !key.is_valid_map_key() {
                    return Err(violation(format!("map field '{name}' cannot be keyed by {key}")));
                }
            }
            if let Some(idx) = oneof {
                oneofs[idx].fields.push(number);
            }
            let json_name = to_json_name(&name);
            fields.push(FieldDescriptor { number, name, json_name, kind, oneof });
        }
        if let Some(empty) = oneofs.iter().find(|o| o.fields.is_empty()) {
            return Err(violation(format!("oneof group '{}' has no members", empty.name)));
        }

        fields.sort_by_key(|f| f.number);
        let mut by_number = FastHashMap::default();
        let mut by_name = FastHashMap::default();
        for (idx, field) in fields.iter().enumerate() {
            if by_number.insert(field.number, idx).is_some() {
                return Err(violation(format!("duplicate field number {}", field.number)));
            }
            if by_name.insert(field.name.clone(), idx).is_some() {
                return Err(violation(format!("duplicate field name '{}'", field.name)));
            }
            if field.json_name != field.name {
                if let Some(other) = by_name.insert(field.json_name.clone(), idx) {
                    return Err(violation(format!(
                        "JSON name '{}' of field '{}' collides with field '{}'",
                        field.json_name, field.name, fields[other].name
                    )));
                }
            }
        }

        Ok(Arc::new(MessageSchema { full_name, fields, by_number, by_name, oneofs }))
    }
}

/// lowerCamelCase transform: underscores are dropped and the following
/// character is upper-cased (`sample_list` → `sampleList`).
pub fn to_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32() -> FieldType {
        FieldType::Scalar(ScalarType::Int32)
    }

    fn string() -> FieldType {
        FieldType::Scalar(ScalarType::String)
    }

    #[test]
    fn json_names() {
        assert_eq!(to_json_name("id"), "id");
        assert_eq!(to_json_name("sample_list"), "sampleList");
        assert_eq!(to_json_name("list_of_dummy"), "listOfDummy");
        assert_eq!(to_json_name("a_b_c"), "aBC");
        assert_eq!(to_json_name("trailing_"), "trailing");
    }

    #[test]
    fn fields_sorted_by_number() {
        let s = MessageSchema::builder("t.M")
            .singular(3, "c", int32())
            .singular(1, "a", int32())
            .singular(2, "b", string())
            .build()
            .unwrap();
        let numbers: Vec<u32> = s.fields().iter().map(|f| f.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(s.name(), "M");
        assert_eq!(s.full_name(), "t.M");
    }

    #[test]
    fn lookup_by_both_name_forms() {
        let s = MessageSchema::builder("t.M")
            .repeated(4, "sample_list", int32())
            .build()
            .unwrap();
        assert_eq!(s.field_by_name("sample_list").unwrap().number(), 4);
        assert_eq!(s.field_by_name("sampleList").unwrap().number(), 4);
        assert!(s.field_by_name("SampleList").is_none());
        assert!(s.field(4).unwrap().is_repeated());
    }

    #[test]
    fn wire_types_follow_kind() {
        let inner = MessageSchema::builder("t.Inner").build().unwrap();
        let s = MessageSchema::builder("t.M")
            .singular(1, "i", int32())
            .singular(2, "d", FieldType::Scalar(ScalarType::Double))
            .singular(3, "f", FieldType::Scalar(ScalarType::Fixed32))
            .singular(4, "s", string())
            .singular(5, "m", FieldType::Message(inner))
            .map(6, "kv", ScalarType::String, int32())
            .build()
            .unwrap();
        assert_eq!(s.field(1).unwrap().wire_type(), WireType::Varint);
        assert_eq!(s.field(2).unwrap().wire_type(), WireType::Fixed64);
        assert_eq!(s.field(3).unwrap().wire_type(), WireType::Fixed32);
        assert_eq!(s.field(4).unwrap().wire_type(), WireType::LengthDelimited);
        assert_eq!(s.field(5).unwrap().wire_type(), WireType::LengthDelimited);
        assert_eq!(s.field(6).unwrap().wire_type(), WireType::LengthDelimited);
    }

    #[test]
    fn oneof_groups() {
        let s = MessageSchema::builder("example.oneofs.Result")
            .oneof("result", [(1, "this", string()), (2, "that", string())])
            .singular(3, "other", int32())
            .build()
            .unwrap();
        let (idx, group) = s.oneof_by_name("result").unwrap();
        assert_eq!(group.field_numbers(), &[1, 2]);
        assert_eq!(s.field(1).unwrap().oneof_index(), Some(idx));
        assert_eq!(s.field(3).unwrap().oneof_index(), None);
    }

    #[test]
    fn duplicate_number_rejected() {
        let err = MessageSchema::builder("t.M")
            .singular(1, "a", int32())
            .singular(1, "b", int32())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)), "{err}");
    }

    #[test]
    fn duplicate_number_inside_oneof_rejected() {
        let err = MessageSchema::builder("t.M")
            .singular(1, "a", int32())
            .oneof("choice", [(1, "b", string())])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate field number 1"), "{err}");
    }

    #[test]
    fn invalid_numbers_rejected() {
        for n in [0, 19_000, 19_999, MAX_FIELD_NUMBER + 1] {
            let err = MessageSchema::builder("t.M").singular(n, "a", int32()).build();
            assert!(matches!(err, Err(Error::SchemaViolation(_))), "number {n}");
        }
        assert!(MessageSchema::builder("t.M").singular(MAX_FIELD_NUMBER, "a", int32()).build().is_ok());
    }

    #[test]
    fn duplicate_and_colliding_names_rejected() {
        assert!(MessageSchema::builder("t.M")
            .singular(1, "a", int32())
            .singular(2, "a", int32())
            .build()
            .is_err());
        // foo_bar → fooBar kollidiert mit einem Feld namens fooBar
        assert!(MessageSchema::builder("t.M")
            .singular(1, "foo_bar", int32())
            .singular(2, "fooBar", int32())
            .build()
            .is_err());
    }

    #[test]
    fn map_key_types() {
        assert!(MessageSchema::builder("t.M")
            .map(1, "m", ScalarType::Double, int32())
            .build()
            .is_err());
        assert!(MessageSchema::builder("t.M")
            .map(1, "m", ScalarType::Bytes, int32())
            .build()
            .is_err());
        assert!(MessageSchema::builder("t.M")
            .map(1, "m", ScalarType::Bool, int32())
            .build()
            .is_ok());
    }

    #[test]
    fn empty_oneof_rejected() {
        let err = MessageSchema::builder("t.M")
            .oneof("nothing", std::iter::empty::<(u32, &str, FieldType)>())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no members"), "{err}");
    }

    #[test]
    fn enum_registry() {
        let e = EnumDescriptor::new("t.Color", [("GREEN", 1), ("BROWN", 2)]).unwrap();
        assert_eq!(e.name_of(2), Some("BROWN"));
        assert_eq!(e.name_of(3), None);
        assert_eq!(e.number_of("GREEN"), Some(1));
        assert_eq!(e.number_of("RED"), None);
        assert_eq!(e.values().len(), 2);
    }

    #[test]
    fn enum_duplicates_rejected() {
        assert!(EnumDescriptor::new("t.E", [("A", 0), ("A", 1)]).is_err());
        assert!(EnumDescriptor::new("t.E", [("A", 0), ("B", 0)]).is_err());
        assert!(EnumDescriptor::new("t.E", std::iter::empty::<(&str, i32)>()).is_err());
    }

    #[test]
    fn kind_descriptions() {
        let kind = FieldKind::Map { key: ScalarType::String, value: int32() };
        assert_eq!(kind.describe(), "map<string, int32>");
        assert_eq!(FieldKind::Repeated(string()).describe(), "repeated string");
    }
}
