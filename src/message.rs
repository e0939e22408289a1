//! Dynamic message instances.
//!
//! A [`MessageValue`] stores typed values keyed by field number and checks
//! every mutation against its [`MessageSchema`]. Besides plain get/set it
//! implements the three behaviors protobuf runtimes expose implicitly:
//!
//! - **oneof exclusion**: setting a member clears every sibling in the same
//!   `&mut self` call, so no caller can observe two members set;
//! - **auto-vivification**: [`message_mut`](MessageValue::message_mut) and
//!   [`map_get_or_create`](MessageValue::map_get_or_create) materialize an
//!   empty value in place on first access;
//! - **unknown-field retention**: records the parser could not map to a
//!   field are kept opaquely and written back on serialization.
//!
//! # Beispiel
//!
//! ```
//! use protodyn::catalog;
//! use protodyn::MessageValue;
//!
//! let mut result = MessageValue::new(catalog::result());
//! result.set_by_name("this", "this").unwrap();
//! result.set_by_name("that", "that").unwrap();
//!
//! assert_eq!(result.get_by_name("this").unwrap().as_str(), Some(""));
//! assert_eq!(result.get_by_name("that").unwrap().as_str(), Some("that"));
//! assert_eq!(result.which_oneof("result").unwrap(), Some(2));
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::schema::{FieldDescriptor, FieldKind, FieldType, MessageSchema};
use crate::value::{MapKey, MapValue, Value};
use crate::wire::UnknownRecord;
use crate::{Error, Result};

/// A mutable message instance conforming to one [`MessageSchema`].
#[derive(Clone)]
pub struct MessageValue {
    schema: Arc<MessageSchema>,
    /// Nur vorhandene Felder; Defaults werden nicht gespeichert (ausser bei oneof/message).
    fields: BTreeMap<u32, Value>,
    /// Pro oneof-Gruppe die aktuell gesetzte Feldnummer.
    oneof_cases: Vec<Option<u32>>,
    unknown: Vec<UnknownRecord>,
}

/// Looks a field up on a schema handle that is not borrowed from `self`.
fn lookup(schema: &MessageSchema, number: u32) -> Result<&FieldDescriptor> {
    schema
        .field(number)
        .ok_or_else(|| Error::UnknownField(format!("{}#{number}", schema.full_name())))
}

fn lookup_name<'s>(schema: &'s MessageSchema, name: &str) -> Result<&'s FieldDescriptor> {
    schema
        .field_by_name(name)
        .ok_or_else(|| Error::UnknownField(format!("{}.{name}", schema.full_name())))
}

fn mismatch(field: &FieldDescriptor, expected: impl Into<Cow<'static, str>>, found: impl Into<Cow<'static, str>>) -> Error {
    Error::type_mismatch(field.name().to_string(), expected, found)
}

impl MessageValue {
    /// Creates an empty instance of `schema`.
    pub fn new(schema: Arc<MessageSchema>) -> Self {
        let oneof_cases = vec![None; schema.oneofs().len()];
        Self {
            schema,
            fields: BTreeMap::new(),
            oneof_cases,
            unknown: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<MessageSchema> {
        &self.schema
    }

    /// `true` when no field is present and no unknown record is retained.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.unknown.is_empty()
    }

    /// Stores `value` in field `number`.
    ///
    /// Fails with `UnknownField` for undeclared numbers and `TypeMismatch`
    /// when the value does not fit the field kind. A oneof member clears its
    /// siblings first. Non-oneof scalars set to their zero value, and empty
    /// lists or maps, are removed (implicit presence).
    pub fn set(&mut self, number: u32, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let schema = Arc::clone(&self.schema);
        let field = lookup(&schema, number)?;
        if !value.matches_kind(field.kind()) {
            return Err(mismatch(field, field.kind().describe(), value.describe()));
        }
        self.store(field, value);
        Ok(())
    }

    /// [`set`](Self::set) addressed by declared or JSON name.
    pub fn set_by_name(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let number = lookup_name(&self.schema, name)?.number();
        self.set(number, value)
    }

    /// Stores an already validated value.
    pub(crate) fn store(&mut self, field: &FieldDescriptor, value: Value) {
        let number = field.number();
        if let Some(group) = field.oneof_index() {
            self.select_oneof(group, number);
            self.fields.insert(number, value);
            return;
        }
        let implicit = match field.kind() {
            FieldKind::Singular(FieldType::Message(_)) => false,
            _ => value.is_default(),
        };
        if implicit {
            self.fields.remove(&number);
        } else {
            self.fields.insert(number, value);
        }
    }

    /// Makes `number` the selected member of oneof `group`, clearing the siblings.
    fn select_oneof(&mut self, group: usize, number: u32) {
        if self.oneof_cases[group] == Some(number) {
            return;
        }
        if let Some(oneof) = self.schema.oneof(group) {
            for &sibling in oneof.field_numbers() {
                if sibling != number {
                    self.fields.remove(&sibling);
                }
            }
        }
        self.oneof_cases[group] = Some(number);
    }

    /// Returns the stored value or the field's zero value. Never mutates.
    ///
    /// Use [`has`](Self::has) to tell "never set" from "set to the default"
    /// for message fields and oneof members.
    pub fn get(&self, number: u32) -> Result<Cow<'_, Value>> {
        let field = lookup(&self.schema, number)?;
        Ok(match self.fields.get(&number) {
            Some(value) => Cow::Borrowed(value),
            None => Cow::Owned(Value::default_for_kind(field.kind())),
        })
    }

    /// [`get`](Self::get) addressed by declared or JSON name.
    pub fn get_by_name(&self, name: &str) -> Result<Cow<'_, Value>> {
        let number = lookup_name(&self.schema, name)?.number();
        self.get(number)
    }

    /// Whether field `number` holds a value.
    pub fn has(&self, number: u32) -> bool {
        self.fields.contains_key(&number)
    }

    /// Removes the value of field `number` (and deselects it if it is a oneof member).
    pub fn clear(&mut self, number: u32) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let field = lookup(&schema, number)?;
        self.fields.remove(&number);
        if let Some(group) = field.oneof_index() {
            if self.oneof_cases[group] == Some(number) {
                self.oneof_cases[group] = None;
            }
        }
        Ok(())
    }

    /// Field number of the member currently set in oneof `group`.
    pub fn which_oneof(&self, group: &str) -> Result<Option<u32>> {
        let (index, _) = self
            .schema
            .oneof_by_name(group)
            .ok_or_else(|| Error::UnknownField(format!("{}.{group}", self.schema.full_name())))?;
        Ok(self.oneof_cases[index])
    }

    /// Mutable handle to a singular message field, created empty on first access.
    ///
    /// For a oneof member this also selects it (clearing its siblings).
    pub fn message_mut(&mut self, number: u32) -> Result<&mut MessageValue> {
        let schema = Arc::clone(&self.schema);
        let field = lookup(&schema, number)?;
        let FieldKind::Singular(FieldType::Message(message_schema)) = field.kind() else {
            return Err(mismatch(field, "singular message field", field.kind().describe()));
        };
        if let Some(group) = field.oneof_index() {
            self.select_oneof(group, number);
        }
        let slot = self
            .fields
            .entry(number)
            .or_insert_with(|| Value::empty_message(message_schema));
        slot.as_message_mut()
            .ok_or_else(|| mismatch(field, field.kind().describe(), "corrupted slot"))
    }

    /// Appends `value` to repeated field `number`, preserving insertion order.
    pub fn add_repeated(&mut self, number: u32, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let schema = Arc::clone(&self.schema);
        let field = lookup(&schema, number)?;
        let FieldKind::Repeated(ty) = field.kind() else {
            return Err(mismatch(field, "repeated field", field.kind().describe()));
        };
        if !value.matches_type(ty) {
            return Err(mismatch(field, ty.type_name(), value.describe()));
        }
        self.list_mut(field)?.push(value);
        Ok(())
    }

    /// Appends an empty element to a repeated message field and returns it.
    pub fn add_message(&mut self, number: u32) -> Result<&mut MessageValue> {
        let schema = Arc::clone(&self.schema);
        let field = lookup(&schema, number)?;
        let FieldKind::Repeated(FieldType::Message(message_schema)) = field.kind() else {
            return Err(mismatch(field, "repeated message field", field.kind().describe()));
        };
        let list = self.list_mut(field)?;
        list.push(Value::empty_message(message_schema));
        list.last_mut()
            .and_then(Value::as_message_mut)
            .ok_or_else(|| mismatch(field, "message element", "nothing"))
    }

    /// Appends an already validated element (parser path).
    pub(crate) fn push_element(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        self.list_mut(field)?.push(value);
        Ok(())
    }

    /// Inserts an already validated map entry; a later entry replaces an earlier one.
    pub(crate) fn insert_entry(&mut self, field: &FieldDescriptor, key: MapKey, value: Value) -> Result<()> {
        self.map_slot(field)?.insert(key, value);
        Ok(())
    }

    fn list_mut(&mut self, field: &FieldDescriptor) -> Result<&mut Vec<Value>> {
        match self.fields.entry(field.number()).or_insert_with(|| Value::List(Vec::new())) {
            Value::List(items) => Ok(items),
            other => Err(mismatch(field, "list", other.describe())),
        }
    }

    fn map_slot(&mut self, field: &FieldDescriptor) -> Result<&mut MapValue> {
        match self.fields.entry(field.number()).or_insert_with(|| Value::Map(MapValue::new())) {
            Value::Map(map) => Ok(map),
            other => Err(mismatch(field, "map", other.describe())),
        }
    }

    /// Inserts or replaces entry `key` of map field `number`.
    pub fn map_put(&mut self, number: u32, key: impl Into<MapKey>, value: impl Into<Value>) -> Result<()> {
        let (key, value) = (key.into(), value.into());
        let schema = Arc::clone(&self.schema);
        let field = lookup(&schema, number)?;
        let FieldKind::Map { key: key_type, value: value_type } = field.kind() else {
            return Err(mismatch(field, "map field", field.kind().describe()));
        };
        if !key.matches_scalar(*key_type) {
            return Err(mismatch(field, format!("{key_type} key"), key.describe_key()));
        }
        if !value.matches_type(value_type) {
            return Err(mismatch(field, value_type.type_name(), value.describe()));
        }
        self.map_slot(field)?.insert(key, value);
        Ok(())
    }

    /// Reads entry `key` of map field `number` without creating it.
    pub fn map_get(&self, number: u32, key: &MapKey) -> Result<Option<&Value>> {
        let field = lookup(&self.schema, number)?;
        if !field.is_map() {
            return Err(mismatch(field, "map field", field.kind().describe()));
        }
        Ok(self.fields.get(&number).and_then(Value::as_map).and_then(|m| m.get(key)))
    }

    /// Returns a mutable handle to entry `key`, inserting the value type's zero
    /// value first if the key is absent. A second call with the same key returns
    /// the same entry, mutations included.
    pub fn map_get_or_create(&mut self, number: u32, key: impl Into<MapKey>) -> Result<&mut Value> {
        let key = key.into();
        let schema = Arc::clone(&self.schema);
        let field = lookup(&schema, number)?;
        let FieldKind::Map { key: key_type, value: value_type } = field.kind() else {
            return Err(mismatch(field, "map field", field.kind().describe()));
        };
        if !key.matches_scalar(*key_type) {
            return Err(mismatch(field, format!("{key_type} key"), key.describe_key()));
        }
        let map = self.map_slot(field)?;
        Ok(map.get_or_insert_with(key, || Value::default_for(value_type)))
    }

    /// `map[key]` for message-valued maps: the entry's message, created empty if absent.
    pub fn map_entry_message(&mut self, number: u32, key: impl Into<MapKey>) -> Result<&mut MessageValue> {
        let schema = Arc::clone(&self.schema);
        let field = lookup(&schema, number)?;
        if !matches!(field.kind(), FieldKind::Map { value: FieldType::Message(_), .. }) {
            return Err(mismatch(field, "map with message values", field.kind().describe()));
        }
        self.map_get_or_create(number, key)?
            .as_message_mut()
            .ok_or_else(|| mismatch(field, "message entry", "corrupted entry"))
    }

    /// Present fields in ascending field-number order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.fields
            .iter()
            .filter_map(|(number, value)| self.schema.field(*number).map(|f| (f, value)))
    }

    /// Records retained because the schema does not declare their field number.
    pub fn unknown_fields(&self) -> &[UnknownRecord] {
        &self.unknown
    }

    pub fn clear_unknown_fields(&mut self) {
        self.unknown.clear();
    }

    pub(crate) fn push_unknown(&mut self, record: UnknownRecord) {
        self.unknown.push(record);
    }
}

impl PartialEq for MessageValue {
    fn eq(&self, other: &Self) -> bool {
        self.schema.full_name() == other.schema.full_name()
            && self.fields == other.fields
            && self.oneof_cases == other.oneof_cases
            && self.unknown == other.unknown
    }
}

impl fmt::Debug for MessageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MessageValue");
        s.field("type", &self.schema.full_name());
        s.field("fields", &self.fields);
        if !self.unknown.is_empty() {
            s.field("unknown", &self.unknown);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::schema::ScalarType;

    #[test]
    fn set_and_get_scalars() {
        let mut m = MessageValue::new(catalog::simple());
        m.set(1, 10).unwrap();
        m.set(2, true).unwrap();
        m.set(3, "hello").unwrap();
        assert_eq!(m.get(1).unwrap().as_i32(), Some(10));
        assert_eq!(m.get(2).unwrap().as_bool(), Some(true));
        assert_eq!(m.get_by_name("name").unwrap().as_str(), Some("hello"));
    }

    #[test]
    fn absent_fields_read_as_zero_without_mutation() {
        let m = MessageValue::new(catalog::simple());
        assert_eq!(m.get(1).unwrap().into_owned(), Value::I32(0));
        assert_eq!(m.get(3).unwrap().into_owned(), Value::String(String::new()));
        assert_eq!(m.get(4).unwrap().into_owned(), Value::List(vec![]));
        assert!(m.is_empty());
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut m = MessageValue::new(catalog::simple());
        let err = m.set(1, "ten").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
        let err = m.set(4, vec![Value::I32(1), Value::String("x".into())]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
        assert!(m.is_empty());
    }

    #[test]
    fn unknown_number_rejected() {
        let mut m = MessageValue::new(catalog::simple());
        assert!(matches!(m.set(99, 1), Err(Error::UnknownField(_))));
        assert!(matches!(m.get(99), Err(Error::UnknownField(_))));
        assert!(matches!(m.set_by_name("nope", 1), Err(Error::UnknownField(_))));
    }

    #[test]
    fn zero_scalar_is_not_stored() {
        let mut m = MessageValue::new(catalog::simple());
        m.set(1, 5).unwrap();
        assert!(m.has(1));
        m.set(1, 0).unwrap();
        assert!(!m.has(1));
        m.set(4, Vec::<Value>::new()).unwrap();
        assert!(!m.has(4));
    }

    #[test]
    fn oneof_last_set_wins() {
        let mut m = MessageValue::new(catalog::result());
        m.set(1, "this").unwrap();
        assert_eq!(m.which_oneof("result").unwrap(), Some(1));

        m.set(2, "that").unwrap();
        assert!(!m.has(1));
        assert_eq!(m.get(1).unwrap().as_str(), Some(""));
        assert_eq!(m.get(2).unwrap().as_str(), Some("that"));
        assert_eq!(m.which_oneof("result").unwrap(), Some(2));
    }

    #[test]
    fn oneof_member_keeps_presence_at_default() {
        let mut m = MessageValue::new(catalog::result());
        m.set(1, "").unwrap();
        assert!(m.has(1));
        assert_eq!(m.which_oneof("result").unwrap(), Some(1));
    }

    #[test]
    fn oneof_clear_deselects() {
        let mut m = MessageValue::new(catalog::result());
        m.set(2, "that").unwrap();
        m.clear(2).unwrap();
        assert_eq!(m.which_oneof("result").unwrap(), None);
        assert!(matches!(m.which_oneof("missing"), Err(Error::UnknownField(_))));
    }

    #[test]
    fn message_mut_vivifies_in_place() {
        let mut m = MessageValue::new(catalog::complex());
        assert!(!m.has(2));
        {
            let dummy = m.message_mut(2).unwrap();
            dummy.set(1, 1).unwrap();
            dummy.set(2, "First").unwrap();
        }
        assert!(m.has(2));
        let single = m.get(2).unwrap();
        let single = single.as_message().unwrap();
        assert_eq!(single.get(2).unwrap().as_str(), Some("First"));
    }

    #[test]
    fn message_fields_keep_presence_when_empty() {
        let mut m = MessageValue::new(catalog::complex());
        m.message_mut(2).unwrap();
        assert!(m.has(2));
        assert!(m.get(2).unwrap().as_message().unwrap().is_empty());
    }

    #[test]
    fn message_mut_on_scalar_field_fails() {
        let mut m = MessageValue::new(catalog::simple());
        assert!(matches!(m.message_mut(1), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn repeated_preserves_order() {
        let mut m = MessageValue::new(catalog::simple());
        for v in [3, 1, 2] {
            m.add_repeated(4, v).unwrap();
        }
        let list = m.get(4).unwrap();
        let values: Vec<i32> = list.as_list().unwrap().iter().filter_map(Value::as_i32).collect();
        assert_eq!(values, vec![3, 1, 2]);
        assert!(m.add_repeated(4, "x").is_err());
        assert!(m.add_repeated(1, 5).is_err());
    }

    #[test]
    fn add_message_appends_elements() {
        let mut m = MessageValue::new(catalog::complex());
        for (id, name) in [(2, "Second"), (3, "Third"), (4, "Fourth")] {
            let dummy = m.add_message(3).unwrap();
            dummy.set(1, id).unwrap();
            dummy.set(2, name).unwrap();
        }
        let list = m.get(3).unwrap();
        let names: Vec<&str> = list
            .as_list()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_message()?.fields().nth(1).and_then(|(_, v)| v.as_str()))
            .collect();
        assert_eq!(names, vec!["Second", "Third", "Fourth"]);
    }

    #[test]
    fn map_get_or_create_is_stable() {
        let mut m = MessageValue::new(catalog::drink_map());
        m.map_entry_message(1, "latte").unwrap().set(1, "large").unwrap();
        m.map_entry_message(1, "latte").unwrap().set(2, 40).unwrap();

        let latte = m.map_get(1, &MapKey::from("latte")).unwrap().unwrap();
        let latte = latte.as_message().unwrap();
        assert_eq!(latte.get(1).unwrap().as_str(), Some("large"));
        assert_eq!(latte.get(2).unwrap().as_i32(), Some(40));
    }

    #[test]
    fn map_get_or_create_inserts_zero_value() {
        let schema = MessageSchema::builder("t.Counts")
            .map(1, "counts", ScalarType::String, FieldType::Scalar(ScalarType::Int32))
            .build()
            .unwrap();
        let mut m = MessageValue::new(schema);
        assert_eq!(m.map_get(1, &MapKey::from("a")).unwrap(), None);
        assert_eq!(*m.map_get_or_create(1, "a").unwrap(), Value::I32(0));
        *m.map_get_or_create(1, "a").unwrap() = Value::I32(7);
        assert_eq!(m.map_get(1, &MapKey::from("a")).unwrap(), Some(&Value::I32(7)));
        assert!(matches!(m.map_get_or_create(1, 5), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn map_put_validates() {
        let mut m = MessageValue::new(catalog::drink_map());
        assert!(m.map_put(1, "latte", 40).is_err());
        assert!(m.map_put(1, 3, MessageValue::new(catalog::drink())).is_err());
        m.map_put(1, "mocha", MessageValue::new(catalog::drink())).unwrap();
        assert!(m.map_get(1, &MapKey::from("mocha")).unwrap().is_some());
    }

    #[test]
    fn open_enum_accepts_unnamed_numbers() {
        let mut m = MessageValue::new(catalog::enumeration());
        m.set(1, Value::Enum(3)).unwrap();
        assert_eq!(m.get(1).unwrap().as_enum(), Some(3));
        m.set(1, Value::Enum(42)).unwrap();
        assert_eq!(m.get(1).unwrap().as_enum(), Some(42));
        assert!(m.set(1, 3).is_err());
    }

    #[test]
    fn equality_ignores_insertion_order_of_fields() {
        let mut a = MessageValue::new(catalog::simple());
        a.set(1, 10).unwrap();
        a.set(3, "x").unwrap();
        let mut b = MessageValue::new(catalog::simple());
        b.set(3, "x").unwrap();
        b.set(1, 10).unwrap();
        assert_eq!(a, b);
        b.set(1, 11).unwrap();
        assert_ne!(a, b);
    }
}
