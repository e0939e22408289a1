//! Built-in sample schemas.
//!
//! The classic protobuf walkthrough types: a flat message, nested messages,
//! an enum, a oneof, a map and the address book. The CLI addresses them by
//! fully-qualified name via [`lookup`].

use std::sync::{Arc, OnceLock};

use crate::schema::{EnumDescriptor, FieldType, MessageSchema, MessageSchemaBuilder, ScalarType};

// =============================================================================
// Helpers
// =============================================================================

fn scalar(ty: ScalarType) -> FieldType {
    FieldType::Scalar(ty)
}

fn build(builder: MessageSchemaBuilder) -> Arc<MessageSchema> {
    builder.build().expect("vordefiniertes Schema muss gueltig sein")
}

fn build_enum(full_name: &str, values: &[(&str, i32)]) -> Arc<EnumDescriptor> {
    EnumDescriptor::new(full_name, values.iter().copied()).expect("vordefiniertes Enum muss gueltig sein")
}

macro_rules! cached {
    ($(#[$doc:meta])* $name:ident -> $ty:ty = $init:expr) => {
        $(#[$doc])*
        pub fn $name() -> Arc<$ty> {
            static CELL: OnceLock<Arc<$ty>> = OnceLock::new();
            Arc::clone(CELL.get_or_init(|| $init))
        }
    };
}

// =============================================================================
// example.simple
// =============================================================================

cached! {
    /// `example.simple.Simple { int32 id = 1; bool is_simple = 2; string name = 3; repeated int32 sample_list = 4; }`
    simple -> MessageSchema = build(
        MessageSchema::builder("example.simple.Simple")
            .singular(1, "id", scalar(ScalarType::Int32))
            .singular(2, "is_simple", scalar(ScalarType::Bool))
            .singular(3, "name", scalar(ScalarType::String))
            .repeated(4, "sample_list", scalar(ScalarType::Int32)),
    )
}

// =============================================================================
// example.complex
// =============================================================================

cached! {
    /// `example.complex.Dummy { int32 id = 1; string name = 2; }`
    dummy -> MessageSchema = build(
        MessageSchema::builder("example.complex.Dummy")
            .singular(1, "id", scalar(ScalarType::Int32))
            .singular(2, "name", scalar(ScalarType::String)),
    )
}

cached! {
    /// `example.complex.Complex { Dummy single_dummy = 2; repeated Dummy list_of_dummy = 3; }`
    complex -> MessageSchema = build(
        MessageSchema::builder("example.complex.Complex")
            .singular(2, "single_dummy", FieldType::Message(dummy()))
            .repeated(3, "list_of_dummy", FieldType::Message(dummy())),
    )
}

// =============================================================================
// example.enumerations
// =============================================================================

cached! {
    /// Only 1 and 2 carry names; 3 is a valid but unnamed value of this open enum.
    eye_color -> EnumDescriptor = build_enum(
        "example.enumerations.EyeColor",
        &[("EYECOLOR_UNSPECIFIED", 0), ("EYECOLOR_GREEN", 1), ("EYECOLOR_BROWN", 2)],
    )
}

cached! {
    /// `example.enumerations.Enumeration { EyeColor eye_color = 1; }`
    enumeration -> MessageSchema = build(
        MessageSchema::builder("example.enumerations.Enumeration")
            .singular(1, "eye_color", FieldType::Enum(eye_color())),
    )
}

// =============================================================================
// example.oneofs
// =============================================================================

cached! {
    /// `example.oneofs.Result { oneof result { string this = 1; string that = 2; } }`
    result -> MessageSchema = build(
        MessageSchema::builder("example.oneofs.Result").oneof(
            "result",
            [(1, "this", scalar(ScalarType::String)), (2, "that", scalar(ScalarType::String))],
        ),
    )
}

// =============================================================================
// example.maps
// =============================================================================

cached! {
    /// `example.maps.Drink { string size = 1; int32 price = 2; }`
    drink -> MessageSchema = build(
        MessageSchema::builder("example.maps.Drink")
            .singular(1, "size", scalar(ScalarType::String))
            .singular(2, "price", scalar(ScalarType::Int32)),
    )
}

cached! {
    /// `example.maps.DrinkMap { map<string, Drink> menu = 1; }`
    drink_map -> MessageSchema = build(
        MessageSchema::builder("example.maps.DrinkMap")
            .map(1, "menu", ScalarType::String, FieldType::Message(drink())),
    )
}

// =============================================================================
// example.addressbook
// =============================================================================

cached! {
    phone_type -> EnumDescriptor = build_enum(
        "example.addressbook.Person.PhoneType",
        &[("MOBILE", 0), ("HOME", 1), ("WORK", 2)],
    )
}

cached! {
    /// `Person.PhoneNumber { string number = 1; PhoneType type = 2; }`
    phone_number -> MessageSchema = build(
        MessageSchema::builder("example.addressbook.Person.PhoneNumber")
            .singular(1, "number", scalar(ScalarType::String))
            .singular(2, "type", FieldType::Enum(phone_type())),
    )
}

cached! {
    /// `example.addressbook.Person { string name = 1; int32 id = 2; string email = 3; repeated PhoneNumber phones = 4; }`
    person -> MessageSchema = build(
        MessageSchema::builder("example.addressbook.Person")
            .singular(1, "name", scalar(ScalarType::String))
            .singular(2, "id", scalar(ScalarType::Int32))
            .singular(3, "email", scalar(ScalarType::String))
            .repeated(4, "phones", FieldType::Message(phone_number())),
    )
}

cached! {
    /// `example.addressbook.AddressBook { repeated Person people = 1; }`
    address_book -> MessageSchema = build(
        MessageSchema::builder("example.addressbook.AddressBook")
            .repeated(1, "people", FieldType::Message(person())),
    )
}

// =============================================================================
// Lookup
// =============================================================================

const MESSAGES: &[(&str, fn() -> Arc<MessageSchema>)] = &[
    ("example.simple.Simple", simple),
    ("example.complex.Dummy", dummy),
    ("example.complex.Complex", complex),
    ("example.enumerations.Enumeration", enumeration),
    ("example.oneofs.Result", result),
    ("example.maps.Drink", drink),
    ("example.maps.DrinkMap", drink_map),
    ("example.addressbook.Person", person),
    ("example.addressbook.Person.PhoneNumber", phone_number),
    ("example.addressbook.AddressBook", address_book),
];

/// Fully-qualified names of all built-in message types.
pub fn message_names() -> impl Iterator<Item = &'static str> {
    MESSAGES.iter().map(|(name, _)| *name)
}

/// Looks a built-in message type up by fully-qualified name.
pub fn lookup(full_name: &str) -> Option<Arc<MessageSchema>> {
    MESSAGES
        .iter()
        .find(|(name, _)| *name == full_name)
        .map(|(_, schema)| schema())
}
