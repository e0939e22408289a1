//! protodyn – schema-driven dynamic protocol buffer messages
//!
//! Messages are built at runtime against a [`MessageSchema`] and converted
//! between the protobuf binary wire format, the proto3 JSON mapping and the
//! text format.
//!
//! # Beispiel
//!
//! ```
//! use protodyn::{catalog, codec, json, MessageValue, Value};
//!
//! // Aufbauen
//! let mut simple = MessageValue::new(catalog::simple());
//! simple.set_by_name("id", 10).unwrap();
//! simple.set_by_name("name", "hello").unwrap();
//! simple.add_repeated(4, 1).unwrap();
//! simple.add_repeated(4, 2).unwrap();
//!
//! // Binaer
//! let bytes = codec::encode(&simple).unwrap();
//! let decoded = codec::decode(&bytes, &catalog::simple()).unwrap();
//! assert_eq!(decoded, simple);
//!
//! // JSON
//! let text = json::to_json(&decoded, &json::JsonOptions::default()).unwrap();
//! assert_eq!(text, r#"{"id":10,"name":"hello","sampleList":[1,2]}"#);
//! assert_eq!(decoded.get(4).unwrap().into_owned(), Value::List(vec![Value::I32(1), Value::I32(2)]));
//! ```

pub mod bytestream;
pub mod catalog;
pub mod codec;
pub mod error;
pub mod json;
pub mod message;
pub mod schema;
pub mod text_format;
pub mod value;
pub mod varint;
pub mod wire;

pub use error::{Error, Result};

/// HashMap mit ahash (schnell, nicht DoS-resistent; nur fuer interne Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Schema
pub use schema::{
    EnumDescriptor, FieldDescriptor, FieldKind, FieldType, MessageSchema, MessageSchemaBuilder,
    OneofDescriptor, ScalarType,
};

// Public API: Values
pub use message::MessageValue;
pub use value::{MapKey, MapValue, Value};

// Public API: Encoder/Decoder
pub use codec::{EncoderConfig, decode, encode, encode_with_config, merge};
pub use json::{JsonOptions, from_json, to_json};
pub use text_format::{decode_raw, from_text, to_text};
