//! Central error types for the message runtime.
//!
//! Every failure is reported to the immediate caller as one of four distinct,
//! recoverable kinds. Nothing in the library retries or silently coerces.

use core::fmt;
use std::borrow::Cow;

/// All error kinds produced by the codecs and the message model.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Corrupt or truncated input (binary wire data, JSON or text syntax).
    MalformedInput(Cow<'static, str>),
    /// A value does not match the kind declared for its field.
    TypeMismatch {
        /// Feldname (oder `#<nummer>` wenn kein Name bekannt ist).
        field: Cow<'static, str>,
        /// Was das Schema erwartet.
        expected: Cow<'static, str>,
        /// Was tatsaechlich uebergeben wurde.
        found: Cow<'static, str>,
    },
    /// A field name or number matches no field of the message type.
    UnknownField(String),
    /// The host-supplied schema is inconsistent (duplicate numbers, bad oneof, ...).
    SchemaViolation(Cow<'static, str>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedInput(msg) => {
                if msg.is_empty() {
                    write!(f, "malformed input")
                } else {
                    write!(f, "malformed input: {msg}")
                }
            }
            Self::TypeMismatch { field, expected, found } => {
                write!(f, "type mismatch for field '{field}': expected {expected}, found {found}")
            }
            Self::UnknownField(name) => write!(f, "unknown field '{name}'"),
            Self::SchemaViolation(msg) => write!(f, "schema violation: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Erstellt einen `MalformedInput` Fehler mit Nachricht.
    pub fn malformed(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Input ended in the middle of a value.
    pub fn truncated() -> Self {
        Self::MalformedInput(Cow::Borrowed("unexpected end of input"))
    }

    /// Erstellt einen `TypeMismatch` Fehler mit Kontext.
    pub fn type_mismatch(
        field: impl Into<Cow<'static, str>>,
        expected: impl Into<Cow<'static, str>>,
        found: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Erstellt einen `SchemaViolation` Fehler mit Nachricht.
    pub fn schema_violation(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    /// Returns `true` for `MalformedInput`.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedInput(_))
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display() {
        let e = Error::malformed("varint longer than 10 bytes");
        assert_eq!(e.to_string(), "malformed input: varint longer than 10 bytes");
        assert!(e.is_malformed());
    }

    #[test]
    fn malformed_display_without_message() {
        let e = Error::MalformedInput(Cow::Borrowed(""));
        assert_eq!(e.to_string(), "malformed input");
    }

    #[test]
    fn truncated_is_malformed() {
        let e = Error::truncated();
        assert!(e.is_malformed());
        assert!(e.to_string().contains("end of input"), "{e}");
    }

    #[test]
    fn type_mismatch_display() {
        let e = Error::type_mismatch("id", "int32", "string");
        let msg = e.to_string();
        assert!(msg.contains("'id'"), "{msg}");
        assert!(msg.contains("expected int32"), "{msg}");
        assert!(msg.contains("found string"), "{msg}");
        assert!(!e.is_malformed());
    }

    #[test]
    fn unknown_field_display() {
        let e = Error::UnknownField("colour".into());
        assert_eq!(e.to_string(), "unknown field 'colour'");
    }

    #[test]
    fn schema_violation_display() {
        let e = Error::schema_violation("duplicate field number 3");
        assert_eq!(e.to_string(), "schema violation: duplicate field number 3");
    }

    #[test]
    fn errors_are_comparable() {
        assert_eq!(Error::truncated(), Error::truncated());
        assert_ne!(Error::truncated(), Error::malformed("other"));
    }
}
