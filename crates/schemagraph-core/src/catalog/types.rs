//! Column type definitions for the catalog.

use serde::{Deserialize, Serialize};

/// Column data types.
///
/// The compiler collaborator maps these to backend type names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SqlType {
    /// No explicit type. Foreign key columns declared this way take the type
    /// of their target once it resolves.
    #[default]
    Null,
    /// Boolean value.
    Boolean,
    /// 16-bit signed integer.
    SmallInt,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    BigInt,
    /// 32-bit floating point.
    Float,
    /// 64-bit floating point.
    Double,
    /// Fixed-precision decimal.
    Numeric {
        /// Total number of digits.
        precision: u8,
        /// Number of digits after decimal point.
        scale: u8,
    },
    /// Variable length string with an optional length.
    String(Option<u32>),
    /// Unbounded text.
    Text,
    /// Binary data.
    Binary(Option<u32>),
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Timestamp, optionally with time zone.
    Timestamp {
        /// Whether the value carries a time zone.
        with_timezone: bool,
    },
    /// UUID.
    Uuid,
    /// JSON document.
    Json,
    /// Enumeration type.
    Enum {
        /// Name of the server-side type; `None` renders inline.
        name: Option<String>,
        /// Schema of the server-side type.
        schema: Option<String>,
        /// Allowed variant values.
        variants: Vec<String>,
    },
    /// Backend-specific type passed through verbatim.
    Custom(String),
}

impl SqlType {
    /// Create a string type without a length.
    pub fn string() -> Self {
        SqlType::String(None)
    }

    /// Create a string type with a length.
    pub fn varchar(length: u32) -> Self {
        SqlType::String(Some(length))
    }

    /// Create a named enum type that lives on the server.
    pub fn named_enum(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        SqlType::Enum {
            name: Some(name.into()),
            schema: None,
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if this is the "no type" placeholder.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlType::Null)
    }

    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Float
                | SqlType::Double
                | SqlType::Numeric { .. }
        )
    }

    /// Check if this is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(self, SqlType::SmallInt | SqlType::Integer | SqlType::BigInt)
    }

    /// Name and schema of the server-side type this column needs, if any.
    ///
    /// Only named enums are created separately; anonymous ones render inline.
    pub fn server_type(&self) -> Option<(&str, Option<&str>)> {
        match self {
            SqlType::Enum {
                name: Some(name),
                schema,
                ..
            } => Some((name.as_str(), schema.as_deref())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_checks() {
        assert!(SqlType::Integer.is_numeric());
        assert!(SqlType::Numeric {
            precision: 10,
            scale: 2
        }
        .is_numeric());
        assert!(!SqlType::string().is_numeric());
        assert!(SqlType::BigInt.is_integer());
        assert!(SqlType::default().is_null());
    }

    #[test]
    fn test_server_type() {
        let status = SqlType::named_enum("status", ["active", "inactive"]);
        assert_eq!(status.server_type(), Some(("status", None)));

        let inline = SqlType::Enum {
            name: None,
            schema: None,
            variants: vec!["a".into()],
        };
        assert!(inline.server_type().is_none());
        assert!(SqlType::Text.server_type().is_none());
    }
}
