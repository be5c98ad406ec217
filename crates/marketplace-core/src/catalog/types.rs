//! Core type definitions for the catalog.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

/// Scalar data types supported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// Fixed-precision decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Number of digits after decimal point.
        scale: u8,
    },
    /// UTF-8 string.
    String,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
}

/// Field types.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable).
    OptionalScalar(ScalarType),
    /// An enumeration type.
    Enum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant values.
        variants: Vec<String>,
    },
    /// An optional enumeration.
    OptionalEnum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant values.
        variants: Vec<String>,
    },
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64 | ScalarType::Decimal { .. }
        )
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an optional scalar field type.
    pub fn optional_scalar(scalar: ScalarType) -> Self {
        FieldType::OptionalScalar(scalar)
    }

    /// Create an enum field type.
    pub fn enum_type(name: impl Into<String>, variants: Vec<String>) -> Self {
        FieldType::Enum {
            name: name.into(),
            variants,
        }
    }

    /// Check if this type is nullable.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            FieldType::OptionalScalar(_) | FieldType::OptionalEnum { .. }
        )
    }

    /// Get the inner scalar type if this is a scalar-based type.
    pub fn scalar_type(&self) -> Option<&ScalarType> {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) => Some(s),
            _ => None,
        }
    }

    /// Get the allowed variants if this is an enum type.
    pub fn enum_variants(&self) -> Option<&[String]> {
        match self {
            FieldType::Enum { variants, .. } | FieldType::OptionalEnum { variants, .. } => {
                Some(variants)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Bool => write!(f, "bool"),
            ScalarType::Int32 => write!(f, "int32"),
            ScalarType::Int64 => write!(f, "int64"),
            ScalarType::Float64 => write!(f, "float64"),
            ScalarType::Decimal { precision, scale } => {
                write!(f, "decimal({precision}, {scale})")
            }
            ScalarType::String => write!(f, "string"),
            ScalarType::Timestamp => write!(f, "timestamp"),
            ScalarType::Uuid => write!(f, "uuid"),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(s) => write!(f, "{s}"),
            FieldType::OptionalScalar(s) => write!(f, "{s}?"),
            FieldType::Enum { name, .. } => write!(f, "enum {name}"),
            FieldType::OptionalEnum { name, .. } => write!(f, "enum {name}?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_builders() {
        let int_type = FieldType::scalar(ScalarType::Int32);
        assert!(!int_type.is_nullable());
        assert!(int_type.scalar_type().is_some());

        let optional = FieldType::optional_scalar(ScalarType::String);
        assert!(optional.is_nullable());
        assert_eq!(optional.to_string(), "string?");
    }

    #[test]
    fn test_enum_type() {
        let role = FieldType::enum_type("Role", vec!["CLIENT".into(), "SELLER".into()]);
        assert!(!role.is_nullable());
        assert_eq!(role.enum_variants().map(<[String]>::len), Some(2));
        assert!(role.scalar_type().is_none());
        assert_eq!(role.to_string(), "enum Role");
    }

    #[test]
    fn test_decimal_display() {
        let price = ScalarType::Decimal {
            precision: 10,
            scale: 2,
        };
        assert!(price.is_numeric());
        assert_eq!(price.to_string(), "decimal(10, 2)");
    }
}
