pub mod arrow;
pub mod convert;
pub mod error;
pub mod value;

pub use convert::Converter;
pub use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
pub use value::{Decimal, Value};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;

/// Column type declared by server in `rowtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Fixed-point number, integers are fixed with scale 0.
    Fixed,
    Real,
    Text,
    Binary,
    Boolean,
    Date,
    Time,
    TimestampNtz,
    TimestampLtz,
    TimestampTz,
    Variant,
    Object,
    Array,
    Map,
    Vector,
}

impl ColumnType {
    #[inline]
    pub fn to_lower(&self) -> &'static str {
        match self {
            ColumnType::Fixed => "fixed",
            ColumnType::Real => "real",
            ColumnType::Text => "text",
            ColumnType::Binary => "binary",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Time => "time",
            ColumnType::TimestampNtz => "timestamp_ntz",
            ColumnType::TimestampLtz => "timestamp_ltz",
            ColumnType::TimestampTz => "timestamp_tz",
            ColumnType::Variant => "variant",
            ColumnType::Object => "object",
            ColumnType::Array => "array",
            ColumnType::Map => "map",
            ColumnType::Vector => "vector",
        }
    }

    #[inline]
    pub fn is_timestamp(&self) -> bool {
        matches!(
            self,
            ColumnType::TimestampNtz | ColumnType::TimestampLtz | ColumnType::TimestampTz
        )
    }

    /// Semi-structured types are transferred as JSON text.
    #[inline]
    pub fn is_semi_structured(&self) -> bool {
        matches!(
            self,
            ColumnType::Variant | ColumnType::Object | ColumnType::Array | ColumnType::Map
        )
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        let ty = match s.to_ascii_lowercase().as_str() {
            "fixed" => ColumnType::Fixed,
            "real" => ColumnType::Real,
            "text" => ColumnType::Text,
            "binary" => ColumnType::Binary,
            "boolean" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "time" => ColumnType::Time,
            // plain timestamp is an alias of ntz.
            "timestamp" | "timestamp_ntz" => ColumnType::TimestampNtz,
            "timestamp_ltz" => ColumnType::TimestampLtz,
            "timestamp_tz" => ColumnType::TimestampTz,
            "variant" => ColumnType::Variant,
            "object" => ColumnType::Object,
            "array" => ColumnType::Array,
            "map" => ColumnType::Map,
            "vector" => ColumnType::Vector,
            _ => return Err(Error::UnknownColumnType(s.to_string())),
        };
        Ok(ty)
    }
}

/// Column descriptor as it appears in `rowtype` of a query response.
///
/// Structured OBJECT, ARRAY and MAP columns carry their element
/// types in `fields`, recursively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMeta {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub byte_length: Option<u64>,
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub scale: Option<i8>,
    #[serde(default)]
    pub fields: Option<Vec<ColumnMeta>>,
}

#[inline]
fn default_nullable() -> bool {
    true
}

impl ColumnMeta {
    #[inline]
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        ColumnMeta {
            name: name.into(),
            type_name: ty.to_lower().to_uppercase(),
            nullable: true,
            length: None,
            byte_length: None,
            precision: None,
            scale: None,
            fields: None,
        }
    }

    #[inline]
    pub fn with_scale(mut self, precision: u8, scale: i8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    #[inline]
    pub fn with_fields(mut self, fields: Vec<ColumnMeta>) -> Self {
        self.fields = Some(fields);
        self
    }

    #[inline]
    pub fn column_type(&self) -> Result<ColumnType> {
        self.type_name.parse()
    }

    #[inline]
    pub fn scale(&self) -> i8 {
        self.scale.unwrap_or(0)
    }

    /// Precision of fixed-point number, 38 if server omits it.
    #[inline]
    pub fn precision(&self) -> u8 {
        self.precision.unwrap_or(38)
    }

    /// Whether the column is a structured type with typed sub-fields.
    #[inline]
    pub fn is_structured(&self) -> bool {
        self.fields.as_ref().map(|fs| !fs.is_empty()).unwrap_or_default()
    }

    #[inline]
    pub fn describe(&self) -> Cow<'_, str> {
        match (self.precision, self.scale) {
            (Some(p), Some(s)) => Cow::Owned(format!("{}({}, {})", self.type_name, p, s)),
            _ => Cow::Borrowed(&self.type_name),
        }
    }
}

/// Column names derived from a schema, in order.
#[inline]
pub fn column_names(schema: &[ColumnMeta]) -> Vec<String> {
    schema.iter().map(|c| c.name.clone()).collect()
}
