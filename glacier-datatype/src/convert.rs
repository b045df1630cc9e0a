//! Conversion of JSON result fields into runtime values.
//!
//! Server sends every non-null field of a JSON result chunk as text.
//! A converter is resolved once per column from its metadata and then
//! applied to each row of that column.
use crate::error::{Error, Result};
use crate::value::{
    date_from_days, ntz_from_nanos, parse_epoch_nanos, time_from_nanos, tz_from_nanos,
    utc_from_nanos, Decimal,
};
use crate::{ColumnMeta, ColumnType, Value};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    Int,
    Decimal { precision: u8, scale: i8 },
    Float,
    Text,
    Binary,
    Boolean,
    Date,
    Time,
    TimestampNtz,
    TimestampLtz,
    TimestampTz,
    /// Semi-structured value passed through as text.
    Json,
    /// Structured value with declared fields, parsed from text.
    Structured,
    Vector,
}

impl Converter {
    /// Resolve converter of given column.
    #[inline]
    pub fn resolve(meta: &ColumnMeta) -> Result<Self> {
        let conv = match meta.column_type()? {
            ColumnType::Fixed => {
                if meta.scale() > 0 {
                    Converter::Decimal {
                        precision: meta.precision(),
                        scale: meta.scale(),
                    }
                } else {
                    Converter::Int
                }
            }
            ColumnType::Real => Converter::Float,
            ColumnType::Text => Converter::Text,
            ColumnType::Binary => Converter::Binary,
            ColumnType::Boolean => Converter::Boolean,
            ColumnType::Date => Converter::Date,
            ColumnType::Time => Converter::Time,
            ColumnType::TimestampNtz => Converter::TimestampNtz,
            ColumnType::TimestampLtz => Converter::TimestampLtz,
            ColumnType::TimestampTz => Converter::TimestampTz,
            ColumnType::Vector => Converter::Vector,
            ColumnType::Variant => Converter::Json,
            ColumnType::Object | ColumnType::Array | ColumnType::Map => {
                if meta.is_structured() {
                    Converter::Structured
                } else {
                    Converter::Json
                }
            }
        };
        Ok(conv)
    }

    /// Resolve converters of all columns in schema order.
    #[inline]
    pub fn resolve_all(schema: &[ColumnMeta]) -> Result<Vec<Converter>> {
        schema.iter().map(Converter::resolve).collect()
    }

    /// Convert one raw JSON field.
    #[inline]
    pub fn convert(&self, raw: &serde_json::Value) -> Result<Value> {
        let text: Cow<'_, str> = match raw {
            serde_json::Value::Null => return Ok(Value::Null),
            serde_json::Value::String(s) => Cow::Borrowed(s),
            serde_json::Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            serde_json::Value::Number(n) => Cow::Owned(n.to_string()),
            other => Cow::Owned(other.to_string()),
        };
        self.convert_str(&text)
    }

    /// Convert one field from its text form.
    pub fn convert_str(&self, s: &str) -> Result<Value> {
        let v = match self {
            Converter::Int => match s.parse::<i64>() {
                Ok(v) => Value::Int(v),
                // NUMBER(38, 0) may exceed 64 bits.
                Err(_) => Value::Decimal(Decimal::parse(s, 38, 0)?),
            },
            Converter::Decimal { precision, scale } => {
                Value::Decimal(Decimal::parse(s, *precision, *scale)?)
            }
            Converter::Float => Value::Float(s.parse().map_err(|_| Error::invalid("real", s))?),
            Converter::Text => Value::String(s.to_string()),
            Converter::Binary => {
                Value::Binary(hex::decode(s).map_err(|_| Error::invalid("binary", s))?)
            }
            Converter::Boolean => match s.to_ascii_lowercase().as_str() {
                "1" | "true" => Value::Bool(true),
                "0" | "false" => Value::Bool(false),
                _ => return Err(Error::invalid("boolean", s)),
            },
            Converter::Date => {
                let days: i32 = s.parse().map_err(|_| Error::invalid("date", s))?;
                Value::Date(date_from_days(days)?)
            }
            Converter::Time => {
                let nanos = parse_epoch_nanos(s)?;
                let nanos = i64::try_from(nanos).map_err(|_| Error::ValueOutOfRange("time"))?;
                Value::Time(time_from_nanos(nanos)?)
            }
            Converter::TimestampNtz => Value::TimestampNtz(ntz_from_nanos(parse_epoch_nanos(s)?)?),
            Converter::TimestampLtz => Value::TimestampLtz(utc_from_nanos(parse_epoch_nanos(s)?)?),
            Converter::TimestampTz => {
                let (epoch, offset) = s
                    .split_once(' ')
                    .ok_or_else(|| Error::invalid("timestamp_tz", s))?;
                let offset: i64 = offset
                    .trim()
                    .parse()
                    .map_err(|_| Error::invalid("timestamp_tz", s))?;
                Value::TimestampTz(tz_from_nanos(parse_epoch_nanos(epoch)?, offset)?)
            }
            Converter::Json => Value::Json(s.to_string()),
            Converter::Structured => Value::Structured(
                serde_json::from_str(s).map_err(|_| Error::invalid("structured", s))?,
            ),
            Converter::Vector => Value::Vector(
                serde_json::from_str(s).map_err(|_| Error::invalid("vector", s))?,
            ),
        };
        Ok(v)
    }
}
