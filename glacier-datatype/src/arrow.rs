//! Mapping between column metadata and arrow.
//!
//! Arrow result chunks encode some types with physical layouts that
//! differ from their logical meaning: fixed-point numbers as scaled
//! integers, timestamps as scaled integers or `{epoch, fraction, timezone}`
//! structs. [`ArrowConverter`] interprets a cell according to the declared
//! column type.
use crate::error::{Error, Result};
use crate::value::{
    date_from_days, ntz_from_nanos, scaled_to_nanos, time_from_nanos, tz_from_nanos,
    utc_from_nanos, Decimal,
};
use crate::{ColumnMeta, ColumnType, Value};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, Time64MicrosecondType, Time64NanosecondType, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType,
};
use arrow_array::Array;
use arrow_schema::{DataType, Field, Fields, Schema, SchemaRef, TimeUnit};
use std::sync::Arc;

/// Arrow field of a column, used to build typed empty tables.
pub fn to_arrow_field(meta: &ColumnMeta) -> Result<Field> {
    let ty = meta.column_type()?;
    let dt = match ty {
        ColumnType::Fixed => {
            if meta.scale() > 0 {
                DataType::Decimal128(meta.precision(), meta.scale())
            } else {
                DataType::Int64
            }
        }
        ColumnType::Real => DataType::Float64,
        ColumnType::Text | ColumnType::Variant | ColumnType::Vector => DataType::Utf8,
        ColumnType::Binary => DataType::Binary,
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::Date => DataType::Date32,
        ColumnType::Time => DataType::Time64(TimeUnit::Nanosecond),
        ColumnType::TimestampNtz => DataType::Timestamp(TimeUnit::Nanosecond, None),
        ColumnType::TimestampLtz | ColumnType::TimestampTz => {
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))
        }
        ColumnType::Object | ColumnType::Array | ColumnType::Map if !meta.is_structured() => {
            DataType::Utf8
        }
        ColumnType::Object => {
            let fields = structured_fields(meta)?;
            DataType::Struct(Fields::from(fields))
        }
        ColumnType::Array => {
            let mut fields = structured_fields(meta)?;
            let item = fields.swap_remove(0).with_name("item");
            DataType::List(Arc::new(item))
        }
        ColumnType::Map => {
            let fields = structured_fields(meta)?;
            if fields.len() != 2 {
                return Err(Error::ArrowTypeNotSupported {
                    arrow: format!("map with {} fields", fields.len()),
                    ty: ty.to_lower(),
                });
            }
            let mut it = fields.into_iter();
            let key = it.next().map(|f| f.with_name("key").with_nullable(false));
            let value = it.next().map(|f| f.with_name("value"));
            let entries = Fields::from(key.into_iter().chain(value).collect::<Vec<_>>());
            DataType::Map(
                Arc::new(Field::new("entries", DataType::Struct(entries), false)),
                false,
            )
        }
    };
    Ok(Field::new(&meta.name, dt, meta.nullable))
}

#[inline]
fn structured_fields(meta: &ColumnMeta) -> Result<Vec<Field>> {
    meta.fields
        .iter()
        .flatten()
        .map(to_arrow_field)
        .collect()
}

/// Arrow schema of a result set.
#[inline]
pub fn to_arrow_schema(schema: &[ColumnMeta]) -> Result<SchemaRef> {
    let fields = schema.iter().map(to_arrow_field).collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(Schema::new(fields)))
}

/// Reads values out of an arrow column according to declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrowConverter {
    ty: ColumnType,
    precision: u8,
    scale: i8,
    structured: bool,
}

impl ArrowConverter {
    #[inline]
    pub fn resolve(meta: &ColumnMeta) -> Result<Self> {
        Ok(ArrowConverter {
            ty: meta.column_type()?,
            precision: meta.precision(),
            scale: meta.scale(),
            structured: meta.is_structured(),
        })
    }

    #[inline]
    pub fn resolve_all(schema: &[ColumnMeta]) -> Result<Vec<ArrowConverter>> {
        schema.iter().map(ArrowConverter::resolve).collect()
    }

    /// Convert the value at `row` of given column.
    pub fn convert(&self, array: &dyn Array, row: usize) -> Result<Value> {
        if array.is_null(row) {
            return Ok(Value::Null);
        }
        let v = match self.ty {
            ColumnType::Fixed => self.fixed(array, row)?,
            ColumnType::Real => match array.data_type() {
                DataType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(row)),
                DataType::Float32 => {
                    Value::Float(array.as_primitive::<Float32Type>().value(row) as f64)
                }
                _ => return Err(self.unsupported(array)),
            },
            ColumnType::Text => Value::String(self.text(array, row)?.to_string()),
            ColumnType::Variant | ColumnType::Object | ColumnType::Array | ColumnType::Map => {
                let s = self.text(array, row)?;
                if self.structured {
                    Value::Structured(
                        serde_json::from_str(s).map_err(|_| Error::invalid("structured", s))?,
                    )
                } else {
                    Value::Json(s.to_string())
                }
            }
            ColumnType::Vector => self.vector(array, row)?,
            ColumnType::Binary => match array.data_type() {
                DataType::Binary => Value::Binary(array.as_binary::<i32>().value(row).to_vec()),
                DataType::LargeBinary => {
                    Value::Binary(array.as_binary::<i64>().value(row).to_vec())
                }
                DataType::FixedSizeBinary(_) => {
                    Value::Binary(array.as_fixed_size_binary().value(row).to_vec())
                }
                _ => return Err(self.unsupported(array)),
            },
            ColumnType::Boolean => match array.data_type() {
                DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
                _ => return Err(self.unsupported(array)),
            },
            ColumnType::Date => {
                let days = match array.data_type() {
                    DataType::Date32 => array.as_primitive::<Date32Type>().value(row),
                    _ => {
                        let v = int_at(array, row).ok_or_else(|| self.unsupported(array))?;
                        i32::try_from(v).map_err(|_| Error::ValueOutOfRange("date"))?
                    }
                };
                Value::Date(date_from_days(days)?)
            }
            ColumnType::Time => {
                let nanos = match array.data_type() {
                    DataType::Time64(TimeUnit::Nanosecond) => {
                        array.as_primitive::<Time64NanosecondType>().value(row) as i128
                    }
                    DataType::Time64(TimeUnit::Microsecond) => {
                        array.as_primitive::<Time64MicrosecondType>().value(row) as i128 * 1000
                    }
                    _ => {
                        let v = int_at(array, row).ok_or_else(|| self.unsupported(array))?;
                        scaled_to_nanos(v as i128, self.scale)?
                    }
                };
                let nanos = i64::try_from(nanos).map_err(|_| Error::ValueOutOfRange("time"))?;
                Value::Time(time_from_nanos(nanos)?)
            }
            ColumnType::TimestampNtz => Value::TimestampNtz(ntz_from_nanos(self.epoch_nanos(array, row)?)?),
            ColumnType::TimestampLtz => Value::TimestampLtz(utc_from_nanos(self.epoch_nanos(array, row)?)?),
            ColumnType::TimestampTz => {
                let (nanos, offset) = self.tz_parts(array, row)?;
                Value::TimestampTz(tz_from_nanos(nanos, offset)?)
            }
        };
        Ok(v)
    }

    #[inline]
    fn unsupported(&self, array: &dyn Array) -> Error {
        Error::ArrowTypeNotSupported {
            arrow: array.data_type().to_string(),
            ty: self.ty.to_lower(),
        }
    }

    fn fixed(&self, array: &dyn Array, row: usize) -> Result<Value> {
        if let DataType::Decimal128(p, s) = array.data_type() {
            let v = array.as_primitive::<Decimal128Type>().value(row);
            if *s == 0 {
                if let Ok(v) = i64::try_from(v) {
                    return Ok(Value::Int(v));
                }
            }
            return Ok(Value::Decimal(Decimal::new(v, *p, *s)));
        }
        let v = int_at(array, row).ok_or_else(|| self.unsupported(array))?;
        if self.scale > 0 {
            Ok(Value::Decimal(Decimal::new(v as i128, self.precision, self.scale)))
        } else {
            Ok(Value::Int(v))
        }
    }

    #[inline]
    fn text<'a>(&self, array: &'a dyn Array, row: usize) -> Result<&'a str> {
        match array.data_type() {
            DataType::Utf8 => Ok(array.as_string::<i32>().value(row)),
            DataType::LargeUtf8 => Ok(array.as_string::<i64>().value(row)),
            _ => Err(self.unsupported(array)),
        }
    }

    fn vector(&self, array: &dyn Array, row: usize) -> Result<Value> {
        match array.data_type() {
            DataType::Utf8 | DataType::LargeUtf8 => {
                let s = self.text(array, row)?;
                Ok(Value::Vector(
                    serde_json::from_str(s).map_err(|_| Error::invalid("vector", s))?,
                ))
            }
            DataType::FixedSizeList(..) => {
                let elems = array.as_fixed_size_list().value(row);
                let mut out = Vec::with_capacity(elems.len());
                for i in 0..elems.len() {
                    let v = match elems.data_type() {
                        DataType::Float64 => elems.as_primitive::<Float64Type>().value(i),
                        DataType::Float32 => elems.as_primitive::<Float32Type>().value(i) as f64,
                        _ => int_at(elems.as_ref(), i).ok_or_else(|| self.unsupported(array))?
                            as f64,
                    };
                    out.push(v);
                }
                Ok(Value::Vector(out))
            }
            _ => Err(self.unsupported(array)),
        }
    }

    fn epoch_nanos(&self, array: &dyn Array, row: usize) -> Result<i128> {
        match array.data_type() {
            DataType::Struct(_) => {
                let st = array.as_struct();
                let epoch = st
                    .column_by_name("epoch")
                    .and_then(|c| int_at(c.as_ref(), row))
                    .ok_or_else(|| self.unsupported(array))?;
                match st.column_by_name("fraction") {
                    Some(fraction) => {
                        let frac = int_at(fraction.as_ref(), row).unwrap_or_default();
                        Ok(epoch as i128 * 1_000_000_000 + frac as i128)
                    }
                    None => scaled_to_nanos(epoch as i128, self.scale),
                }
            }
            DataType::Timestamp(unit, _) => {
                let nanos = match unit {
                    TimeUnit::Second => {
                        array.as_primitive::<TimestampSecondType>().value(row) as i128
                            * 1_000_000_000
                    }
                    TimeUnit::Millisecond => {
                        array.as_primitive::<TimestampMillisecondType>().value(row) as i128
                            * 1_000_000
                    }
                    TimeUnit::Microsecond => {
                        array.as_primitive::<TimestampMicrosecondType>().value(row) as i128 * 1000
                    }
                    TimeUnit::Nanosecond => {
                        array.as_primitive::<TimestampNanosecondType>().value(row) as i128
                    }
                };
                Ok(nanos)
            }
            _ => {
                let v = int_at(array, row).ok_or_else(|| self.unsupported(array))?;
                scaled_to_nanos(v as i128, self.scale)
            }
        }
    }

    fn tz_parts(&self, array: &dyn Array, row: usize) -> Result<(i128, i64)> {
        let DataType::Struct(_) = array.data_type() else {
            return Err(self.unsupported(array));
        };
        let offset = array
            .as_struct()
            .column_by_name("timezone")
            .and_then(|c| int_at(c.as_ref(), row))
            .ok_or_else(|| self.unsupported(array))?;
        Ok((self.epoch_nanos(array, row)?, offset))
    }
}

/// Integer value of any signed integer array widened to i64.
#[inline]
fn int_at(array: &dyn Array, row: usize) -> Option<i64> {
    let v = match array.data_type() {
        DataType::Int8 => array.as_primitive::<Int8Type>().value(row) as i64,
        DataType::Int16 => array.as_primitive::<Int16Type>().value(row) as i64,
        DataType::Int32 => array.as_primitive::<Int32Type>().value(row) as i64,
        DataType::Int64 => array.as_primitive::<Int64Type>().value(row),
        _ => return None,
    };
    Some(v)
}
