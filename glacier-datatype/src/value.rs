use crate::error::{Error, Result};
use arrow_array::types::{Decimal128Type, DecimalType};
use std::fmt;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

const NANOS_PER_SEC: i128 = 1_000_000_000;
const NANOS_PER_DAY: i64 = 86_400 * 1_000_000_000;
/// Julian day number of 1970-01-01.
const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;

/// Runtime value of a single field in a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Date(Date),
    Time(Time),
    TimestampNtz(PrimitiveDateTime),
    TimestampLtz(OffsetDateTime),
    TimestampTz(OffsetDateTime),
    /// Semi-structured value kept as JSON text.
    Json(String),
    /// Structured value parsed from JSON text.
    Structured(serde_json::Value),
    Vector(Vec<f64>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Json(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Fixed-point decimal in the same representation as arrow Decimal128.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub value: i128,
    pub precision: u8,
    pub scale: i8,
}

impl Decimal {
    #[inline]
    pub fn new(value: i128, precision: u8, scale: i8) -> Self {
        Decimal {
            value,
            precision,
            scale,
        }
    }

    #[inline]
    pub fn parse(s: &str, precision: u8, scale: i8) -> Result<Self> {
        let value = arrow_cast::parse::parse_decimal::<Decimal128Type>(s, precision, scale)
            .map_err(|_| Error::invalid("decimal", s))?;
        Ok(Decimal::new(value, precision, scale))
    }
}

impl fmt::Display for Decimal {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Decimal128Type::format_decimal(
            self.value,
            self.precision,
            self.scale,
        ))
    }
}

#[inline]
pub(crate) fn date_from_days(days: i32) -> Result<Date> {
    let jd = UNIX_EPOCH_JULIAN_DAY
        .checked_add(days)
        .ok_or(Error::ValueOutOfRange("date"))?;
    Ok(Date::from_julian_day(jd)?)
}

#[inline]
pub(crate) fn time_from_nanos(nanos: i64) -> Result<Time> {
    if !(0..NANOS_PER_DAY).contains(&nanos) {
        return Err(Error::ValueOutOfRange("time"));
    }
    Ok(Time::MIDNIGHT + Duration::nanoseconds(nanos))
}

#[inline]
pub(crate) fn utc_from_nanos(nanos: i128) -> Result<OffsetDateTime> {
    Ok(OffsetDateTime::from_unix_timestamp_nanos(nanos)?)
}

#[inline]
pub(crate) fn ntz_from_nanos(nanos: i128) -> Result<PrimitiveDateTime> {
    let odt = utc_from_nanos(nanos)?;
    Ok(PrimitiveDateTime::new(odt.date(), odt.time()))
}

/// Timezone offset is encoded as minutes shifted by 1440 so it is never negative.
#[inline]
pub(crate) fn tz_from_nanos(nanos: i128, encoded_offset: i64) -> Result<OffsetDateTime> {
    let seconds = encoded_offset
        .checked_sub(1440)
        .and_then(|minutes| minutes.checked_mul(60))
        .and_then(|secs| i32::try_from(secs).ok())
        .ok_or(Error::ValueOutOfRange("timezone"))?;
    let offset = UtcOffset::from_whole_seconds(seconds)?;
    Ok(utc_from_nanos(nanos)?.to_offset(offset))
}

/// Scale an integer carrying `scale` fractional digits to nanoseconds.
#[inline]
pub(crate) fn scaled_to_nanos(v: i128, scale: i8) -> Result<i128> {
    let scale = scale.clamp(0, 9) as u32;
    v.checked_mul(10i128.pow(9 - scale))
        .ok_or(Error::ValueOutOfRange("timestamp"))
}

/// Parse `[-]seconds[.fraction]` into nanoseconds.
#[inline]
pub(crate) fn parse_epoch_nanos(s: &str) -> Result<i128> {
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (secs, frac) = match body.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (body, ""),
    };
    if secs.is_empty()
        || frac.len() > 9
        || !secs.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit())
    {
        return Err(Error::invalid("epoch", s));
    }
    let secs: i128 = secs.parse().map_err(|_| Error::invalid("epoch", s))?;
    let mut frac_nanos: i128 = 0;
    if !frac.is_empty() {
        let digits: i128 = frac.parse().map_err(|_| Error::invalid("epoch", s))?;
        frac_nanos = digits * 10i128.pow(9 - frac.len() as u32);
    }
    let nanos = secs
        .checked_mul(NANOS_PER_SEC)
        .and_then(|n| n.checked_add(frac_nanos))
        .ok_or(Error::ValueOutOfRange("timestamp"))?;
    Ok(if neg { -nanos } else { nanos })
}
