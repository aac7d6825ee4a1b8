//! `DateTime` (Tag 0), `FullDate` (Tag 1004), and `DateOnly` (Tag 1004, disclosed-attribute
//! flavor) value types.

use chrono::{DateTime as ChronoDateTime, NaiveDate, Utc};
use ciborium::Value;

use crate::schema::{tagged, text, Issue, SchemaResult};

/// An RFC 3339 date-time, carried on the wire as CBOR Tag 0 over a text string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateTime(pub ChronoDateTime<Utc>);

impl DateTime {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let inner = tagged(value, 0)?;
        let text = text(inner)?;
        let parsed = ChronoDateTime::parse_from_rfc3339(&text)
            .map_err(|e| vec![Issue::root(format!("invalid RFC 3339 date-time '{text}': {e}"))])?;
        Ok(DateTime(parsed.with_timezone(&Utc)))
    }

    pub fn to_value(self) -> Value {
        Value::Tag(0, Box::new(Value::Text(self.0.to_rfc3339())))
    }
}

/// An RFC 3339 full-date, carried on the wire as CBOR Tag 1004 over a text string
/// (`YYYY-MM-DD`, no time component).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FullDate(pub NaiveDate);

impl FullDate {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let inner = tagged(value, 1004)?;
        let text = text(inner)?;
        let parsed = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map_err(|e| vec![Issue::root(format!("invalid full-date '{text}': {e}"))])?;
        Ok(FullDate(parsed))
    }

    pub fn to_value(self) -> Value {
        Value::Tag(1004, Box::new(Value::Text(self.0.format("%Y-%m-%d").to_string())))
    }
}

/// A calendar date with no time component, carried on the wire identically to
/// [`FullDate`] (Tag 1004 over `YYYY-MM-DD`).
///
/// `FullDate` is reserved for the MSO's own structural fields (`validFrom`,
/// `validUntil`); `DateOnly` is the type a caller reaches for when decoding a disclosed
/// attribute value that happens to carry a date (`birth_date`, `issue_date`,
/// `expiry_date` in the mDL namespace), so that the two contexts don't share a type
/// whose name implies MSO-internal meaning where none is intended. The core never
/// interprets attribute values itself; this is exposed for callers that do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateOnly(pub NaiveDate);

impl DateOnly {
    pub fn parse(value: &Value) -> SchemaResult<Self> {
        let inner = tagged(value, 1004)?;
        let text = text(inner)?;
        let parsed = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map_err(|e| vec![Issue::root(format!("invalid full-date '{text}': {e}"))])?;
        Ok(DateOnly(parsed))
    }

    pub fn to_value(self) -> Value {
        Value::Tag(1004, Box::new(Value::Text(self.0.format("%Y-%m-%d").to_string())))
    }
}
