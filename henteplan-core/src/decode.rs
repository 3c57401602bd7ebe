//! Small decoding helpers for loosely typed upstream payloads.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::model::ProviderId;
use crate::ports::PortError;

const ISO_DATE_FORMAT: &str = "%Y-%m-%d";
const NORWEGIAN_DATE_FORMAT: &str = "%d.%m.%Y";

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// Accept either a JSON string or number and keep it as text.
///
/// Upstreams are inconsistent about whether identifiers are quoted.
///
/// # Errors
///
/// Fails when the value is neither a string nor a number.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Text(text) => text,
        StringOrNumber::Integer(number) => number.to_string(),
        StringOrNumber::Float(number) => number.to_string(),
    })
}

/// Treat a JSON `null` like a missing string.
///
/// # Errors
///
/// Fails when the value is neither a string nor `null`.
pub fn empty_if_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse the leading `YYYY-MM-DD` of a date or timestamp string.
///
/// # Errors
///
/// Returns [`PortError::Malformed`] when the prefix is not a valid date.
pub fn iso_date(provider: &ProviderId, raw: &str) -> Result<NaiveDate, PortError> {
    raw.trim()
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, ISO_DATE_FORMAT).ok())
        .ok_or_else(|| PortError::malformed(provider, format!("invalid date {raw:?}")))
}

/// Parse a `DD.MM.YYYY` date.
///
/// # Errors
///
/// Returns [`PortError::Malformed`] when the text is not a valid date.
pub fn norwegian_date(provider: &ProviderId, raw: &str) -> Result<NaiveDate, PortError> {
    NaiveDate::parse_from_str(raw.trim(), NORWEGIAN_DATE_FORMAT)
        .map_err(|err| PortError::malformed(provider, format!("invalid date {raw:?}: {err}")))
}
