//! Composite location keys.
//!
//! Several providers need more than one upstream field to fetch a schedule.
//! Those fields are packed into a single [`LocationId`] joined by
//! [`KEY_DELIMITER`]. A delimiter or `%` inside a field is percent-escaped, so
//! decoding always returns the exact fields that were encoded.

use crate::model::{LocationId, ProviderId};
use crate::ports::PortError;

/// Separator between packed fields.
pub const KEY_DELIMITER: char = '|';

/// Pack fields into a location key.
#[must_use]
pub fn encode_location<I, S>(fields: I) -> LocationId
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut key = String::new();
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            key.push(KEY_DELIMITER);
        }
        for ch in field.as_ref().chars() {
            match ch {
                '%' => key.push_str("%25"),
                KEY_DELIMITER => key.push_str("%7C"),
                other => key.push(other),
            }
        }
    }
    LocationId(key)
}

/// Split a location key back into its fields.
#[must_use]
pub fn decode_location(location: &LocationId) -> Vec<String> {
    location.as_str().split(KEY_DELIMITER).map(unescape).collect()
}

/// Split a location key that must contain exactly `N` fields.
///
/// # Errors
///
/// Returns [`PortError::InvalidLocationId`] when the field count differs.
pub fn decode_fields<const N: usize>(
    provider: &ProviderId,
    location: &LocationId,
) -> Result<[String; N], PortError> {
    <[String; N]>::try_from(decode_location(location))
        .map_err(|_fields| PortError::invalid_location(provider, location))
}

fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut rest = field;
    while let Some(pos) = rest.find('%') {
        let (head, tail) = rest.split_at(pos);
        out.push_str(head);
        if let Some(after) = tail.strip_prefix("%25") {
            out.push('%');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("%7C") {
            out.push(KEY_DELIMITER);
            rest = after;
        } else {
            out.push('%');
            rest = tail.get(1..).unwrap_or_default();
        }
    }
    out.push_str(rest);
    out
}
