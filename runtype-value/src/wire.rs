//! Wire forms of the values JSON cannot carry natively.
//!
//! Each helper pair converts between a native [`Value`](crate::Value) payload
//! and the string it travels as inside a JSON document.

use alloc::format;
use alloc::string::{String, ToString};

use chrono::{DateTime, SecondsFormat, Utc};

/// Prefix of an encoded symbol.
pub const SYMBOL_PREFIX: &str = "Symbol:";

/// Render epoch milliseconds as an ISO-8601 UTC timestamp with millisecond
/// precision (`2024-01-02T03:04:05.006Z`). Returns `None` for invalid dates.
pub fn date_to_iso(ms: f64) -> Option<String> {
    if !ms.is_finite() {
        return None;
    }
    let dt = DateTime::<Utc>::from_timestamp_millis(ms.trunc() as i64)?;
    Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Parse an RFC 3339 timestamp back into epoch milliseconds.
pub fn date_from_iso(s: &str) -> Option<f64> {
    let dt = DateTime::parse_from_rfc3339(s).ok()?;
    Some(dt.timestamp_millis() as f64)
}

/// `/source/flags`
pub fn regexp_to_wire(source: &str, flags: &str) -> String {
    format!("/{source}/{flags}")
}

/// Split `/source/flags` into its parts. The last `/` ends the source.
pub fn regexp_from_wire(s: &str) -> Option<(String, String)> {
    let rest = s.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let flags = &rest[end + 1..];
    if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((rest[..end].to_string(), flags.to_string()))
}

/// `Symbol:<description>`; symbols keep only their description on the wire.
pub fn symbol_to_wire(description: Option<&str>) -> String {
    format!("{SYMBOL_PREFIX}{}", description.unwrap_or_default())
}

/// Recover a symbol description. An empty description decodes to `None`.
pub fn symbol_from_wire(s: &str) -> Option<Option<String>> {
    let desc = s.strip_prefix(SYMBOL_PREFIX)?;
    Some((!desc.is_empty()).then(|| desc.to_string()))
}

/// Decimal digits of a bigint.
pub fn bigint_to_wire(value: i128) -> String {
    value.to_string()
}

/// Parse the decimal digits of a bigint.
pub fn bigint_from_wire(s: &str) -> Option<i128> {
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_use_millisecond_precision() {
        assert_eq!(
            date_to_iso(1_700_000_000_123.0).as_deref(),
            Some("2023-11-14T22:13:20.123Z")
        );
        assert_eq!(date_to_iso(0.0).as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(date_to_iso(f64::NAN), None);
        assert_eq!(
            date_from_iso("2023-11-14T22:13:20.123Z"),
            Some(1_700_000_000_123.0)
        );
        assert_eq!(date_from_iso("yesterday"), None);
    }

    #[test]
    fn regexp_source_may_contain_slashes() {
        assert_eq!(regexp_to_wire("a/b", "gi"), "/a/b/gi");
        assert_eq!(
            regexp_from_wire("/a/b/gi"),
            Some(("a/b".to_string(), "gi".to_string()))
        );
        assert_eq!(regexp_from_wire("a/b"), None);
        assert_eq!(regexp_from_wire("/"), None);
    }

    #[test]
    fn symbols_keep_their_description() {
        assert_eq!(symbol_to_wire(Some("id")), "Symbol:id");
        assert_eq!(symbol_from_wire("Symbol:id"), Some(Some("id".to_string())));
        assert_eq!(symbol_from_wire("Symbol:"), Some(None));
        assert_eq!(symbol_from_wire("id"), None);
    }

    #[test]
    fn bigints_are_decimal_strings() {
        assert_eq!(bigint_to_wire(-12), "-12");
        assert_eq!(bigint_from_wire("170141183460469231731687303715884105727"), Some(i128::MAX));
        assert_eq!(bigint_from_wire("1.5"), None);
    }
}
