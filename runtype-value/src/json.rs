//! Conversion between [`Value`] and JSON.
//!
//! [`Value::to_json`] follows `JSON.stringify` semantics: `undefined` and
//! symbol properties are dropped from objects and become `null` inside arrays,
//! non-finite numbers become `null`, dates serialize to their ISO form and
//! regular expressions to `{}`. Bigints have no JSON form and are rejected.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::{Map, Value, ValueError, wire};

/// Largest magnitude below which an integral number is printed without exponent.
const PLAIN_INTEGER_LIMIT: f64 = 1e21;

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map>(),
            ),
        }
    }
}

impl Value {
    /// Parse JSON text into a value.
    pub fn parse_json(text: &str) -> Result<Value, ValueError> {
        serde_json::from_str::<serde_json::Value>(text)
            .map(Value::from)
            .map_err(|e| ValueError::Parse(e.to_string()))
    }

    /// Convert into a `serde_json::Value`.
    pub fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        Ok(match self {
            Value::Undefined | Value::Symbol(_) | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => json_number(*n),
            Value::BigInt(_) => {
                return Err(ValueError::NotJsonSafe {
                    type_name: self.type_name(),
                });
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(ms) => match wire::date_to_iso(*ms) {
                Some(iso) => serde_json::Value::String(iso),
                None => serde_json::Value::Null,
            },
            Value::RegExp { .. } => serde_json::Value::Object(serde_json::Map::new()),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, value) in map {
                    if matches!(value, Value::Undefined | Value::Symbol(_)) {
                        continue;
                    }
                    out.insert(key.clone(), value.to_json()?);
                }
                serde_json::Value::Object(out)
            }
        })
    }

    /// Serialize to JSON text.
    pub fn to_json_string(&self) -> Result<String, ValueError> {
        Ok(self.to_json()?.to_string())
    }
}

/// Integral values map to JSON integers so they compare equal to parsed text.
fn json_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 {
        if n >= 0.0 && n < TWO_POW_64 {
            return serde_json::Value::from(n as u64);
        }
        if n < 0.0 && n >= -TWO_POW_63 {
            return serde_json::Value::from(n as i64);
        }
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// JSON text of a number, or `None` when the number is not finite.
pub fn format_number(n: f64) -> Option<String> {
    if !n.is_finite() {
        return None;
    }
    if n == 0.0 {
        return Some("0".to_string());
    }
    if n.fract() == 0.0 && n.abs() < PLAIN_INTEGER_LIMIT {
        return Some(alloc::format!("{n:.0}"));
    }
    serde_json::Number::from_f64(n).map(|num| num.to_string())
}

/// JSON text of a string, quoted and escaped.
pub fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_json_stringify_for_missing_values() {
        let mut map = Map::new();
        map.insert("a".into(), Value::Undefined);
        map.insert("b".into(), Value::from(1));
        map.insert("c".into(), Value::Array(vec![Value::Undefined, Value::symbol("s")]));
        let v = Value::Object(map);
        assert_eq!(v.to_json_string().as_deref(), Ok(r#"{"b":1,"c":[null,null]}"#));
    }

    #[test]
    fn bigint_is_not_json_safe() {
        assert_eq!(
            Value::Array(vec![Value::BigInt(1)]).to_json(),
            Err(ValueError::NotJsonSafe {
                type_name: "bigint"
            })
        );
    }

    #[test]
    fn numbers_format_like_javascript() {
        assert_eq!(format_number(3.0).as_deref(), Some("3"));
        assert_eq!(format_number(-0.0).as_deref(), Some("0"));
        assert_eq!(format_number(0.5).as_deref(), Some("0.5"));
        assert_eq!(format_number(f64::INFINITY), None);
        assert_eq!(json_number(3.0), serde_json::json!(3));
        assert_eq!(json_number(-2.0), serde_json::json!(-2));
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(quote("a\"b\n"), r#""a\"b\n""#);
    }

    #[test]
    fn parse_keeps_key_order() {
        let v = Value::parse_json(r#"{"z":1,"a":[true,null]}"#).unwrap();
        let keys: Vec<_> = v.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["z", "a"]);
        assert!(Value::parse_json("{").is_err());
    }
}
