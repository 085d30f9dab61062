use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Debug, Formatter};

use indexmap::IndexMap;

/// Key-ordered map used for object values.
pub type Map = IndexMap<String, Value>;

/// Shared `undefined`, handed out for missing properties and out-of-range indices.
pub static UNDEFINED: Value = Value::Undefined;

/// A dynamically typed runtime value.
///
/// Mirrors the value domain of a JavaScript runtime: besides the JSON types it
/// has `undefined`, bigints, symbols, dates and regular expressions, which is
/// exactly the set of values whose wire form differs from their native form.
#[derive(Clone, PartialEq, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// A double precision number (may be NaN or infinite).
    Number(f64),
    /// An arbitrary precision integer, bounded to `i128` here.
    BigInt(i128),
    /// A string.
    String(String),
    /// A symbol with an optional description.
    Symbol(Option<String>),
    /// A date as milliseconds since the Unix epoch; NaN is an invalid date.
    Date(f64),
    /// A regular expression.
    RegExp {
        /// Pattern source, without delimiters.
        source: String,
        /// Flags such as `gi`.
        flags: String,
    },
    /// An array.
    Array(Vec<Value>),
    /// A plain object with insertion-ordered keys.
    Object(Map),
}

impl Value {
    /// An empty object.
    pub fn object() -> Self {
        Value::Object(Map::new())
    }

    /// A regular expression value.
    pub fn regexp(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Value::RegExp {
            source: source.into(),
            flags: flags.into(),
        }
    }

    /// A symbol with a description.
    pub fn symbol(description: impl Into<String>) -> Self {
        Value::Symbol(Some(description.into()))
    }

    /// Name of the runtime type, as used in diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Date(_) => "Date",
            Value::RegExp { .. } => "RegExp",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Returns true if the value is `undefined`.
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if the value is `null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for non-primitive values: arrays, objects, dates and regexps.
    pub const fn is_object(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Object(_) | Value::Date(_) | Value::RegExp { .. }
        )
    }

    /// Returns true for a finite number.
    pub fn is_finite_number(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_finite())
    }

    /// Returns true for a date that holds a valid time.
    pub fn is_valid_date(&self) -> bool {
        matches!(self, Value::Date(ms) if ms.is_finite())
    }

    /// Gets the value as a boolean.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Gets the value as a number.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Gets the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Gets the value as an array slice.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Gets the value as a mutable array.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Gets the value as an object map.
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Gets the value as a mutable object map.
    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Property lookup; anything that is not an own property reads as `undefined`.
    pub fn get(&self, key: &str) -> &Value {
        match self {
            Value::Object(map) => map.get(key).unwrap_or(&UNDEFINED),
            _ => &UNDEFINED,
        }
    }

    /// Element lookup; out-of-range indices read as `undefined`.
    pub fn get_index(&self, index: usize) -> &Value {
        match self {
            Value::Array(items) => items.get(index).unwrap_or(&UNDEFINED),
            _ => &UNDEFINED,
        }
    }

    /// Mutable property lookup; `None` when the property is absent.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.as_object_mut()?.get_mut(key)
    }

    /// Mutable element lookup; `None` when the index is out of range.
    pub fn get_index_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.as_array_mut()?.get_mut(index)
    }

    /// Length of an array or number of keys of an object.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Replace the value with `undefined`, returning the previous one.
    pub fn take(&mut self) -> Value {
        core::mem::take(self)
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => Debug::fmt(b, f),
            Value::Number(n) => Debug::fmt(n, f),
            Value::BigInt(i) => write!(f, "{i}n"),
            Value::String(s) => Debug::fmt(s, f),
            Value::Symbol(None) => f.write_str("Symbol()"),
            Value::Symbol(Some(desc)) => write!(f, "Symbol({desc})"),
            Value::Date(ms) => match crate::wire::date_to_iso(*ms) {
                Some(iso) => write!(f, "Date({iso})"),
                None => f.write_str("Date(Invalid)"),
            },
            Value::RegExp { source, flags } => write!(f, "/{source}/{flags}"),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(map) => f.debug_map().entries(map).finish(),
        }
    }
}

// === From implementations ===

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::BigInt(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Undefined,
        }
    }
}

impl From<Box<Value>> for Value {
    fn from(b: Box<Value>) -> Self {
        *b
    }
}

// === FromIterator implementations ===

impl<T: Into<Value>> core::iter::FromIterator<T> for Value {
    /// Collect into an array value.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::Array(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reads_are_undefined() {
        let v = Value::Object(Map::from([(String::from("a"), Value::from(1))]));
        assert_eq!(v.get("a"), &Value::Number(1.0));
        assert!(v.get("b").is_undefined());
        assert!(v.get_index(0).is_undefined());
        assert!(Value::from(vec![Value::Null]).get_index(3).is_undefined());
    }

    #[test]
    fn object_predicate_matches_non_primitives() {
        assert!(Value::object().is_object());
        assert!(Value::Array(Vec::new()).is_object());
        assert!(Value::Date(0.0).is_object());
        assert!(Value::regexp("a", "").is_object());
        assert!(!Value::Null.is_object());
        assert!(!Value::from("x").is_object());
    }

    #[test]
    fn debug_output() {
        let v: Value = [Value::from(1), Value::BigInt(2), Value::Undefined]
            .into_iter()
            .collect();
        assert_eq!(alloc::format!("{v:?}"), "[1.0, 2n, undefined]");
    }
}
