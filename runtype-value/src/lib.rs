#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]
#![warn(clippy::std_instead_of_alloc)]
#![forbid(unsafe_code)]
//! The dynamic values runtype's compiled functions operate on.
//!
//! [`Value`] models a JavaScript-like heap value: the JSON types plus
//! `undefined`, bigints, symbols, dates and regular expressions. The [`wire`]
//! module holds the string forms those extra types take inside JSON, and
//! [`Value::to_json`] / [`Value::parse_json`] bridge to `serde_json`.

extern crate alloc;

mod value;
pub use value::*;

mod error;
pub use error::ValueError;

mod json;
pub use json::{format_number, quote};

pub mod wire;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

/// Build a [`Value`] from JSON-like syntax.
///
/// ```
/// use runtype_value::{Value, value};
///
/// let v = value!({"name": "Ada", "tags": ["x", 1]});
/// assert_eq!(v.get("name"), &Value::from("Ada"));
/// ```
#[macro_export]
macro_rules! value {
    ($($json:tt)+) => {
        $crate::Value::from($crate::__private::serde_json::json!($($json)+))
    };
}
