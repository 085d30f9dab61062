use alloc::string::String;
use core::fmt;

/// Errors produced when moving values in and out of JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The input text is not valid JSON.
    Parse(String),
    /// The value has no JSON representation (e.g. a bigint that was not encoded first).
    NotJsonSafe {
        /// Runtime type of the offending value.
        type_name: &'static str,
    },
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::Parse(msg) => write!(f, "invalid JSON: {msg}"),
            ValueError::NotJsonSafe { type_name } => {
                write!(f, "a {type_name} value cannot be represented in JSON")
            }
        }
    }
}

impl core::error::Error for ValueError {}
