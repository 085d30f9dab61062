use core::fmt;
use core::str::FromStr;

use crate::JitError;

/// The closed set of functions the compiler can generate for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// `(v) => boolean`
    IsType,
    /// `(v, errs, path) => void`, appends one record per failure.
    TypeErrors,
    /// `(v) => wire value`
    JsonEncode,
    /// `(wire value) => v`
    JsonDecode,
    /// `(v) => JSON text`
    JsonStringify,
    /// `(v) => boolean`
    HasUnknownKeys,
    /// `(v, errs, path) => void`, appends one `never` record per unknown key.
    UnknownKeyErrors,
    /// `(v) => void`, deletes unknown keys in place.
    StripUnknownKeys,
    /// `(v) => void`, sets unknown keys to `undefined` in place.
    UnknownKeysToUndefined,
}

/// How a caller hands a value to a compiled function and what it gets back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallMode {
    /// Borrow the value, get a boolean or a string back.
    Read,
    /// Borrow the value, append errors under an extended path.
    Report,
    /// Move the value in, get the transformed value back.
    Transform,
    /// Mutate the value in place.
    Mutate,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 9] = [
        Operation::IsType,
        Operation::TypeErrors,
        Operation::JsonEncode,
        Operation::JsonDecode,
        Operation::JsonStringify,
        Operation::HasUnknownKeys,
        Operation::UnknownKeyErrors,
        Operation::StripUnknownKeys,
        Operation::UnknownKeysToUndefined,
    ];

    /// The operation id, also used as the generated function's name prefix.
    pub const fn id(self) -> &'static str {
        match self {
            Operation::IsType => "isType",
            Operation::TypeErrors => "typeErrors",
            Operation::JsonEncode => "jsonEncode",
            Operation::JsonDecode => "jsonDecode",
            Operation::JsonStringify => "jsonStringify",
            Operation::HasUnknownKeys => "hasUnknownKeys",
            Operation::UnknownKeyErrors => "unknownKeyErrors",
            Operation::StripUnknownKeys => "stripUnknownKeys",
            Operation::UnknownKeysToUndefined => "unknownKeysToUndefined",
        }
    }

    /// Parameter list of the generated function.
    pub(crate) const fn params(self) -> &'static str {
        match self.call_mode() {
            CallMode::Report => "v, errs, pth",
            _ => "v",
        }
    }

    pub(crate) const fn call_mode(self) -> CallMode {
        match self {
            Operation::IsType | Operation::JsonStringify | Operation::HasUnknownKeys => {
                CallMode::Read
            }
            Operation::TypeErrors | Operation::UnknownKeyErrors => CallMode::Report,
            Operation::JsonEncode | Operation::JsonDecode => CallMode::Transform,
            Operation::StripUnknownKeys | Operation::UnknownKeysToUndefined => CallMode::Mutate,
        }
    }

    /// Whether the function's result is an expression value.
    pub(crate) const fn is_expression(self) -> bool {
        matches!(self.call_mode(), CallMode::Read)
    }

    /// One of the four unknown-key operations.
    pub(crate) const fn is_unknown_keys(self) -> bool {
        matches!(
            self,
            Operation::HasUnknownKeys
                | Operation::UnknownKeyErrors
                | Operation::StripUnknownKeys
                | Operation::UnknownKeysToUndefined
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Operation {
    type Err = JitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.id() == s)
            .ok_or_else(|| JitError::UnknownOperation(s.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.id().parse::<Operation>(), Ok(op));
        }
        assert_eq!(
            "validate".parse::<Operation>(),
            Err(JitError::UnknownOperation("validate".into()))
        );
    }

    #[test]
    fn call_modes() {
        assert_eq!(Operation::IsType.call_mode(), CallMode::Read);
        assert_eq!(Operation::UnknownKeyErrors.params(), "v, errs, pth");
        assert_eq!(Operation::JsonDecode.call_mode(), CallMode::Transform);
        assert!(Operation::StripUnknownKeys.is_unknown_keys());
        assert!(!Operation::JsonEncode.is_expression());
    }
}
