use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use runtype_value::ValueError;

use crate::Operation;

/// Errors raised while compiling a function. These are configuration errors:
/// the type graph or the request cannot be compiled, and retrying won't help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JitError {
    /// The type graph nests deeper than [`JitOptions::max_depth`](crate::JitOptions::max_depth).
    MaxDepthExceeded {
        /// The configured limit.
        max_depth: usize,
        /// Kind name of the node at which the limit was hit.
        kind: &'static str,
    },

    /// The operation cannot be compiled for this kind of type.
    UnsupportedOperation {
        /// The requested operation.
        op: Operation,
        /// Kind name of the offending node.
        kind: &'static str,
        /// Why the operation is not available.
        reason: &'static str,
    },

    /// An operation id that is not one of the nine known operations.
    UnknownOperation(String),

    /// Two different (operation, jit id) pairs hashed to the same function name.
    HashCollision {
        /// The colliding hash.
        hash: FnHash,
        /// The jit id already cached under `hash`.
        existing: Arc<str>,
        /// The jit id that was being compiled.
        incoming: Arc<str>,
    },

    /// An invariant of the compiler was violated.
    InvariantViolation(&'static str),
}

impl fmt::Display for JitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JitError::MaxDepthExceeded { max_depth, kind } => write!(
                f,
                "type graph is nested deeper than {max_depth} levels (at a {kind} node)"
            ),
            JitError::UnsupportedOperation { op, kind, reason } => {
                write!(f, "cannot compile {op} for {kind}: {reason}")
            }
            JitError::UnknownOperation(id) => write!(f, "unknown operation id `{id}`"),
            JitError::HashCollision {
                hash,
                existing,
                incoming,
            } => write!(
                f,
                "function hash {hash} collides: cached for `{existing}`, requested for `{incoming}`"
            ),
            JitError::InvariantViolation(what) => write!(f, "invariant violation: {what}"),
        }
    }
}

impl core::error::Error for JitError {}

/// Short hash naming a compiled function, derived from (operation, jit id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FnHash(pub(crate) u64);

impl fmt::Display for FnHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:012x}", self.0 >> 16)
    }
}

/// Errors thrown by compiled functions while they run.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// An object carried more unknown keys than
    /// [`JitOptions::max_unknown_keys`](crate::JitOptions::max_unknown_keys).
    TooManyUnknownKeys {
        /// The configured limit.
        limit: usize,
    },

    /// A value matched none of a union's members.
    UnionMismatch {
        /// Kind names of the union members, in declaration order.
        members: Arc<[&'static str]>,
        /// Runtime type of the value.
        actual: &'static str,
    },

    /// A union wire value did not carry a valid `[index, value]` discriminator.
    UnionDiscriminator {
        /// Number of union members.
        members: usize,
    },

    /// A value reached a `never` type.
    Never,

    /// A wire value could not be converted back to its native form.
    InvalidWireValue {
        /// Kind name of the expected native type.
        expected: &'static str,
        /// Runtime type of the wire value.
        actual: &'static str,
    },

    /// A value without JSON representation reached a JSON operation.
    NotJsonSafe(ValueError),

    /// A typed entry point was called on a function compiled for another operation.
    WrongOperation {
        /// The operation the function was compiled for.
        compiled: Operation,
        /// The operation the caller asked for.
        requested: Operation,
    },

    /// A function was called before its compilation finished.
    NotCompiled(FnHash),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::TooManyUnknownKeys { limit } => {
                write!(f, "too many unknown keys (more than {limit})")
            }
            RuntimeError::UnionMismatch { members, actual } => {
                write!(f, "a value of type {actual} matches none of the union members [")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(member)?;
                }
                f.write_str("]")
            }
            RuntimeError::UnionDiscriminator { members } => write!(
                f,
                "expected a [index, value] pair with index below {members}"
            ),
            RuntimeError::Never => write!(f, "a value reached a `never` type"),
            RuntimeError::InvalidWireValue { expected, actual } => {
                write!(f, "cannot decode a {actual} wire value as {expected}")
            }
            RuntimeError::NotJsonSafe(err) => write!(f, "{err}"),
            RuntimeError::WrongOperation {
                compiled,
                requested,
            } => write!(f, "function was compiled for {compiled}, not {requested}"),
            RuntimeError::NotCompiled(hash) => {
                write!(f, "function {hash} was called before it finished compiling")
            }
        }
    }
}

impl core::error::Error for RuntimeError {}

impl From<ValueError> for RuntimeError {
    fn from(err: ValueError) -> Self {
        RuntimeError::NotJsonSafe(err)
    }
}

/// One step of the path to an invalid value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathItem {
    /// Object property.
    Key(String),
    /// Array element.
    Index(usize),
}

impl fmt::Display for PathItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathItem::Key(key) => write!(f, ".{key}"),
            PathItem::Index(i) => write!(f, "[{i}]"),
        }
    }
}

impl From<&str> for PathItem {
    fn from(key: &str) -> Self {
        PathItem::Key(key.into())
    }
}

impl From<usize> for PathItem {
    fn from(index: usize) -> Self {
        PathItem::Index(index)
    }
}

/// A validation failure reported by `typeErrors` and `unknownKeyErrors`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeError {
    /// Where the invalid value sits, relative to the validated root.
    pub path: Vec<PathItem>,
    /// Name of the expected type at that path (`"never"` for unknown keys).
    pub expected: String,
}

impl TypeError {
    /// Build an error record.
    pub fn new(path: impl IntoIterator<Item = PathItem>, expected: impl Into<String>) -> Self {
        Self {
            path: path.into_iter().collect(),
            expected: expected.into(),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for item in &self.path {
            write!(f, "{item}")?;
        }
        write!(f, ": expected {}", self.expected)
    }
}
