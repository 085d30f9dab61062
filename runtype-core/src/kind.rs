use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::TypeId;

/// A literal value usable as a literal type or an enum member.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// `"a"`
    String(String),
    /// `1`, `2.5`
    Number(f64),
    /// `true` / `false`
    Boolean(bool),
    /// `1n`
    BigInt(i128),
}

impl LiteralValue {
    /// Short name of the literal's primitive type.
    pub const fn primitive_name(&self) -> &'static str {
        match self {
            LiteralValue::String(_) => "string",
            LiteralValue::Number(_) => "number",
            LiteralValue::Boolean(_) => "boolean",
            LiteralValue::BigInt(_) => "bigint",
        }
    }
}

/// Renders the literal the way it would be written in source: strings are
/// double-quoted and escaped, bigints carry an `n` suffix.
impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        '\t' => f.write_str("\\t")?,
                        c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            LiteralValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e21 {
                    write!(f, "{n:.0}")
                } else {
                    write!(f, "{n}")
                }
            }
            LiteralValue::Boolean(b) => write!(f, "{b}"),
            LiteralValue::BigInt(i) => write!(f, "{i}n"),
        }
    }
}

impl From<&str> for LiteralValue {
    fn from(value: &str) -> Self {
        LiteralValue::String(value.into())
    }
}

impl From<String> for LiteralValue {
    fn from(value: String) -> Self {
        LiteralValue::String(value)
    }
}

impl From<f64> for LiteralValue {
    fn from(value: f64) -> Self {
        LiteralValue::Number(value)
    }
}

impl From<i32> for LiteralValue {
    fn from(value: i32) -> Self {
        LiteralValue::Number(value.into())
    }
}

impl From<bool> for LiteralValue {
    fn from(value: bool) -> Self {
        LiteralValue::Boolean(value)
    }
}

impl From<i128> for LiteralValue {
    fn from(value: i128) -> Self {
        LiteralValue::BigInt(value)
    }
}

/// The closed set of node kinds a reflected type graph is made of.
///
/// Child references are [`TypeId`]s into the owning [`TypeGraph`](crate::TypeGraph);
/// they may point back at an ancestor, which is how recursive types are expressed.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    // atomic
    /// Accepts anything.
    Any,
    /// Accepts anything.
    Unknown,
    /// Accepts nothing.
    Never,
    /// `void`, which at runtime is `undefined`.
    Void,
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `boolean`
    Boolean,
    /// `number` (finite)
    Number,
    /// `bigint`
    BigInt,
    /// `string`
    String,
    /// `symbol`
    Symbol,
    /// `object`: any non-primitive value.
    Object,
    /// `Date`
    Date,
    /// `RegExp`
    RegExp,
    /// A single literal value.
    Literal(LiteralValue),
    /// An enum: one of a fixed set of string or number values.
    Enum {
        /// Declared name of the enum.
        name: String,
        /// Member values in declaration order.
        values: Vec<LiteralValue>,
    },

    // collections
    /// `T[]`
    Array {
        /// Element type.
        element: TypeId,
    },
    /// `[A, B?, ...C[]]`; members are [`TypeKind::TupleMember`] or a trailing [`TypeKind::Rest`].
    Tuple {
        /// Member nodes in position order.
        members: Vec<TypeId>,
    },
    /// An object literal type or, when named, an interface.
    ObjectLiteral {
        /// Interface name, `None` for anonymous object literals.
        name: Option<String>,
        /// [`TypeKind::Property`] and [`TypeKind::IndexSignature`] nodes.
        members: Vec<TypeId>,
    },
    /// A class instance type.
    Class {
        /// Class name.
        name: String,
        /// [`TypeKind::Property`] and [`TypeKind::IndexSignature`] nodes.
        members: Vec<TypeId>,
        /// Whether instances can be rebuilt from their JSON form.
        deserializable: bool,
    },
    /// `A | B`; member order is significant.
    Union {
        /// Member types in declaration order.
        types: Vec<TypeId>,
    },
    /// `A & B`
    Intersection {
        /// Member types in declaration order.
        types: Vec<TypeId>,
    },
    /// A function's parameter list; members are [`TypeKind::Parameter`] or a trailing [`TypeKind::Rest`].
    Parameters {
        /// Parameter nodes in position order.
        members: Vec<TypeId>,
    },

    // members
    /// A named property of an object-like type.
    Property {
        /// Property key.
        name: String,
        /// Whether the key may be absent.
        optional: bool,
        /// Property value type.
        ty: TypeId,
    },
    /// `[key: K]: V`
    IndexSignature {
        /// Key type, `string` or `number`.
        key: TypeId,
        /// Value type.
        ty: TypeId,
    },
    /// One positional element of a tuple.
    TupleMember {
        /// Label, when the tuple element is named.
        name: Option<String>,
        /// Whether the element may be absent.
        optional: bool,
        /// Element type.
        ty: TypeId,
    },
    /// One positional function parameter.
    Parameter {
        /// Parameter name.
        name: String,
        /// Whether the argument may be omitted.
        optional: bool,
        /// Parameter type.
        ty: TypeId,
    },
    /// `...T[]` as the last tuple element or parameter; `ty` is the element type.
    Rest {
        /// Element type of the rest items.
        ty: TypeId,
    },

    // function
    /// A function signature.
    Function {
        /// Function name, if any.
        name: Option<String>,
        /// The [`TypeKind::Parameters`] node.
        parameters: TypeId,
        /// Return type.
        return_type: TypeId,
    },
}

impl TypeKind {
    /// Stable lower-camel-case name of this kind.
    pub const fn name(&self) -> &'static str {
        match self {
            TypeKind::Any => "any",
            TypeKind::Unknown => "unknown",
            TypeKind::Never => "never",
            TypeKind::Void => "void",
            TypeKind::Undefined => "undefined",
            TypeKind::Null => "null",
            TypeKind::Boolean => "boolean",
            TypeKind::Number => "number",
            TypeKind::BigInt => "bigint",
            TypeKind::String => "string",
            TypeKind::Symbol => "symbol",
            TypeKind::Object => "object",
            TypeKind::Date => "date",
            TypeKind::RegExp => "regexp",
            TypeKind::Literal(_) => "literal",
            TypeKind::Enum { .. } => "enum",
            TypeKind::Array { .. } => "array",
            TypeKind::Tuple { .. } => "tuple",
            TypeKind::ObjectLiteral { .. } => "objectLiteral",
            TypeKind::Class { .. } => "class",
            TypeKind::Union { .. } => "union",
            TypeKind::Intersection { .. } => "intersection",
            TypeKind::Parameters { .. } => "parameters",
            TypeKind::Property { .. } => "property",
            TypeKind::IndexSignature { .. } => "indexSignature",
            TypeKind::TupleMember { .. } => "tupleMember",
            TypeKind::Parameter { .. } => "parameter",
            TypeKind::Rest { .. } => "rest",
            TypeKind::Function { .. } => "function",
        }
    }

    /// Child nodes in declaration order.
    pub fn children(&self) -> Vec<TypeId> {
        match self {
            TypeKind::Array { element } => alloc::vec![*element],
            TypeKind::Tuple { members }
            | TypeKind::ObjectLiteral { members, .. }
            | TypeKind::Class { members, .. }
            | TypeKind::Parameters { members } => members.clone(),
            TypeKind::Union { types } | TypeKind::Intersection { types } => types.clone(),
            TypeKind::Property { ty, .. }
            | TypeKind::TupleMember { ty, .. }
            | TypeKind::Parameter { ty, .. }
            | TypeKind::Rest { ty } => alloc::vec![*ty],
            TypeKind::IndexSignature { key, ty } => alloc::vec![*key, *ty],
            TypeKind::Function {
                parameters,
                return_type,
                ..
            } => alloc::vec![*parameters, *return_type],
            _ => Vec::new(),
        }
    }

    /// Whether this kind has no children.
    pub const fn is_atomic(&self) -> bool {
        matches!(
            self,
            TypeKind::Any
                | TypeKind::Unknown
                | TypeKind::Never
                | TypeKind::Void
                | TypeKind::Undefined
                | TypeKind::Null
                | TypeKind::Boolean
                | TypeKind::Number
                | TypeKind::BigInt
                | TypeKind::String
                | TypeKind::Symbol
                | TypeKind::Object
                | TypeKind::Date
                | TypeKind::RegExp
                | TypeKind::Literal(_)
                | TypeKind::Enum { .. }
        )
    }

    /// Whether this kind is one slot of a collection.
    pub const fn is_member(&self) -> bool {
        matches!(
            self,
            TypeKind::Property { .. }
                | TypeKind::IndexSignature { .. }
                | TypeKind::TupleMember { .. }
                | TypeKind::Parameter { .. }
                | TypeKind::Rest { .. }
        )
    }

    /// Whether values of this kind are keyed objects (object literals, interfaces, classes).
    pub const fn is_object_like(&self) -> bool {
        matches!(self, TypeKind::ObjectLiteral { .. } | TypeKind::Class { .. })
    }

    /// The declared name of interfaces, classes, enums and functions.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            TypeKind::ObjectLiteral { name, .. } | TypeKind::Function { name, .. } => {
                name.as_deref()
            }
            TypeKind::Class { name, .. } | TypeKind::Enum { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_display_quotes_and_suffixes() {
        assert_eq!(LiteralValue::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(LiteralValue::from(3).to_string(), "3");
        assert_eq!(LiteralValue::from(2.5).to_string(), "2.5");
        assert_eq!(LiteralValue::from(true).to_string(), "true");
        assert_eq!(LiteralValue::from(7_i128).to_string(), "7n");
    }

    #[test]
    fn kind_families() {
        assert!(TypeKind::String.is_atomic());
        assert!(TypeKind::Literal(LiteralValue::from(1)).is_atomic());
        assert!(!TypeKind::Tuple { members: Vec::new() }.is_atomic());
        assert!(
            TypeKind::ObjectLiteral {
                name: None,
                members: Vec::new()
            }
            .is_object_like()
        );
    }
}
