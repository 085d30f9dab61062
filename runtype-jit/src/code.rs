//! The intermediate representation compiled functions are built from.
//!
//! Emitters produce [`Expr`] and [`Stmt`] trees; [`render`](crate::render)
//! turns them into JavaScript-like source text for inspection and
//! [`lower`](crate::lower) turns them into executable closures.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use runtype_value::Value;

use crate::{FnHash, Operation};

/// What a loop variable ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VarKind {
    Index,
    Key,
}

/// A loop variable; `slot` is its nesting level inside the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoopVar {
    pub slot: usize,
    pub kind: VarKind,
}

/// One step of an [`Accessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Key(Arc<str>),
    Index(usize),
    Var(LoopVar),
}

/// Path from the function's argument to the value being processed,
/// e.g. `v.items[i0].name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Accessor {
    steps: Vec<Step>,
}

impl Accessor {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    fn with(&self, step: Step) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    pub fn key(&self, key: &str) -> Self {
        self.with(Step::Key(key.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.with(Step::Index(index))
    }

    pub fn var(&self, var: LoopVar) -> Self {
        self.with(Step::Var(var))
    }

    /// The variable a loop over this value binds: one deeper than any
    /// variable the accessor already uses.
    pub fn next_var(&self, kind: VarKind) -> LoopVar {
        let slot = self
            .steps
            .iter()
            .filter(|s| matches!(s, Step::Var(_)))
            .count();
        LoopVar { slot, kind }
    }

    /// Split into the parent accessor and the last step.
    pub fn split_last(&self) -> Option<(Accessor, &Step)> {
        let (last, parent) = self.steps.split_last()?;
        Some((
            Accessor {
                steps: parent.to_vec(),
            },
            last,
        ))
    }
}

/// Type tests usable in expressions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Check {
    String,
    /// Finite numbers only.
    Number,
    Boolean,
    BigInt,
    Symbol,
    Null,
    Undefined,
    /// A date holding a valid time.
    Date,
    RegExp,
    /// Any non-primitive.
    Object,
    /// A keyed object (not an array, date or regexp).
    PlainObject,
    Array,
    Literal(Value),
    OneOf(Arc<[Value]>),
    /// Array length is at most `n`.
    MaxLen(usize),
}

/// Wire-form conversions applied by encode and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Conversion {
    BigIntToString,
    StringToBigInt,
    DateToIso,
    IsoToDate,
    RegExpToString,
    StringToRegExp,
    SymbolToString,
    StringToSymbol,
}

/// The declared keys of an object shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KnownKeys {
    /// Scanned linearly.
    Inline(Arc<[Arc<str>]>),
    /// Hoisted into context slot `slot` as a set.
    Hoisted { slot: usize, keys: Arc<[Arc<str>]> },
}

impl KnownKeys {
    pub fn keys(&self) -> &Arc<[Arc<str>]> {
        match self {
            KnownKeys::Inline(keys) | KnownKeys::Hoisted { keys, .. } => keys,
        }
    }
}

/// Errors thrown by generated code.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Failure {
    Never,
    UnionMismatch {
        members: Arc<[&'static str]>,
        at: Accessor,
    },
    UnionDiscriminator {
        members: usize,
    },
}

/// What a stringify `Join` iterates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JoinOver {
    /// Array items starting at `from`.
    Items { from: usize },
    /// Own keys except `exclude`.
    Keys { exclude: KnownKeys },
}

/// One comma-separated part of a JSON array or object.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SeqPart {
    pub value: Expr,
    /// Leave the part out when this is true.
    pub skip: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Const(Value),
    Is(Check, Accessor),
    /// The key bound to a loop variable reads as a number.
    NumericKey(LoopVar),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    Get(Accessor),
    /// Move the value out, leaving `undefined` behind.
    Take(Accessor),
    Convert(Conversion, Accessor),
    /// `[index, value]`
    Pair(usize, Box<Expr>),
    Call {
        hash: FnHash,
        op: Operation,
        at: Accessor,
    },
    HasUnknownKeys(Accessor, KnownKeys),
    /// JSON text of a value.
    Json(Box<Expr>),
    /// JSON text of the key bound to a loop variable.
    JsonKey(LoopVar),
    /// String concatenation.
    Concat(Vec<Expr>),
    /// `open` + non-empty parts joined by `,` + `close`.
    Seq {
        open: &'static str,
        close: &'static str,
        parts: Vec<SeqPart>,
    },
    /// Items or keys of `at`, each rendered by `item`, joined by `,`.
    Join {
        at: Accessor,
        var: LoopVar,
        over: JoinOver,
        item: Box<Expr>,
        skip: Option<Box<Expr>>,
    },
    /// A returning block used as an expression.
    Invoke(Vec<Stmt>),
    Fail(Failure),
}

impl Expr {
    pub fn bool(b: bool) -> Self {
        Expr::Const(Value::Bool(b))
    }

    pub fn str(s: impl Into<alloc::string::String>) -> Self {
        Expr::Const(Value::String(s.into()))
    }

    pub fn is(check: Check, at: &Accessor) -> Self {
        Expr::Is(check, at.clone())
    }

    pub fn not(e: Expr) -> Self {
        match e {
            Expr::Const(Value::Bool(b)) => Expr::bool(!b),
            Expr::Not(inner) => *inner,
            e => Expr::Not(Box::new(e)),
        }
    }

    /// Conjunction; `true` operands drop out, nested conjunctions flatten.
    pub fn and(parts: impl IntoIterator<Item = Expr>) -> Self {
        let mut out = Vec::new();
        for part in parts {
            match part {
                Expr::Const(Value::Bool(true)) => {}
                Expr::And(inner) => out.extend(inner),
                part => out.push(part),
            }
        }
        match out.len() {
            0 => Expr::bool(true),
            1 => out.remove(0),
            _ => Expr::And(out),
        }
    }

    /// Disjunction; `false` operands drop out, nested disjunctions flatten.
    pub fn or(parts: impl IntoIterator<Item = Expr>) -> Self {
        let mut out = Vec::new();
        for part in parts {
            match part {
                Expr::Const(Value::Bool(false)) => {}
                Expr::Or(inner) => out.extend(inner),
                part => out.push(part),
            }
        }
        match out.len() {
            0 => Expr::bool(false),
            1 => out.remove(0),
            _ => Expr::Or(out),
        }
    }

    pub fn cond(test: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Cond(Box::new(test), Box::new(then), Box::new(otherwise))
    }

    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Concat(parts.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Expr(Expr),
    Return(Expr),
    If {
        test: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    ForEach {
        at: Accessor,
        var: LoopVar,
        from: usize,
        body: Vec<Stmt>,
    },
    /// Own keys of `at` minus `exclude`; with a `limit`, more keys than that
    /// is an error.
    ForKeys {
        at: Accessor,
        var: LoopVar,
        exclude: KnownKeys,
        limit: Option<usize>,
        body: Vec<Stmt>,
    },
    PushError {
        at: Accessor,
        expected: Arc<str>,
    },
    Assign(Accessor, Expr),
    Delete(Accessor),
    Throw(Failure),
}

impl Stmt {
    pub fn if_then(test: Expr, then: Vec<Stmt>) -> Self {
        Stmt::If {
            test,
            then,
            otherwise: Vec::new(),
        }
    }

    /// `if (test) return value;`
    pub fn return_if(test: Expr, value: bool) -> Self {
        Stmt::if_then(test, alloc::vec![Stmt::Return(Expr::bool(value))])
    }

    pub fn push_error(at: &Accessor, expected: &str) -> Self {
        Stmt::PushError {
            at: at.clone(),
            expected: expected.into(),
        }
    }

    pub fn for_each(at: &Accessor, var: LoopVar, from: usize, body: Vec<Stmt>) -> Self {
        Stmt::ForEach {
            at: at.clone(),
            var,
            from,
            body,
        }
    }
}

/// A fragment emitted for one node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Code {
    /// Usable in expression position.
    Expr(Expr),
    /// Statements; `returns` is set when the block ends by returning the
    /// function's result.
    Block { stmts: Vec<Stmt>, returns: bool },
}

impl Code {
    pub fn stmts(stmts: Vec<Stmt>) -> Self {
        Code::Block {
            stmts,
            returns: false,
        }
    }

    pub fn returning(stmts: Vec<Stmt>) -> Self {
        Code::Block {
            stmts,
            returns: true,
        }
    }

    pub fn into_stmts(self) -> Vec<Stmt> {
        match self {
            Code::Expr(e) => alloc::vec![Stmt::Expr(e)],
            Code::Block { stmts, .. } => stmts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_vars_nest_by_accessor_depth() {
        let root = Accessor::root();
        let i0 = root.next_var(VarKind::Index);
        assert_eq!(i0.slot, 0);
        let item = root.key("items").var(i0);
        let k1 = item.next_var(VarKind::Key);
        assert_eq!(k1.slot, 1);
        assert_eq!(item.index(2).next_var(VarKind::Index).slot, 1);
    }

    #[test]
    fn boolean_algebra_simplifies() {
        let at = Accessor::root();
        assert_eq!(Expr::and([Expr::bool(true), Expr::bool(true)]), Expr::bool(true));
        assert_eq!(
            Expr::and([Expr::bool(true), Expr::is(Check::String, &at)]),
            Expr::is(Check::String, &at)
        );
        assert_eq!(Expr::or(Vec::new()), Expr::bool(false));
        assert_eq!(Expr::not(Expr::not(Expr::Get(at.clone()))), Expr::Get(at));
    }
}
