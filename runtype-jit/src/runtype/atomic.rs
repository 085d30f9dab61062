//! Leaf kinds. Everything here is inlined at the use site.

use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec;

use runtype_core::{LiteralValue, TypeKind};
use runtype_value::{Value, format_number, quote};

use crate::Operation;
use crate::code::{Accessor, Check, Code, Conversion, Expr, Failure, Stmt};
use crate::compiler::{Compiler, Scope};

pub(crate) fn literal_value(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::String(s) => Value::String(s.clone()),
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::Boolean(b) => Value::Bool(*b),
        LiteralValue::BigInt(i) => Value::BigInt(*i),
    }
}

/// JSON text of a literal.
fn literal_json(literal: &LiteralValue) -> alloc::string::String {
    match literal {
        LiteralValue::String(s) => quote(s),
        LiteralValue::Number(n) => format_number(*n).unwrap_or_else(|| "null".into()),
        LiteralValue::Boolean(b) => b.to_string(),
        LiteralValue::BigInt(i) => quote(&i.to_string()),
    }
}

/// The runtime test for an atomic kind; `None` accepts everything.
pub(crate) fn check(kind: &TypeKind, at: &Accessor) -> Option<Expr> {
    let check = match kind {
        TypeKind::Never => return Some(Expr::bool(false)),
        TypeKind::Void | TypeKind::Undefined => Check::Undefined,
        TypeKind::Null => Check::Null,
        TypeKind::Boolean => Check::Boolean,
        TypeKind::Number => Check::Number,
        TypeKind::BigInt => Check::BigInt,
        TypeKind::String => Check::String,
        TypeKind::Symbol => Check::Symbol,
        TypeKind::Object => Check::Object,
        TypeKind::Date => Check::Date,
        TypeKind::RegExp => Check::RegExp,
        TypeKind::Literal(value) => Check::Literal(literal_value(value)),
        TypeKind::Enum { values, .. } => Check::OneOf(values.iter().map(literal_value).collect()),
        _ => return None,
    };
    Some(Expr::is(check, at))
}

fn is_bigint(kind: &TypeKind) -> bool {
    matches!(
        kind,
        TypeKind::BigInt | TypeKind::Literal(LiteralValue::BigInt(_))
    )
}

fn encode(kind: &TypeKind, at: &Accessor) -> Option<Code> {
    let conversion = match kind {
        TypeKind::Never => return Some(Code::stmts(vec![Stmt::Throw(Failure::Never)])),
        TypeKind::Void | TypeKind::Undefined => return Some(Code::Expr(Expr::Const(Value::Null))),
        kind if is_bigint(kind) => Conversion::BigIntToString,
        TypeKind::Date => Conversion::DateToIso,
        TypeKind::RegExp => Conversion::RegExpToString,
        TypeKind::Symbol => Conversion::SymbolToString,
        _ => return None,
    };
    Some(Code::Expr(Expr::Convert(conversion, at.clone())))
}

fn decode(kind: &TypeKind, at: &Accessor) -> Option<Code> {
    let conversion = match kind {
        TypeKind::Never => return Some(Code::stmts(vec![Stmt::Throw(Failure::Never)])),
        TypeKind::Void | TypeKind::Undefined => {
            return Some(Code::Expr(Expr::Const(Value::Undefined)));
        }
        kind if is_bigint(kind) => Conversion::StringToBigInt,
        TypeKind::Date => Conversion::IsoToDate,
        TypeKind::RegExp => Conversion::StringToRegExp,
        TypeKind::Symbol => Conversion::StringToSymbol,
        _ => return None,
    };
    Some(Code::Expr(Expr::Convert(conversion, at.clone())))
}

fn stringify(kind: &TypeKind, at: &Accessor) -> Expr {
    let json = |e: Expr| Expr::Json(Box::new(e));
    match kind {
        TypeKind::Never => Expr::Fail(Failure::Never),
        TypeKind::Void | TypeKind::Undefined | TypeKind::Null => Expr::str("null"),
        TypeKind::Literal(value) => Expr::str(literal_json(value)),
        kind if is_bigint(kind) => json(Expr::Convert(Conversion::BigIntToString, at.clone())),
        TypeKind::Date => json(Expr::Convert(Conversion::DateToIso, at.clone())),
        TypeKind::RegExp => json(Expr::Convert(Conversion::RegExpToString, at.clone())),
        TypeKind::Symbol => json(Expr::Convert(Conversion::SymbolToString, at.clone())),
        _ => json(Expr::Get(at.clone())),
    }
}

impl Compiler<'_> {
    pub(crate) fn emit_atomic(
        &self,
        scope: &Scope<'_>,
        kind: &TypeKind,
        op: Operation,
    ) -> Option<Code> {
        let at = scope.at();
        match op {
            Operation::IsType => check(kind, at).map(Code::Expr),
            Operation::TypeErrors => {
                let error = vec![Stmt::push_error(at, kind.name())];
                match check(kind, at)? {
                    Expr::Const(Value::Bool(false)) => Some(Code::stmts(error)),
                    test => Some(Code::stmts(vec![Stmt::if_then(Expr::not(test), error)])),
                }
            }
            Operation::JsonEncode => encode(kind, at),
            Operation::JsonDecode => decode(kind, at),
            Operation::JsonStringify => Some(Code::Expr(stringify(kind, at))),
            Operation::HasUnknownKeys
            | Operation::UnknownKeyErrors
            | Operation::StripUnknownKeys
            | Operation::UnknownKeysToUndefined => None,
        }
    }
}
