//! Renders the IR as JavaScript-like source text.
//!
//! The text is what [`JitFunction::source_code`](crate::JitFunction::source_code)
//! returns. It is deterministic: two nodes with the same jit id render
//! byte-identical functions.

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::Write;

use runtype_value::{Value, format_number, quote};

use crate::Operation;
use crate::code::{
    Accessor, Check, Conversion, Expr, Failure, JoinOver, KnownKeys, LoopVar, SeqPart, Step, Stmt,
    VarKind,
};
use crate::operation::CallMode;

const INDENT: &str = "  ";

/// Binding strength of a rendered expression; higher binds tighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Cond,
    Or,
    And,
    Eq,
    Add,
    Atom,
}

/// Render a function body.
pub(crate) fn body(stmts: &[Stmt]) -> String {
    let mut out = String::new();
    Renderer::default().stmts(&mut out, stmts, 0);
    out
}

/// Render hoisted key sets, one `const` per line.
pub(crate) fn context(sets: &[Arc<[Arc<str>]>]) -> String {
    let mut out = String::new();
    for (slot, keys) in sets.iter().enumerate() {
        if slot > 0 {
            out.push('\n');
        }
        let _ = write!(out, "const ks{slot} = new Set({});", key_list(keys));
    }
    out
}

/// Render a complete function declaration.
pub(crate) fn function(op: Operation, name: &str, source: &str) -> String {
    let mut out = format!("function {name}({}) {{\n", op.params());
    for line in source.lines() {
        if !line.is_empty() {
            out.push_str(INDENT);
            out.push_str(line);
        }
        out.push('\n');
    }
    out.push('}');
    out
}

/// `isType_3f2a...`
pub(crate) fn fn_name(op: Operation, hash: crate::FnHash) -> String {
    format!("{}_{hash}", op.id())
}

fn var_name(var: LoopVar) -> String {
    match var.kind {
        VarKind::Index => format!("i{}", var.slot),
        VarKind::Key => format!("k{}", var.slot),
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// `v.items[i0]["first-name"]`
fn accessor(at: &Accessor) -> String {
    let mut out = String::from("v");
    for step in at.steps() {
        match step {
            Step::Key(key) if is_identifier(key) => {
                out.push('.');
                out.push_str(key);
            }
            Step::Key(key) => {
                let _ = write!(out, "[{}]", quote(key));
            }
            Step::Index(i) => {
                let _ = write!(out, "[{i}]");
            }
            Step::Var(var) => {
                let _ = write!(out, "[{}]", var_name(*var));
            }
        }
    }
    out
}

/// `[...pth, "items", i0]`
fn literal_path(at: &Accessor) -> String {
    let mut out = String::from("[...pth");
    for step in at.steps() {
        out.push_str(", ");
        match step {
            Step::Key(key) => out.push_str(&quote(key)),
            Step::Index(i) => {
                let _ = write!(out, "{i}");
            }
            Step::Var(var) => out.push_str(&var_name(*var)),
        }
    }
    out.push(']');
    out
}

fn key_list(keys: &[Arc<str>]) -> String {
    let quoted: Vec<String> = keys.iter().map(|k| quote(k)).collect();
    format!("[{}]", quoted.join(", "))
}

fn known_keys(keys: &KnownKeys) -> String {
    match keys {
        KnownKeys::Inline(keys) => key_list(keys),
        KnownKeys::Hoisted { slot, .. } => format!("ks{slot}"),
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".into(),
        Value::Null => "null".into(),
        Value::Bool(b) => format!("{b}"),
        Value::Number(n) => format_number(*n).unwrap_or_else(|| "NaN".into()),
        Value::BigInt(i) => format!("{i}n"),
        Value::String(s) => quote(s),
        other => format!("/* {} */ undefined", other.type_name()),
    }
}

fn failure(f: &Failure) -> String {
    match f {
        Failure::Never => "neverError()".into(),
        Failure::UnionMismatch { members, at } => {
            let names: Vec<String> = members.iter().map(|m| quote(m)).collect();
            format!("unionMismatch([{}], {})", names.join(", "), accessor(at))
        }
        Failure::UnionDiscriminator { members } => format!("unionDiscriminator({members})"),
    }
}

#[derive(Default)]
struct Renderer;

impl Renderer {
    fn stmts(&self, out: &mut String, stmts: &[Stmt], depth: usize) {
        for stmt in stmts {
            self.stmt(out, stmt, depth);
        }
    }

    fn line(&self, out: &mut String, depth: usize, text: &str) {
        for _ in 0..depth {
            out.push_str(INDENT);
        }
        out.push_str(text);
        out.push('\n');
    }

    fn block(&self, out: &mut String, head: &str, body: &[Stmt], depth: usize) {
        self.line(out, depth, &format!("{head} {{"));
        self.stmts(out, body, depth + 1);
    }

    fn stmt(&self, out: &mut String, stmt: &Stmt, depth: usize) {
        match stmt {
            Stmt::Expr(e) => {
                let text = self.expr(e, Prec::Cond, depth);
                self.line(out, depth, &format!("{text};"));
            }
            Stmt::Return(e) => {
                let text = self.expr(e, Prec::Cond, depth);
                self.line(out, depth, &format!("return {text};"));
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                let mut head = format!("if ({})", self.expr(test, Prec::Cond, depth));
                let mut then = then;
                let mut otherwise = otherwise;
                loop {
                    self.block(out, &head, then, depth);
                    match otherwise.as_slice() {
                        [] => {
                            self.line(out, depth, "}");
                            break;
                        }
                        [
                            Stmt::If {
                                test,
                                then: next_then,
                                otherwise: next_otherwise,
                            },
                        ] => {
                            head = format!("}} else if ({})", self.expr(test, Prec::Cond, depth));
                            then = next_then;
                            otherwise = next_otherwise;
                        }
                        rest => {
                            self.block(out, "} else", rest, depth);
                            self.line(out, depth, "}");
                            break;
                        }
                    }
                }
            }
            Stmt::ForEach {
                at,
                var,
                from,
                body,
            } => {
                let i = var_name(*var);
                let head = format!(
                    "for (let {i} = {from}; {i} < {}.length; {i}++)",
                    accessor(at)
                );
                self.block(out, &head, body, depth);
                self.line(out, depth, "}");
            }
            Stmt::ForKeys {
                at,
                var,
                exclude,
                limit,
                body,
            } => {
                let k = var_name(*var);
                let head = match limit {
                    Some(limit) => format!(
                        "for (const {k} of unknownKeys({}, {}, {limit}))",
                        accessor(at),
                        known_keys(exclude)
                    ),
                    None if exclude.keys().is_empty() => {
                        format!("for (const {k} in {})", accessor(at))
                    }
                    None => format!(
                        "for (const {k} of ownKeys({}, {}))",
                        accessor(at),
                        known_keys(exclude)
                    ),
                };
                self.block(out, &head, body, depth);
                self.line(out, depth, "}");
            }
            Stmt::PushError { at, expected } => {
                let text = format!(
                    "errs.push({{path: {}, expected: {}}});",
                    literal_path(at),
                    quote(expected)
                );
                self.line(out, depth, &text);
            }
            Stmt::Assign(at, e) => {
                let text = format!("{} = {};", accessor(at), self.expr(e, Prec::Cond, depth));
                self.line(out, depth, &text);
            }
            Stmt::Delete(at) => self.line(out, depth, &format!("delete {};", accessor(at))),
            Stmt::Throw(f) => self.line(out, depth, &format!("throw {};", failure(f))),
        }
    }

    /// Render `e` for a context that needs at least `min` binding strength.
    fn expr(&self, e: &Expr, min: Prec, depth: usize) -> String {
        let (text, prec) = self.expr_prec(e, depth);
        if prec < min { format!("({text})") } else { text }
    }

    /// Operands of `&&`, `||` and `?:` get parentheses when they are
    /// themselves compound, even where precedence would allow leaving them out.
    fn operand(&self, e: &Expr, depth: usize) -> String {
        match e {
            Expr::And(_) | Expr::Or(_) | Expr::Cond(..) => {
                format!("({})", self.expr(e, Prec::Cond, depth))
            }
            e => self.expr(e, Prec::Eq, depth),
        }
    }

    fn expr_prec(&self, e: &Expr, depth: usize) -> (String, Prec) {
        match e {
            Expr::Const(v) => (literal(v), Prec::Atom),
            Expr::Is(check, at) => self.check(check, at),
            Expr::NumericKey(var) => (format!("isNumericKey({})", var_name(*var)), Prec::Atom),
            Expr::Not(inner) => (
                format!("!({})", self.expr(inner, Prec::Cond, depth)),
                Prec::Atom,
            ),
            Expr::And(parts) => {
                let parts: Vec<String> = parts.iter().map(|p| self.operand(p, depth)).collect();
                (parts.join(" && "), Prec::And)
            }
            Expr::Or(parts) => {
                let parts: Vec<String> = parts.iter().map(|p| self.operand(p, depth)).collect();
                (parts.join(" || "), Prec::Or)
            }
            Expr::Cond(test, then, otherwise) => {
                let otherwise = match otherwise.as_ref() {
                    chained @ Expr::Cond(..) => self.expr(chained, Prec::Cond, depth),
                    other => self.operand(other, depth),
                };
                (
                    format!(
                        "{} ? {} : {otherwise}",
                        self.operand(test, depth),
                        self.operand(then, depth)
                    ),
                    Prec::Cond,
                )
            }
            Expr::Get(at) | Expr::Take(at) => (accessor(at), Prec::Atom),
            Expr::Convert(conversion, at) => {
                let v = accessor(at);
                match conversion {
                    Conversion::BigIntToString => (format!("{v}.toString()"), Prec::Atom),
                    Conversion::StringToBigInt => (format!("BigInt({v})"), Prec::Atom),
                    Conversion::DateToIso => (format!("{v}.toISOString()"), Prec::Atom),
                    Conversion::IsoToDate => (format!("new Date({v})"), Prec::Atom),
                    Conversion::RegExpToString => (format!("String({v})"), Prec::Atom),
                    Conversion::StringToRegExp => (format!("toRegExp({v})"), Prec::Atom),
                    Conversion::SymbolToString => (
                        format!("\"Symbol:\" + ({v}.description ?? \"\")"),
                        Prec::Add,
                    ),
                    Conversion::StringToSymbol => (format!("Symbol({v}.slice(7))"), Prec::Atom),
                }
            }
            Expr::Pair(index, inner) => (
                format!("[{index}, {}]", self.expr(inner, Prec::Cond, depth)),
                Prec::Atom,
            ),
            Expr::Call { hash, op, at } => {
                let name = fn_name(*op, *hash);
                let text = match op.call_mode() {
                    CallMode::Report => {
                        format!("{name}({}, errs, {})", accessor(at), literal_path(at))
                    }
                    _ => format!("{name}({})", accessor(at)),
                };
                (text, Prec::Atom)
            }
            Expr::HasUnknownKeys(at, keys) => (
                format!("hasUnknownKeys({}, {})", accessor(at), known_keys(keys)),
                Prec::Atom,
            ),
            Expr::Json(inner) => (
                format!("JSON.stringify({})", self.expr(inner, Prec::Cond, depth)),
                Prec::Atom,
            ),
            Expr::JsonKey(var) => (format!("JSON.stringify({})", var_name(*var)), Prec::Atom),
            Expr::Concat(parts) => (self.concat(parts, depth), Prec::Add),
            Expr::Seq { open, close, parts } => (self.seq(open, close, parts, depth), Prec::Add),
            Expr::Join {
                at,
                var,
                over,
                item,
                skip,
            } => {
                let name = var_name(*var);
                let item = match skip {
                    Some(skip) => format!(
                        "{} ? \"\" : {}",
                        self.operand(skip, depth),
                        self.operand(item, depth)
                    ),
                    None => self.expr(item, Prec::Cond, depth),
                };
                let text = match over {
                    JoinOver::Items { from } => {
                        format!("joinItems({}, {from}, ({name}) => {item})", accessor(at))
                    }
                    JoinOver::Keys { exclude } => format!(
                        "joinKeys({}, {}, ({name}) => {item})",
                        accessor(at),
                        known_keys(exclude)
                    ),
                };
                (text, Prec::Atom)
            }
            Expr::Invoke(stmts) => {
                let mut text = String::from("(() => {\n");
                self.stmts(&mut text, stmts, depth + 1);
                for _ in 0..depth {
                    text.push_str(INDENT);
                }
                text.push_str("})()");
                (text, Prec::Atom)
            }
            Expr::Fail(f) => (format!("fail({})", failure(f)), Prec::Atom),
        }
    }

    fn check(&self, check: &Check, at: &Accessor) -> (String, Prec) {
        let v = accessor(at);
        match check {
            Check::String => (format!("typeof {v} === \"string\""), Prec::Eq),
            Check::Number => (format!("Number.isFinite({v})"), Prec::Atom),
            Check::Boolean => (format!("typeof {v} === \"boolean\""), Prec::Eq),
            Check::BigInt => (format!("typeof {v} === \"bigint\""), Prec::Eq),
            Check::Symbol => (format!("typeof {v} === \"symbol\""), Prec::Eq),
            Check::Null => (format!("{v} === null"), Prec::Eq),
            Check::Undefined => (format!("{v} === undefined"), Prec::Eq),
            Check::Date => (format!("isDate({v})"), Prec::Atom),
            Check::RegExp => (format!("{v} instanceof RegExp"), Prec::Eq),
            Check::Object => (format!("isNonPrimitive({v})"), Prec::Atom),
            Check::PlainObject => (format!("isObject({v})"), Prec::Atom),
            Check::Array => (format!("Array.isArray({v})"), Prec::Atom),
            Check::Literal(value) => (format!("{v} === {}", literal(value)), Prec::Eq),
            Check::OneOf(values) => match values.len() {
                0 => ("false".into(), Prec::Atom),
                1 => (format!("{v} === {}", literal(&values[0])), Prec::Eq),
                _ => {
                    let parts: Vec<String> = values
                        .iter()
                        .map(|value| format!("{v} === {}", literal(value)))
                        .collect();
                    (parts.join(" || "), Prec::Or)
                }
            },
            Check::MaxLen(n) => (format!("{v}.length <= {n}"), Prec::Eq),
        }
    }

    /// Concatenation with adjacent string constants merged.
    fn concat(&self, parts: &[Expr], depth: usize) -> String {
        let mut pieces: Vec<String> = Vec::new();
        let mut pending: Option<String> = None;
        let mut flat = Vec::new();
        flatten_concat(parts, &mut flat);
        for part in flat {
            if let Expr::Const(Value::String(s)) = part {
                pending.get_or_insert_with(String::new).push_str(s);
                continue;
            }
            if let Some(s) = pending.take() {
                pieces.push(quote(&s));
            }
            pieces.push(self.expr(part, Prec::Add, depth));
        }
        if let Some(s) = pending.take() {
            pieces.push(quote(&s));
        }
        if pieces.is_empty() {
            return "\"\"".into();
        }
        pieces.join(" + ")
    }

    fn seq(&self, open: &str, close: &str, parts: &[SeqPart], depth: usize) -> String {
        let plain = parts
            .iter()
            .all(|p| p.skip.is_none() && !matches!(p.value, Expr::Join { .. }));
        if plain {
            let mut flat = Vec::with_capacity(parts.len() * 2 + 2);
            flat.push(Expr::str(open));
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    flat.push(Expr::str(","));
                }
                flat.push(part.value.clone());
            }
            flat.push(Expr::str(close));
            return self.concat(&flat, depth);
        }
        let items: Vec<String> = parts
            .iter()
            .map(|part| match &part.skip {
                Some(skip) => format!(
                    "{} ? \"\" : {}",
                    self.operand(skip, depth),
                    self.operand(&part.value, depth)
                ),
                None => self.expr(&part.value, Prec::Cond, depth),
            })
            .collect();
        format!(
            "{} + [{}].filter(Boolean).join(\",\") + {}",
            quote(open),
            items.join(", "),
            quote(close)
        )
    }
}

fn flatten_concat<'e>(parts: &'e [Expr], out: &mut Vec<&'e Expr>) {
    for part in parts {
        match part {
            Expr::Concat(inner) => flatten_concat(inner, out),
            part => out.push(part),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::VarKind;

    #[test]
    fn accessors_use_dots_for_identifiers() {
        let i0 = Accessor::root().next_var(VarKind::Index);
        let at = Accessor::root().key("items").var(i0).key("first-name");
        assert_eq!(accessor(&at), r#"v.items[i0]["first-name"]"#);
        assert_eq!(literal_path(&at), r#"[...pth, "items", i0, "first-name"]"#);
        assert_eq!(literal_path(&Accessor::root()), "[...pth]");
    }

    #[test]
    fn compound_operands_are_parenthesized() {
        let at = Accessor::root();
        let e = Expr::and([
            Expr::is(Check::PlainObject, &at),
            Expr::or([
                Expr::is(Check::Undefined, &at.key("b")),
                Expr::is(Check::Number, &at.key("b")),
            ]),
        ]);
        assert_eq!(
            Renderer.expr(&e, Prec::Cond, 0),
            "isObject(v) && (v.b === undefined || Number.isFinite(v.b))"
        );
    }

    #[test]
    fn if_chains_render_as_else_if() {
        let at = Accessor::root();
        let chain = Stmt::If {
            test: Expr::is(Check::String, &at),
            then: vec![Stmt::Return(Expr::bool(true))],
            otherwise: vec![Stmt::If {
                test: Expr::is(Check::Number, &at),
                then: vec![Stmt::Return(Expr::bool(true))],
                otherwise: vec![Stmt::Throw(Failure::Never)],
            }],
        };
        insta::assert_snapshot!(body(&[chain]), @r#"
        if (typeof v === "string") {
          return true;
        } else if (Number.isFinite(v)) {
          return true;
        } else {
          throw neverError();
        }
        "#);
    }

    #[test]
    fn seq_merges_constant_pieces() {
        let at = Accessor::root();
        let e = Expr::Seq {
            open: "{",
            close: "}",
            parts: vec![SeqPart {
                value: Expr::concat([
                    Expr::str("\"a\":"),
                    Expr::Json(Box::new(Expr::Get(at.key("a")))),
                ]),
                skip: None,
            }],
        };
        assert_eq!(
            Renderer.expr(&e, Prec::Cond, 0),
            r#""{\"a\":" + JSON.stringify(v.a) + "}""#
        );
    }
}
