//! Lowers the IR into a tree of closures, the executable form of a
//! compiled function.
//!
//! Each [`Expr`] becomes an [`ExprFn`] and each [`Stmt`] a [`StmtFn`]; both
//! run against a [`Frame`] holding the function's argument, its loop
//! variables and, for the reporting operations, the error sink. Calls to other
//! compiled functions capture the callee's cache entry, which may still be
//! pending while the caller is lowered.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use indexmap::IndexSet;
use runtype_value::{UNDEFINED, Value, format_number, quote, wire};

use crate::cache::{CompiledOperation, JitCache};
use crate::code::{
    Accessor, Check, Conversion, Expr, Failure, JoinOver, KnownKeys, LoopVar, SeqPart, Step, Stmt,
};
use crate::operation::CallMode;
use crate::tracing_macros::trace;
use crate::{JitError, PathItem, RuntimeError, TypeError};

pub(crate) type ExprFn = Box<dyn Fn(&mut Frame<'_>) -> Result<Value, RuntimeError> + Send + Sync>;
pub(crate) type StmtFn = Box<dyn Fn(&mut Frame<'_>) -> Result<Flow, RuntimeError> + Send + Sync>;

/// The value a loop variable is bound to.
#[derive(Debug, Clone)]
pub(crate) enum LoopValue {
    Index(usize),
    Key(String),
}

/// The argument of a running function.
pub(crate) enum Target<'a> {
    Shared(&'a Value),
    Exclusive(&'a mut Value),
}

impl Target<'_> {
    fn get(&self) -> &Value {
        match self {
            Target::Shared(v) => v,
            Target::Exclusive(v) => v,
        }
    }

    fn get_mut(&mut self) -> Option<&mut Value> {
        match self {
            Target::Shared(_) => None,
            Target::Exclusive(v) => Some(v),
        }
    }
}

/// State of one running function.
pub(crate) struct Frame<'a> {
    pub target: Target<'a>,
    pub vars: Vec<LoopValue>,
    pub errors: Option<&'a mut Vec<TypeError>>,
    pub path: &'a [PathItem],
}

impl<'a> Frame<'a> {
    pub fn shared(value: &'a Value) -> Self {
        Self {
            target: Target::Shared(value),
            vars: Vec::new(),
            errors: None,
            path: &[],
        }
    }

    pub fn exclusive(value: &'a mut Value) -> Self {
        Self {
            target: Target::Exclusive(value),
            vars: Vec::new(),
            errors: None,
            path: &[],
        }
    }

    pub fn reporting(value: &'a Value, errors: &'a mut Vec<TypeError>, path: &'a [PathItem]) -> Self {
        Self {
            target: Target::Shared(value),
            vars: Vec::new(),
            errors: Some(errors),
            path,
        }
    }

    fn bind(&mut self, var: LoopVar, value: LoopValue) {
        self.vars.truncate(var.slot);
        self.vars.push(value);
    }
}

/// Outcome of a statement.
pub(crate) enum Flow {
    Next,
    Return(Value),
}

/// An executable function body.
pub(crate) struct Lowered {
    body: Vec<StmtFn>,
}

impl Lowered {
    pub fn run(&self, frame: &mut Frame<'_>) -> Result<Value, RuntimeError> {
        match run_block(&self.body, frame)? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::Undefined),
        }
    }
}

fn run_block(stmts: &[StmtFn], frame: &mut Frame<'_>) -> Result<Flow, RuntimeError> {
    for stmt in stmts {
        if let Flow::Return(value) = stmt(frame)? {
            return Ok(Flow::Return(value));
        }
    }
    Ok(Flow::Next)
}

// === value access ===

fn resolve<'v>(root: &'v Value, vars: &[LoopValue], at: &Accessor) -> &'v Value {
    let mut cur = root;
    for step in at.steps() {
        cur = match step {
            Step::Key(key) => cur.get(key),
            Step::Index(i) => cur.get_index(*i),
            Step::Var(var) => match vars.get(var.slot) {
                Some(LoopValue::Index(i)) => cur.get_index(*i),
                Some(LoopValue::Key(key)) => cur.get(key),
                None => &UNDEFINED,
            },
        };
    }
    cur
}

fn resolve_mut<'v>(root: &'v mut Value, vars: &[LoopValue], at: &Accessor) -> Option<&'v mut Value> {
    let mut cur = root;
    for step in at.steps() {
        cur = match step {
            Step::Key(key) => cur.get_mut(key)?,
            Step::Index(i) => cur.get_index_mut(*i)?,
            Step::Var(var) => match vars.get(var.slot)? {
                LoopValue::Index(i) => cur.get_index_mut(*i)?,
                LoopValue::Key(key) => cur.get_mut(key)?,
            },
        };
    }
    Some(cur)
}

fn read<'f>(frame: &'f Frame<'_>, at: &Accessor) -> &'f Value {
    resolve(frame.target.get(), &frame.vars, at)
}

/// Move the value at `at` out of an exclusive target, or copy it from a shared one.
fn take(frame: &mut Frame<'_>, at: &Accessor) -> Value {
    let Frame { target, vars, .. } = frame;
    match target.get_mut() {
        Some(root) => resolve_mut(root, vars, at).map(Value::take).unwrap_or_default(),
        None => resolve(target.get(), vars, at).clone(),
    }
}

/// Store `value` at `at`. Writing `undefined` to an absent key is a no-op.
fn assign(frame: &mut Frame<'_>, at: &Accessor, value: Value) {
    let Frame { target, vars, .. } = frame;
    let Some(root) = target.get_mut() else {
        return;
    };
    let Some((parent, last)) = at.split_last() else {
        *root = value;
        return;
    };
    let Some(parent) = resolve_mut(root, vars, &parent) else {
        return;
    };
    let key = match last {
        Step::Key(key) => PathKey::Key(key.as_ref()),
        Step::Index(i) => PathKey::Index(*i),
        Step::Var(var) => match vars.get(var.slot) {
            Some(LoopValue::Index(i)) => PathKey::Index(*i),
            Some(LoopValue::Key(key)) => PathKey::Key(key.as_str()),
            None => return,
        },
    };
    match (parent, key) {
        (Value::Object(map), PathKey::Key(key)) => {
            if let Some(slot) = map.get_mut(key) {
                *slot = value;
            } else if !value.is_undefined() {
                map.insert(key.to_string(), value);
            }
        }
        (Value::Array(items), PathKey::Index(i)) => {
            if let Some(slot) = items.get_mut(i) {
                *slot = value;
            } else if i == items.len() && !value.is_undefined() {
                items.push(value);
            }
        }
        _ => {}
    }
}

enum PathKey<'k> {
    Key(&'k str),
    Index(usize),
}

fn delete(frame: &mut Frame<'_>, at: &Accessor) {
    let Frame { target, vars, .. } = frame;
    let Some(root) = target.get_mut() else {
        return;
    };
    let Some((parent, last)) = at.split_last() else {
        return;
    };
    let key = match last {
        Step::Key(key) => key.to_string(),
        Step::Var(var) => match vars.get(var.slot) {
            Some(LoopValue::Key(key)) => key.clone(),
            _ => return,
        },
        Step::Index(_) => return,
    };
    if let Some(map) = resolve_mut(root, vars, &parent).and_then(Value::as_object_mut) {
        map.shift_remove(&key);
    }
}

fn path_of(base: &[PathItem], vars: &[LoopValue], at: &Accessor) -> Vec<PathItem> {
    let mut path = base.to_vec();
    for step in at.steps() {
        path.push(match step {
            Step::Key(key) => PathItem::Key(key.to_string()),
            Step::Index(i) => PathItem::Index(*i),
            Step::Var(var) => match vars.get(var.slot) {
                Some(LoopValue::Index(i)) => PathItem::Index(*i),
                Some(LoopValue::Key(key)) => PathItem::Key(key.clone()),
                None => PathItem::Key(String::new()),
            },
        });
    }
    path
}

// === runtime helpers ===

fn truthy(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::BigInt(i) => *i != 0,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn check(check: &Check, value: &Value) -> bool {
    match check {
        Check::String => matches!(value, Value::String(_)),
        Check::Number => value.is_finite_number(),
        Check::Boolean => matches!(value, Value::Bool(_)),
        Check::BigInt => matches!(value, Value::BigInt(_)),
        Check::Symbol => matches!(value, Value::Symbol(_)),
        Check::Null => value.is_null(),
        Check::Undefined => value.is_undefined(),
        Check::Date => value.is_valid_date(),
        Check::RegExp => matches!(value, Value::RegExp { .. }),
        Check::Object => value.is_object(),
        Check::PlainObject => matches!(value, Value::Object(_)),
        Check::Array => matches!(value, Value::Array(_)),
        Check::Literal(expected) => value == expected,
        Check::OneOf(values) => values.iter().any(|v| v == value),
        Check::MaxLen(n) => value.as_array().is_some_and(|items| items.len() <= *n),
    }
}

fn is_numeric_key(key: &str) -> bool {
    !key.is_empty() && key.trim() == key && key.parse::<f64>().is_ok_and(f64::is_finite)
}

/// JSON text of one value, following `JSON.stringify` for the scalar cases.
fn json_text(value: &Value) -> Result<String, RuntimeError> {
    Ok(match value {
        Value::String(s) => quote(s),
        Value::Number(n) => format_number(*n).unwrap_or_else(|| "null".into()),
        Value::Bool(b) => b.to_string(),
        Value::Undefined | Value::Null | Value::Symbol(_) => "null".into(),
        other => other.to_json_string()?,
    })
}

fn text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => format_number(n).unwrap_or_else(|| "NaN".into()),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".into(),
        _ => String::new(),
    }
}

fn convert(conversion: Conversion, value: Value) -> Result<Value, RuntimeError> {
    let invalid = |expected: &'static str, value: &Value| RuntimeError::InvalidWireValue {
        expected,
        actual: value.type_name(),
    };
    Ok(match (conversion, value) {
        (Conversion::BigIntToString, Value::BigInt(i)) => Value::String(wire::bigint_to_wire(i)),
        (Conversion::DateToIso, Value::Date(ms)) => {
            wire::date_to_iso(ms).map_or(Value::Null, Value::String)
        }
        (Conversion::RegExpToString, Value::RegExp { source, flags }) => {
            Value::String(wire::regexp_to_wire(&source, &flags))
        }
        (Conversion::SymbolToString, Value::Symbol(desc)) => {
            Value::String(wire::symbol_to_wire(desc.as_deref()))
        }
        (
            Conversion::BigIntToString
            | Conversion::DateToIso
            | Conversion::RegExpToString
            | Conversion::SymbolToString,
            other,
        ) => other,
        (Conversion::StringToBigInt, value) => match value.as_str().and_then(wire::bigint_from_wire) {
            Some(i) => Value::BigInt(i),
            None => return Err(invalid("bigint", &value)),
        },
        (Conversion::IsoToDate, value) => match value.as_str().and_then(wire::date_from_iso) {
            Some(ms) => Value::Date(ms),
            None => return Err(invalid("date", &value)),
        },
        (Conversion::StringToRegExp, value) => match value.as_str().and_then(wire::regexp_from_wire) {
            Some((source, flags)) => Value::RegExp { source, flags },
            None => return Err(invalid("regexp", &value)),
        },
        (Conversion::StringToSymbol, value) => match value.as_str().and_then(wire::symbol_from_wire) {
            Some(desc) => Value::Symbol(desc),
            None => return Err(invalid("symbol", &value)),
        },
    })
}

fn failure(f: &Failure, frame: &Frame<'_>) -> RuntimeError {
    match f {
        Failure::Never => RuntimeError::Never,
        Failure::UnionMismatch { members, at } => RuntimeError::UnionMismatch {
            members: members.clone(),
            actual: read(frame, at).type_name(),
        },
        Failure::UnionDiscriminator { members } => {
            RuntimeError::UnionDiscriminator { members: *members }
        }
    }
}

/// Membership test for the declared keys of an object shape.
#[derive(Clone)]
enum KeyFilter {
    Scan(Arc<[Arc<str>]>),
    Set(Arc<IndexSet<Arc<str>>>),
}

impl KeyFilter {
    fn contains(&self, key: &str) -> bool {
        match self {
            KeyFilter::Scan(keys) => keys.iter().any(|k| k.as_ref() == key),
            KeyFilter::Set(set) => set.contains(key),
        }
    }

    /// Own keys of `value` that are not declared. With a `limit` the scan
    /// stops at `limit + 1` keys, enough to tell that the limit is exceeded.
    fn unknown_keys(&self, value: &Value, limit: Option<usize>) -> Vec<String> {
        let Some(map) = value.as_object() else {
            return Vec::new();
        };
        let unknown = map.keys().filter(|key| !self.contains(key)).cloned();
        match limit {
            Some(limit) => unknown.take(limit.saturating_add(1)).collect(),
            None => unknown.collect(),
        }
    }
}

fn bound_key(frame: &Frame<'_>, var: LoopVar) -> String {
    match frame.vars.get(var.slot) {
        Some(LoopValue::Key(key)) => key.clone(),
        Some(LoopValue::Index(i)) => i.to_string(),
        None => String::new(),
    }
}

/// Lowers one function body, resolving callees through the cache.
pub(crate) struct Lowerer<'c> {
    cache: &'c JitCache,
    sets: Vec<Option<Arc<IndexSet<Arc<str>>>>>,
}

impl<'c> Lowerer<'c> {
    pub fn new(cache: &'c JitCache) -> Self {
        Self {
            cache,
            sets: Vec::new(),
        }
    }

    pub fn function(&mut self, body: &[Stmt]) -> Result<Lowered, JitError> {
        Ok(Lowered {
            body: self.block(body)?,
        })
    }

    fn block(&mut self, stmts: &[Stmt]) -> Result<Vec<StmtFn>, JitError> {
        stmts.iter().map(|s| self.stmt(s)).collect()
    }

    fn filter(&mut self, keys: &KnownKeys) -> KeyFilter {
        match keys {
            KnownKeys::Inline(keys) => KeyFilter::Scan(keys.clone()),
            KnownKeys::Hoisted { slot, keys } => {
                if self.sets.len() <= *slot {
                    self.sets.resize(*slot + 1, None);
                }
                let set = self.sets[*slot]
                    .get_or_insert_with(|| Arc::new(keys.iter().cloned().collect()))
                    .clone();
                KeyFilter::Set(set)
            }
        }
    }

    fn callee(&self, hash: crate::FnHash) -> Result<Arc<CompiledOperation>, JitError> {
        self.cache
            .get(hash)
            .ok_or(JitError::InvariantViolation("call to a function missing from the cache"))
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<StmtFn, JitError> {
        Ok(match stmt {
            Stmt::Expr(e) => {
                let e = self.expr(e)?;
                Box::new(move |f| {
                    e(f)?;
                    Ok(Flow::Next)
                })
            }
            Stmt::Return(e) => {
                let e = self.expr(e)?;
                Box::new(move |f| Ok(Flow::Return(e(f)?)))
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                let test = self.expr(test)?;
                let then = self.block(then)?;
                let otherwise = self.block(otherwise)?;
                Box::new(move |f| {
                    if truthy(&test(f)?) {
                        run_block(&then, f)
                    } else {
                        run_block(&otherwise, f)
                    }
                })
            }
            Stmt::ForEach {
                at,
                var,
                from,
                body,
            } => {
                let (at, var, from) = (at.clone(), *var, *from);
                let body = self.block(body)?;
                Box::new(move |f| {
                    let mut i = from;
                    while i < read(f, &at).as_array().map_or(0, <[Value]>::len) {
                        f.bind(var, LoopValue::Index(i));
                        if let Flow::Return(value) = run_block(&body, f)? {
                            return Ok(Flow::Return(value));
                        }
                        i += 1;
                    }
                    Ok(Flow::Next)
                })
            }
            Stmt::ForKeys {
                at,
                var,
                exclude,
                limit,
                body,
            } => {
                let (at, var, limit) = (at.clone(), *var, *limit);
                let exclude = self.filter(exclude);
                let body = self.block(body)?;
                Box::new(move |f| {
                    let keys = exclude.unknown_keys(read(f, &at), limit);
                    if let Some(limit) = limit {
                        if keys.len() > limit {
                            trace!(limit, "unknown key limit exceeded");
                            return Err(RuntimeError::TooManyUnknownKeys { limit });
                        }
                    }
                    for key in keys {
                        f.bind(var, LoopValue::Key(key));
                        if let Flow::Return(value) = run_block(&body, f)? {
                            return Ok(Flow::Return(value));
                        }
                    }
                    Ok(Flow::Next)
                })
            }
            Stmt::PushError { at, expected } => {
                let (at, expected) = (at.clone(), expected.clone());
                Box::new(move |f| {
                    let Frame {
                        vars, errors, path, ..
                    } = f;
                    if let Some(errors) = errors.as_deref_mut() {
                        errors.push(TypeError {
                            path: path_of(path, vars, &at),
                            expected: expected.to_string(),
                        });
                    }
                    Ok(Flow::Next)
                })
            }
            Stmt::Assign(at, e) => {
                let at = at.clone();
                let e = self.expr(e)?;
                Box::new(move |f| {
                    let value = e(f)?;
                    assign(f, &at, value);
                    Ok(Flow::Next)
                })
            }
            Stmt::Delete(at) => {
                let at = at.clone();
                Box::new(move |f| {
                    delete(f, &at);
                    Ok(Flow::Next)
                })
            }
            Stmt::Throw(failure_kind) => {
                let failure_kind = failure_kind.clone();
                Box::new(move |f| Err(failure(&failure_kind, f)))
            }
        })
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Result<Vec<ExprFn>, JitError> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn expr(&mut self, e: &Expr) -> Result<ExprFn, JitError> {
        Ok(match e {
            Expr::Const(value) => {
                let value = value.clone();
                Box::new(move |_| Ok(value.clone()))
            }
            Expr::Is(kind, at) => {
                let (kind, at) = (kind.clone(), at.clone());
                Box::new(move |f| Ok(Value::Bool(check(&kind, read(f, &at)))))
            }
            Expr::NumericKey(var) => {
                let var = *var;
                Box::new(move |f| Ok(Value::Bool(is_numeric_key(&bound_key(f, var)))))
            }
            Expr::Not(inner) => {
                let inner = self.expr(inner)?;
                Box::new(move |f| Ok(Value::Bool(!truthy(&inner(f)?))))
            }
            Expr::And(parts) => {
                let parts = self.exprs(parts)?;
                Box::new(move |f| {
                    for part in &parts {
                        if !truthy(&part(f)?) {
                            return Ok(Value::Bool(false));
                        }
                    }
                    Ok(Value::Bool(true))
                })
            }
            Expr::Or(parts) => {
                let parts = self.exprs(parts)?;
                Box::new(move |f| {
                    for part in &parts {
                        if truthy(&part(f)?) {
                            return Ok(Value::Bool(true));
                        }
                    }
                    Ok(Value::Bool(false))
                })
            }
            Expr::Cond(test, then, otherwise) => {
                let test = self.expr(test)?;
                let then = self.expr(then)?;
                let otherwise = self.expr(otherwise)?;
                Box::new(move |f| {
                    if truthy(&test(f)?) {
                        then(f)
                    } else {
                        otherwise(f)
                    }
                })
            }
            Expr::Get(at) => {
                let at = at.clone();
                Box::new(move |f| Ok(read(f, &at).clone()))
            }
            Expr::Take(at) => {
                let at = at.clone();
                Box::new(move |f| Ok(take(f, &at)))
            }
            Expr::Convert(conversion, at) => {
                let (conversion, at) = (*conversion, at.clone());
                Box::new(move |f| convert(conversion, take(f, &at)))
            }
            Expr::Pair(index, inner) => {
                let index = *index as f64;
                let inner = self.expr(inner)?;
                Box::new(move |f| Ok(Value::Array(alloc::vec![Value::Number(index), inner(f)?])))
            }
            Expr::Call { hash, op, at } => self.call(*hash, op.call_mode(), at.clone())?,
            Expr::HasUnknownKeys(at, keys) => {
                let at = at.clone();
                let keys = self.filter(keys);
                Box::new(move |f| {
                    let found = read(f, &at)
                        .as_object()
                        .is_some_and(|map| map.keys().any(|key| !keys.contains(key)));
                    Ok(Value::Bool(found))
                })
            }
            Expr::Json(inner) => match inner.as_ref() {
                Expr::Get(at) => {
                    let at = at.clone();
                    Box::new(move |f| Ok(Value::String(json_text(read(f, &at))?)))
                }
                inner => {
                    let inner = self.expr(inner)?;
                    Box::new(move |f| Ok(Value::String(json_text(&inner(f)?)?)))
                }
            },
            Expr::JsonKey(var) => {
                let var = *var;
                Box::new(move |f| Ok(Value::String(quote(&bound_key(f, var)))))
            }
            Expr::Concat(parts) => {
                let parts = self.exprs(parts)?;
                Box::new(move |f| {
                    let mut out = String::new();
                    for part in &parts {
                        out.push_str(&text(part(f)?));
                    }
                    Ok(Value::String(out))
                })
            }
            Expr::Seq { open, close, parts } => self.seq(open, close, parts)?,
            Expr::Join {
                at,
                var,
                over,
                item,
                skip,
            } => {
                let (at, var) = (at.clone(), *var);
                let item = self.expr(item)?;
                let skip = skip.as_deref().map(|s| self.expr(s)).transpose()?;
                let over = match over {
                    JoinOver::Items { from } => Ok(*from),
                    JoinOver::Keys { exclude } => Err(self.filter(exclude)),
                };
                Box::new(move |f| {
                    let bindings: Vec<LoopValue> = match &over {
                        Ok(from) => {
                            let len = read(f, &at).as_array().map_or(0, <[Value]>::len);
                            (*from..len).map(LoopValue::Index).collect()
                        }
                        Err(exclude) => exclude
                            .unknown_keys(read(f, &at), None)
                            .into_iter()
                            .map(LoopValue::Key)
                            .collect(),
                    };
                    let mut out = String::new();
                    for binding in bindings {
                        f.bind(var, binding);
                        if let Some(skip) = &skip {
                            if truthy(&skip(f)?) {
                                continue;
                            }
                        }
                        let piece = text(item(f)?);
                        if piece.is_empty() {
                            continue;
                        }
                        if !out.is_empty() {
                            out.push(',');
                        }
                        out.push_str(&piece);
                    }
                    Ok(Value::String(out))
                })
            }
            Expr::Invoke(stmts) => {
                let body = self.block(stmts)?;
                Box::new(move |f| match run_block(&body, f)? {
                    Flow::Return(value) => Ok(value),
                    Flow::Next => Ok(Value::Undefined),
                })
            }
            Expr::Fail(failure_kind) => {
                let failure_kind = failure_kind.clone();
                Box::new(move |f| Err(failure(&failure_kind, f)))
            }
        })
    }

    fn seq(
        &mut self,
        open: &'static str,
        close: &'static str,
        parts: &[SeqPart],
    ) -> Result<ExprFn, JitError> {
        let parts = parts
            .iter()
            .map(|part| {
                Ok((
                    self.expr(&part.value)?,
                    part.skip.as_ref().map(|s| self.expr(s)).transpose()?,
                ))
            })
            .collect::<Result<Vec<_>, JitError>>()?;
        Ok(Box::new(move |f| {
            let mut out = String::from(open);
            let mut first = true;
            for (value, skip) in &parts {
                if let Some(skip) = skip {
                    if truthy(&skip(f)?) {
                        continue;
                    }
                }
                let piece = text(value(f)?);
                if piece.is_empty() {
                    continue;
                }
                if !first {
                    out.push(',');
                }
                first = false;
                out.push_str(&piece);
            }
            out.push_str(close);
            Ok(Value::String(out))
        }))
    }

    fn call(&self, hash: crate::FnHash, mode: CallMode, at: Accessor) -> Result<ExprFn, JitError> {
        let callee = self.callee(hash)?;
        Ok(match mode {
            CallMode::Read => Box::new(move |f| {
                let value = read(f, &at);
                callee.lowered()?.run(&mut Frame::shared(value))
            }),
            CallMode::Report => Box::new(move |f| {
                let Frame {
                    target,
                    vars,
                    errors,
                    path,
                } = f;
                let value = resolve(target.get(), vars, &at);
                let child_path = path_of(path, vars, &at);
                let mut child = Frame {
                    target: Target::Shared(value),
                    vars: Vec::new(),
                    errors: errors.as_deref_mut(),
                    path: &child_path,
                };
                callee.lowered()?.run(&mut child)?;
                Ok(Value::Undefined)
            }),
            CallMode::Transform => Box::new(move |f| {
                let mut value = take(f, &at);
                callee.lowered()?.run(&mut Frame::exclusive(&mut value))
            }),
            CallMode::Mutate => Box::new(move |f| {
                let Frame { target, vars, .. } = f;
                if let Some(slot) = target
                    .get_mut()
                    .and_then(|root| resolve_mut(root, vars, &at))
                {
                    callee.lowered()?.run(&mut Frame::exclusive(slot))?;
                }
                Ok(Value::Undefined)
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::VarKind;
    use runtype_value::value;

    fn lowered(stmts: &[Stmt]) -> Lowered {
        let cache = JitCache::new();
        Lowerer::new(&cache).function(stmts).unwrap()
    }

    #[test]
    fn loops_bind_nested_variables() {
        let at = Accessor::root();
        let i0 = at.next_var(VarKind::Index);
        let item = at.var(i0);
        let body = [
            Stmt::ForEach {
                at: at.clone(),
                var: i0,
                from: 0,
                body: vec![Stmt::if_then(
                    Expr::not(Expr::is(Check::Number, &item)),
                    vec![Stmt::PushError {
                        at: item.clone(),
                        expected: "number".into(),
                    }],
                )],
            },
        ];
        let f = lowered(&body);
        let v = value!([1, "x", 3, null]);
        let mut errors = Vec::new();
        let base = [PathItem::Key("list".into())];
        f.run(&mut Frame::reporting(&v, &mut errors, &base)).unwrap();
        assert_eq!(
            errors,
            vec![
                TypeError::new([PathItem::from("list"), PathItem::from(1)], "number"),
                TypeError::new([PathItem::from("list"), PathItem::from(3)], "number"),
            ]
        );
    }

    #[test]
    fn assign_and_delete_edit_in_place() {
        let at = Accessor::root();
        let body = [
            Stmt::Assign(at.key("a"), Expr::Convert(Conversion::StringToBigInt, at.key("a"))),
            Stmt::Delete(at.key("b")),
            Stmt::Assign(at.key("c"), Expr::Const(Value::Undefined)),
            Stmt::Return(Expr::Take(at)),
        ];
        let f = lowered(&body);
        let mut v = value!({"a": "12", "b": true});
        let out = f.run(&mut Frame::exclusive(&mut v)).unwrap();
        assert_eq!(out.get("a"), &Value::BigInt(12));
        assert_eq!(out.as_object().map(|m| m.len()), Some(1));
    }

    #[test]
    fn unknown_key_limit_is_enforced() {
        let at = Accessor::root();
        let k0 = at.next_var(VarKind::Key);
        let body = [Stmt::ForKeys {
            at: at.clone(),
            var: k0,
            exclude: KnownKeys::Inline(Arc::from(vec![Arc::<str>::from("a")])),
            limit: Some(1),
            body: vec![Stmt::Delete(at.var(k0))],
        }];
        let f = lowered(&body);
        let mut ok = value!({"a": 1, "b": 2});
        f.run(&mut Frame::exclusive(&mut ok)).unwrap();
        assert_eq!(ok, value!({"a": 1}));
        let mut too_many = value!({"a": 1, "b": 2, "c": 3});
        assert_eq!(
            f.run(&mut Frame::exclusive(&mut too_many)).err(),
            Some(RuntimeError::TooManyUnknownKeys { limit: 1 })
        );
    }

    #[test]
    fn unknown_key_scan_stops_past_the_limit() {
        let filter = KeyFilter::Scan(Arc::from(vec![Arc::<str>::from("a")]));
        let mut map = runtype_value::Map::new();
        map.insert("a".into(), Value::Null);
        for i in 0..10_000 {
            map.insert(format!("k{i}"), Value::Null);
        }
        let v = Value::Object(map);
        assert_eq!(filter.unknown_keys(&v, Some(3)), ["k0", "k1", "k2", "k3"]);
        assert_eq!(filter.unknown_keys(&v, None).len(), 10_000);
        assert!(filter.unknown_keys(&Value::Null, Some(3)).is_empty());
    }

    #[test]
    fn seq_skips_empty_and_skipped_parts() {
        let at = Accessor::root();
        let i0 = at.next_var(VarKind::Index);
        let e = Expr::Seq {
            open: "[",
            close: "]",
            parts: vec![
                SeqPart {
                    value: Expr::str("1"),
                    skip: None,
                },
                SeqPart {
                    value: Expr::str("2"),
                    skip: Some(Expr::bool(true)),
                },
                SeqPart {
                    value: Expr::Join {
                        at: at.clone(),
                        var: i0,
                        over: JoinOver::Items { from: 5 },
                        item: Box::new(Expr::Json(Box::new(Expr::Get(at.var(i0))))),
                        skip: None,
                    },
                    skip: None,
                },
            ],
        };
        let f = lowered(&[Stmt::Return(e)]);
        let v = value!([1]);
        assert_eq!(f.run(&mut Frame::shared(&v)).unwrap(), Value::from("[1]"));
    }

    #[test]
    fn numeric_keys() {
        assert!(is_numeric_key("12"));
        assert!(is_numeric_key("-1.5"));
        assert!(!is_numeric_key("abc"));
        assert!(!is_numeric_key(""));
        assert!(!is_numeric_key(" 1"));
    }
}
