//! Arrays, tuples, object shapes, unions, intersections and parameter lists.
//!
//! Object-like collections also implement the unknown-key protocol: the
//! declared property names are the known keys, every other own key is
//! unknown. Objects with an index signature accept every key and so never
//! have unknown keys.

use alloc::boxed::Box;
use alloc::format;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use runtype_core::{TypeId, TypeKind};
use runtype_value::{Value, quote};

use crate::code::{
    Accessor, Check, Code, Expr, Failure, JoinOver, KnownKeys, SeqPart, Stmt, VarKind,
};
use crate::compiler::{CompileOp, Compiler, Scope};
use crate::{JitError, Operation};

/// A declared property of an object shape.
struct Prop<'g> {
    member: TypeId,
    name: &'g str,
    optional: bool,
    ty: TypeId,
}

/// An index signature of an object shape.
struct IndexSig {
    numeric: bool,
    ty: TypeId,
}

/// Members of an object shape, split by kind.
struct Shape<'g> {
    props: Vec<Prop<'g>>,
    sigs: Vec<IndexSig>,
}

/// `if (test) { then } else if ... else { otherwise }`, built from the back.
fn if_chain(branches: Vec<(Expr, Vec<Stmt>)>, otherwise: Vec<Stmt>) -> Vec<Stmt> {
    branches
        .into_iter()
        .rev()
        .fold(otherwise, |otherwise, (test, then)| {
            vec![Stmt::If {
                test,
                then,
                otherwise,
            }]
        })
}

fn json_of(at: &Accessor) -> Expr {
    Expr::Json(Box::new(Expr::Get(at.clone())))
}

impl Compiler<'_> {
    pub(crate) fn emit_collection(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        kind: &TypeKind,
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        match kind {
            TypeKind::Array { element } => self.array(cx, scope, *element, op),
            TypeKind::Tuple { members } | TypeKind::Parameters { members } => {
                self.tuple(cx, scope, kind.name(), members, op)
            }
            TypeKind::ObjectLiteral { members, .. } => {
                let shape = self.shape(members);
                self.object(cx, scope, kind.name(), &shape, op)
            }
            TypeKind::Class {
                members,
                deserializable,
                ..
            } => {
                if op == Operation::JsonDecode && !deserializable {
                    return Err(JitError::UnsupportedOperation {
                        op,
                        kind: kind.name(),
                        reason: "instances of this class cannot be rebuilt from JSON",
                    });
                }
                let shape = self.shape(members);
                self.object(cx, scope, kind.name(), &shape, op)
            }
            TypeKind::Union { types } => self.union(cx, scope, types, op),
            TypeKind::Intersection { types } => self.intersection(cx, scope, types, op),
            _ => Err(JitError::InvariantViolation("not a collection kind")),
        }
    }

    fn array(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        element: TypeId,
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        let at = scope.at();
        let var = at.next_var(VarKind::Index);
        let item = at.var(var);
        let is_array = Expr::is(Check::Array, at);

        Ok(Some(match op {
            Operation::IsType => match self.expr_of(cx, scope, element, &item, op)? {
                None => Code::Expr(is_array),
                Some(child) => Code::returning(vec![
                    Stmt::return_if(Expr::not(is_array), false),
                    Stmt::for_each(at, var, 0, vec![Stmt::return_if(Expr::not(child), false)]),
                    Stmt::Return(Expr::bool(true)),
                ]),
            },
            Operation::TypeErrors => {
                let body = self.stmts_of(cx, scope, element, &item, op)?;
                let otherwise = if body.is_empty() {
                    Vec::new()
                } else {
                    vec![Stmt::for_each(at, var, 0, body)]
                };
                Code::stmts(vec![Stmt::If {
                    test: Expr::not(is_array),
                    then: vec![Stmt::push_error(at, "array")],
                    otherwise,
                }])
            }
            Operation::JsonEncode | Operation::JsonDecode => {
                let body = self.stmts_of(cx, scope, element, &item, op)?;
                if body.is_empty() {
                    return Ok(None);
                }
                Code::stmts(vec![Stmt::for_each(at, var, 0, body)])
            }
            Operation::JsonStringify => {
                let child = self
                    .expr_of(cx, scope, element, &item, op)?
                    .unwrap_or_else(|| json_of(&item));
                Code::Expr(Expr::concat([
                    Expr::str("["),
                    Expr::Join {
                        at: at.clone(),
                        var,
                        over: JoinOver::Items { from: 0 },
                        item: Box::new(child),
                        skip: None,
                    },
                    Expr::str("]"),
                ]))
            }
            Operation::HasUnknownKeys => {
                let Some(child) = self.expr_of(cx, scope, element, &item, op)? else {
                    return Ok(None);
                };
                Code::returning(vec![
                    Stmt::if_then(
                        is_array,
                        vec![Stmt::for_each(at, var, 0, vec![Stmt::return_if(child, true)])],
                    ),
                    Stmt::Return(Expr::bool(false)),
                ])
            }
            Operation::UnknownKeyErrors
            | Operation::StripUnknownKeys
            | Operation::UnknownKeysToUndefined => {
                let body = self.stmts_of(cx, scope, element, &item, op)?;
                if body.is_empty() {
                    return Ok(None);
                }
                Code::stmts(vec![Stmt::if_then(
                    is_array,
                    vec![Stmt::for_each(at, var, 0, body)],
                )])
            }
        }))
    }

    /// Tuples and parameter lists.
    fn tuple(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        kind_name: &'static str,
        members: &[TypeId],
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        let at = scope.at();
        let (fixed, rest) = match members.split_last() {
            Some((last, fixed)) if matches!(self.graph.node(*last).kind, TypeKind::Rest { .. }) => {
                (fixed, Some(*last))
            }
            _ => (members, None),
        };
        let len = fixed.len();
        let is_array = Expr::is(Check::Array, at);

        match op {
            Operation::IsType => {
                let mut parts = vec![is_array];
                if rest.is_none() {
                    parts.push(Expr::is(Check::MaxLen(len), at));
                }
                for member in fixed {
                    parts.extend(self.member_expr(cx, scope, *member, op)?);
                }
                let test = Expr::and(parts);
                let rest = match rest {
                    Some(rest) => self.member_stmts(cx, scope, rest, op)?,
                    None => Vec::new(),
                };
                if rest.is_empty() {
                    return Ok(Some(Code::Expr(test)));
                }
                let mut stmts = vec![Stmt::return_if(Expr::not(test), false)];
                stmts.extend(rest);
                stmts.push(Stmt::Return(Expr::bool(true)));
                Ok(Some(Code::returning(stmts)))
            }
            Operation::TypeErrors => {
                let mut body = Vec::new();
                for member in fixed {
                    body.extend(self.member_stmts(cx, scope, *member, op)?);
                }
                match rest {
                    Some(rest) => body.extend(self.member_stmts(cx, scope, rest, op)?),
                    None => {
                        let var = at.next_var(VarKind::Index);
                        body.push(Stmt::for_each(
                            at,
                            var,
                            len,
                            vec![Stmt::push_error(&at.var(var), "never")],
                        ));
                    }
                }
                Ok(Some(Code::stmts(vec![Stmt::If {
                    test: Expr::not(is_array),
                    then: vec![Stmt::push_error(at, kind_name)],
                    otherwise: body,
                }])))
            }
            Operation::JsonStringify => {
                let mut parts = Vec::new();
                for (i, member) in fixed.iter().enumerate() {
                    let item = at.index(i);
                    let value = self
                        .member_expr(cx, scope, *member, op)?
                        .unwrap_or_else(|| json_of(&item));
                    parts.push(if self.is_optional(*member) {
                        SeqPart {
                            value: Expr::cond(Expr::is(Check::Undefined, &item), Expr::str("null"), value),
                            skip: Some(Expr::is(Check::MaxLen(i), at)),
                        }
                    } else {
                        SeqPart { value, skip: None }
                    });
                }
                if let Some(rest) = rest {
                    if let Some(value) = self.member_expr(cx, scope, rest, op)? {
                        parts.push(SeqPart { value, skip: None });
                    }
                }
                Ok(Some(Code::Expr(Expr::Seq {
                    open: "[",
                    close: "]",
                    parts,
                })))
            }
            Operation::HasUnknownKeys => {
                let mut parts = Vec::new();
                for member in fixed {
                    parts.extend(self.member_expr(cx, scope, *member, op)?);
                }
                let rest = match rest {
                    Some(rest) => self.member_stmts(cx, scope, rest, op)?,
                    None => Vec::new(),
                };
                if rest.is_empty() {
                    if parts.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(Code::Expr(Expr::and([is_array, Expr::or(parts)]))));
                }
                let mut stmts = vec![Stmt::return_if(Expr::not(is_array), false)];
                if !parts.is_empty() {
                    stmts.push(Stmt::return_if(Expr::or(parts), true));
                }
                stmts.extend(rest);
                stmts.push(Stmt::Return(Expr::bool(false)));
                Ok(Some(Code::returning(stmts)))
            }
            Operation::JsonEncode
            | Operation::JsonDecode
            | Operation::UnknownKeyErrors
            | Operation::StripUnknownKeys
            | Operation::UnknownKeysToUndefined => {
                let mut body = Vec::new();
                for member in fixed.iter().chain(rest.as_ref()) {
                    body.extend(self.member_stmts(cx, scope, *member, op)?);
                }
                if body.is_empty() {
                    return Ok(None);
                }
                if op.is_unknown_keys() {
                    body = vec![Stmt::if_then(is_array, body)];
                }
                Ok(Some(Code::stmts(body)))
            }
        }
    }

    fn is_optional(&self, member: TypeId) -> bool {
        matches!(
            self.graph.node(member).kind,
            TypeKind::Property { optional: true, .. }
                | TypeKind::TupleMember { optional: true, .. }
                | TypeKind::Parameter { optional: true, .. }
        )
    }

    fn shape<'g>(&'g self, members: &[TypeId]) -> Shape<'g> {
        let mut shape = Shape {
            props: Vec::new(),
            sigs: Vec::new(),
        };
        self.merge_into(&mut shape, members);
        shape
    }

    /// Add `members` to `shape`; a property already declared keeps its first declaration.
    fn merge_into<'g>(&'g self, shape: &mut Shape<'g>, members: &[TypeId]) {
        for member in members {
            match &self.graph.node(*member).kind {
                TypeKind::Property { name, optional, ty } => {
                    if shape.props.iter().all(|p| p.name != name.as_str()) {
                        shape.props.push(Prop {
                            member: *member,
                            name,
                            optional: *optional,
                            ty: *ty,
                        });
                    }
                }
                TypeKind::IndexSignature { key, ty } => shape.sigs.push(IndexSig {
                    numeric: matches!(self.graph.node(*key).kind, TypeKind::Number),
                    ty: *ty,
                }),
                _ => {}
            }
        }
    }

    fn known_keys(&self, cx: &mut CompileOp, shape: &Shape<'_>) -> KnownKeys {
        let keys: Arc<[Arc<str>]> = shape.props.iter().map(|p| Arc::from(p.name)).collect();
        cx.known_keys(keys, self.options.known_keys_set_threshold)
    }

    /// One loop per index signature over the keys not declared as properties.
    ///
    /// `body` turns the value's code into the loop body; signatures whose
    /// value contributes nothing get no loop.
    fn index_loops(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        shape: &Shape<'_>,
        known: &KnownKeys,
        op: Operation,
        mut body: impl FnMut(Code) -> Vec<Stmt>,
    ) -> Result<Vec<Stmt>, JitError> {
        let at = scope.at();
        let var = at.next_var(VarKind::Key);
        let item = at.var(var);
        let mut loops = Vec::new();
        for sig in &shape.sigs {
            let code = if op.is_expression() {
                self.expr_of(cx, scope, sig.ty, &item, op)?.map(Code::Expr)
            } else {
                let stmts = self.stmts_of(cx, scope, sig.ty, &item, op)?;
                (!stmts.is_empty()).then(|| Code::stmts(stmts))
            };
            let Some(code) = code else {
                continue;
            };
            let stmts = body(code);
            let stmts = if sig.numeric {
                vec![Stmt::if_then(Expr::NumericKey(var), stmts)]
            } else {
                stmts
            };
            loops.push(Stmt::ForKeys {
                at: at.clone(),
                var,
                exclude: known.clone(),
                limit: None,
                body: stmts,
            });
        }
        Ok(loops)
    }

    /// Object literals, interfaces, classes and merged intersections.
    fn object(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        kind_name: &'static str,
        shape: &Shape<'_>,
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        let at = scope.at();
        let is_object = Expr::is(Check::PlainObject, at);
        let closed = shape.sigs.is_empty();

        match op {
            Operation::IsType => {
                let mut parts = vec![is_object];
                for prop in &shape.props {
                    parts.extend(self.member_expr(cx, scope, prop.member, op)?);
                }
                let mut loops = Vec::new();
                if !closed {
                    let known = self.known_keys(cx, shape);
                    loops = self.index_loops(cx, scope, shape, &known, op, |code| match code {
                        Code::Expr(child) => vec![Stmt::return_if(Expr::not(child), false)],
                        Code::Block { stmts, .. } => stmts,
                    })?;
                } else if self.options.strict_unknown_keys && !cx.shape_only() {
                    let known = self.known_keys(cx, shape);
                    parts.push(Expr::not(Expr::HasUnknownKeys(at.clone(), known)));
                }
                let test = Expr::and(parts);
                if loops.is_empty() {
                    return Ok(Some(Code::Expr(test)));
                }
                let mut stmts = vec![Stmt::return_if(Expr::not(test), false)];
                stmts.extend(loops);
                stmts.push(Stmt::Return(Expr::bool(true)));
                Ok(Some(Code::returning(stmts)))
            }
            Operation::TypeErrors => {
                let mut body = Vec::new();
                for prop in &shape.props {
                    body.extend(self.member_stmts(cx, scope, prop.member, op)?);
                }
                if !closed {
                    let known = self.known_keys(cx, shape);
                    body.extend(self.index_loops(cx, scope, shape, &known, op, Code::into_stmts)?);
                } else if self.options.strict_unknown_keys {
                    let known = self.known_keys(cx, shape);
                    body.push(self.unknown_keys_loop(at, known, |key| Stmt::push_error(key, "never")));
                }
                Ok(Some(Code::stmts(vec![Stmt::If {
                    test: Expr::not(is_object),
                    then: vec![Stmt::push_error(at, kind_name)],
                    otherwise: body,
                }])))
            }
            Operation::JsonEncode | Operation::JsonDecode => {
                let mut body = Vec::new();
                for prop in &shape.props {
                    body.extend(self.member_stmts(cx, scope, prop.member, op)?);
                }
                if !closed {
                    let known = self.known_keys(cx, shape);
                    body.extend(self.index_loops(cx, scope, shape, &known, op, Code::into_stmts)?);
                }
                Ok((!body.is_empty()).then(|| Code::stmts(body)))
            }
            Operation::JsonStringify => {
                let mut parts = Vec::new();
                for prop in &shape.props {
                    let value_at = at.key(prop.name);
                    let Some(child) = self.expr_of(cx, scope, prop.ty, &value_at, op)? else {
                        continue;
                    };
                    let accepts_anything = matches!(
                        self.graph.node(prop.ty).kind,
                        TypeKind::Any | TypeKind::Unknown
                    );
                    parts.push(SeqPart {
                        value: Expr::concat([Expr::str(format!("{}:", quote(prop.name))), child]),
                        skip: (prop.optional || accepts_anything)
                            .then(|| Expr::is(Check::Undefined, &value_at)),
                    });
                }
                // undeclared keys are written like encode keeps them: each key
                // once, through the signature that covers it if any
                let known = self.known_keys(cx, shape);
                let var = at.next_var(VarKind::Key);
                let item = at.var(var);
                let numeric_sig = shape.sigs.iter().any(|s| s.numeric);
                let string_sig = shape.sigs.iter().any(|s| !s.numeric);
                let join = |child: Expr, skip: Vec<Expr>| SeqPart {
                    value: Expr::Join {
                        at: at.clone(),
                        var,
                        over: JoinOver::Keys {
                            exclude: known.clone(),
                        },
                        item: Box::new(Expr::concat([Expr::JsonKey(var), Expr::str(":"), child])),
                        skip: Some(Box::new(Expr::or(skip))),
                    },
                    skip: None,
                };
                for sig in &shape.sigs {
                    let child = self
                        .expr_of(cx, scope, sig.ty, &item, op)?
                        .unwrap_or_else(|| json_of(&item));
                    let mut skip = vec![Expr::is(Check::Undefined, &item)];
                    if sig.numeric {
                        skip.insert(0, Expr::not(Expr::NumericKey(var)));
                    } else if numeric_sig {
                        skip.insert(0, Expr::NumericKey(var));
                    }
                    parts.push(join(child, skip));
                }
                if !string_sig {
                    let mut skip = vec![
                        Expr::is(Check::Undefined, &item),
                        Expr::is(Check::Symbol, &item),
                    ];
                    if numeric_sig {
                        skip.insert(0, Expr::NumericKey(var));
                    }
                    parts.push(join(json_of(&item), skip));
                }
                Ok(Some(Code::Expr(Expr::Seq {
                    open: "{",
                    close: "}",
                    parts,
                })))
            }
            Operation::HasUnknownKeys => {
                let known = self.known_keys(cx, shape);
                let mut parts = Vec::new();
                if closed {
                    parts.push(Expr::HasUnknownKeys(at.clone(), known.clone()));
                }
                for prop in &shape.props {
                    parts.extend(self.member_expr(cx, scope, prop.member, op)?);
                }
                let loops = self.index_loops(cx, scope, shape, &known, op, |code| match code {
                    Code::Expr(child) => vec![Stmt::return_if(child, true)],
                    Code::Block { stmts, .. } => stmts,
                })?;
                if loops.is_empty() {
                    if parts.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(Code::Expr(Expr::and([is_object, Expr::or(parts)]))));
                }
                let mut stmts = vec![Stmt::return_if(Expr::not(is_object), false)];
                if !parts.is_empty() {
                    stmts.push(Stmt::return_if(Expr::or(parts), true));
                }
                stmts.extend(loops);
                stmts.push(Stmt::Return(Expr::bool(false)));
                Ok(Some(Code::returning(stmts)))
            }
            Operation::UnknownKeyErrors
            | Operation::StripUnknownKeys
            | Operation::UnknownKeysToUndefined => {
                let known = self.known_keys(cx, shape);
                let mut body = Vec::new();
                if closed {
                    body.push(self.unknown_keys_loop(at, known.clone(), |key| match op {
                        Operation::UnknownKeyErrors => Stmt::push_error(key, "never"),
                        Operation::StripUnknownKeys => Stmt::Delete(key.clone()),
                        _ => Stmt::Assign(key.clone(), Expr::Const(Value::Undefined)),
                    }));
                }
                for prop in &shape.props {
                    body.extend(self.member_stmts(cx, scope, prop.member, op)?);
                }
                body.extend(self.index_loops(cx, scope, shape, &known, op, Code::into_stmts)?);
                if body.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Code::stmts(vec![Stmt::if_then(is_object, body)])))
            }
        }
    }

    /// `for (const k of unknownKeys(v, known, limit)) action(v[k])`
    fn unknown_keys_loop(
        &self,
        at: &Accessor,
        known: KnownKeys,
        action: impl FnOnce(&Accessor) -> Stmt,
    ) -> Stmt {
        let var = at.next_var(VarKind::Key);
        Stmt::ForKeys {
            at: at.clone(),
            var,
            exclude: known,
            limit: Some(self.options.max_unknown_keys),
            body: vec![action(&at.var(var))],
        }
    }

    fn union(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        types: &[TypeId],
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        let at = scope.at();
        let members: Arc<[&'static str]> = types
            .iter()
            .map(|t| self.graph.node(*t).kind.name())
            .collect();

        match op {
            Operation::IsType | Operation::TypeErrors => {
                let mut parts = Vec::new();
                for ty in types {
                    match self.expr_of(cx, scope, *ty, at, Operation::IsType)? {
                        Some(test) => parts.push(test),
                        None => return Ok(None),
                    }
                }
                let test = Expr::or(parts);
                Ok(Some(if op == Operation::IsType {
                    Code::Expr(test)
                } else {
                    Code::stmts(vec![Stmt::if_then(
                        Expr::not(test),
                        vec![Stmt::push_error(at, "union")],
                    )])
                }))
            }
            Operation::JsonEncode => {
                let mut branches = Vec::new();
                for (i, ty) in types.iter().enumerate() {
                    let test = self.member_test(cx, scope, *ty, at)?;
                    let mut body = self.stmts_of(cx, scope, *ty, at, op)?;
                    body.push(Stmt::Assign(
                        at.clone(),
                        Expr::Pair(i, Box::new(Expr::Take(at.clone()))),
                    ));
                    branches.push((test, body));
                }
                let mismatch = vec![Stmt::Throw(Failure::UnionMismatch {
                    members,
                    at: at.clone(),
                })];
                Ok(Some(Code::stmts(if_chain(branches, mismatch))))
            }
            Operation::JsonDecode => {
                let tag = at.index(0);
                let inner = at.index(1);
                let mut branches = Vec::new();
                for (i, ty) in types.iter().enumerate() {
                    let test = Expr::is(Check::Literal(Value::Number(i as f64)), &tag);
                    let mut body = self.stmts_of(cx, scope, *ty, &inner, op)?;
                    body.push(Stmt::Assign(at.clone(), Expr::Take(inner.clone())));
                    branches.push((test, body));
                }
                let bad = vec![Stmt::Throw(Failure::UnionDiscriminator {
                    members: types.len(),
                })];
                Ok(Some(Code::stmts(if_chain(branches, bad))))
            }
            Operation::JsonStringify => {
                let mut branches = Vec::new();
                for (i, ty) in types.iter().enumerate() {
                    let test = self.member_test(cx, scope, *ty, at)?;
                    let value = self
                        .expr_of(cx, scope, *ty, at, op)?
                        .unwrap_or_else(|| json_of(at));
                    branches.push((
                        test,
                        Expr::concat([Expr::str(format!("[{i},")), value, Expr::str("]")]),
                    ));
                }
                let mismatch = Expr::Fail(Failure::UnionMismatch {
                    members,
                    at: at.clone(),
                });
                Ok(Some(Code::Expr(
                    branches
                        .into_iter()
                        .rev()
                        .fold(mismatch, |otherwise, (test, then)| Expr::cond(test, then, otherwise)),
                )))
            }
            Operation::HasUnknownKeys => {
                let mut branches = Vec::new();
                for ty in types {
                    let test = self.shape_test(cx, scope, *ty, at)?;
                    let child = self.expr_of(cx, scope, *ty, at, op)?;
                    branches.push((test, child));
                }
                while branches.last().is_some_and(|(_, child)| child.is_none()) {
                    branches.pop();
                }
                if branches.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Code::Expr(branches.into_iter().rev().fold(
                    Expr::bool(false),
                    |otherwise, (test, child)| {
                        Expr::cond(test, child.unwrap_or_else(|| Expr::bool(false)), otherwise)
                    },
                ))))
            }
            Operation::UnknownKeyErrors
            | Operation::StripUnknownKeys
            | Operation::UnknownKeysToUndefined => {
                let mut branches = Vec::new();
                for ty in types {
                    let test = self.shape_test(cx, scope, *ty, at)?;
                    let body = self.stmts_of(cx, scope, *ty, at, op)?;
                    branches.push((test, body));
                }
                while branches.last().is_some_and(|(_, body)| body.is_empty()) {
                    branches.pop();
                }
                if branches.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Code::stmts(if_chain(branches, Vec::new()))))
            }
        }
    }

    /// The `isType` test selecting a union member; members that accept
    /// anything always match.
    fn member_test(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        ty: TypeId,
        at: &Accessor,
    ) -> Result<Expr, JitError> {
        Ok(self
            .expr_of(cx, scope, ty, at, Operation::IsType)?
            .unwrap_or_else(|| Expr::bool(true)))
    }

    /// [`member_test`](Self::member_test) for the unknown-key operations,
    /// which must still select a member when the value has unknown keys.
    fn shape_test(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        ty: TypeId,
        at: &Accessor,
    ) -> Result<Expr, JitError> {
        if !self.options.strict_unknown_keys {
            return self.member_test(cx, scope, ty, at);
        }
        let previous = cx.set_shape_only(true);
        let test = self.member_test(cx, scope, ty, at);
        cx.set_shape_only(previous);
        test
    }

    fn intersection(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        types: &[TypeId],
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        let kinds: Vec<&TypeKind> = types.iter().map(|t| &self.graph.node(*t).kind).collect();
        if !kinds.is_empty() && kinds.iter().all(|k| k.is_object_like()) {
            let mut shape = Shape {
                props: Vec::new(),
                sigs: Vec::new(),
            };
            for kind in &kinds {
                if op == Operation::JsonDecode
                    && matches!(kind, TypeKind::Class { deserializable: false, .. })
                {
                    return Err(JitError::UnsupportedOperation {
                        op,
                        kind: kind.name(),
                        reason: "instances of this class cannot be rebuilt from JSON",
                    });
                }
                self.merge_into(&mut shape, &kind.children());
            }
            return self.object(cx, scope, "intersection", &shape, op);
        }

        let at = scope.at();
        match op {
            Operation::IsType => {
                let mut parts = Vec::new();
                for ty in types {
                    parts.extend(self.expr_of(cx, scope, *ty, at, op)?);
                }
                Ok((!parts.is_empty()).then(|| Code::Expr(Expr::and(parts))))
            }
            Operation::TypeErrors => {
                let mut body = Vec::new();
                for ty in types {
                    body.extend(self.stmts_of(cx, scope, *ty, at, op)?);
                }
                Ok((!body.is_empty()).then(|| Code::stmts(body)))
            }
            _ => match types.first() {
                Some(first) => self.visit(cx, scope, *first, at.clone(), op),
                None => Ok(None),
            },
        }
    }
}
