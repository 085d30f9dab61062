//! Members extend the accessor to their slot, guard optional slots and
//! delegate to their child type.

use alloc::vec;
use alloc::vec::Vec;

use runtype_core::{TypeId, TypeKind};

use crate::code::{Accessor, Check, Code, Expr, JoinOver, Stmt, VarKind};
use crate::compiler::{CompileOp, Compiler, Scope};
use crate::{JitError, Operation};

impl Compiler<'_> {
    pub(crate) fn emit_member(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        kind: &TypeKind,
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        match kind {
            TypeKind::Property { name, optional, ty } => {
                self.slot(cx, scope, *ty, scope.at().key(name), *optional, op)
            }
            TypeKind::TupleMember { optional, ty, .. } | TypeKind::Parameter { optional, ty, .. } => {
                let at = scope.at().index(self.position(scope));
                self.slot(cx, scope, *ty, at, *optional, op)
            }
            TypeKind::Rest { ty } => self.rest(cx, scope, *ty, self.position(scope), op),
            _ => Err(JitError::InvariantViolation(
                "index signatures are emitted by their object",
            )),
        }
    }

    /// Code of a member emitted in expression position.
    pub(crate) fn member_expr(
        &self,
        cx: &mut CompileOp,
        parent: &Scope<'_>,
        member: TypeId,
        op: Operation,
    ) -> Result<Option<Expr>, JitError> {
        match self.visit(cx, parent, member, parent.at().clone(), op)? {
            None => Ok(None),
            Some(Code::Expr(e)) => Ok(Some(e)),
            Some(Code::Block { .. }) => Err(JitError::InvariantViolation(
                "member emitted a block in expression position",
            )),
        }
    }

    /// Code of a member emitted in statement position.
    pub(crate) fn member_stmts(
        &self,
        cx: &mut CompileOp,
        parent: &Scope<'_>,
        member: TypeId,
        op: Operation,
    ) -> Result<Vec<Stmt>, JitError> {
        match self.visit(cx, parent, member, parent.at().clone(), op)? {
            None => Ok(Vec::new()),
            Some(Code::Block { stmts, .. }) => Ok(stmts),
            Some(Code::Expr(_)) => Err(JitError::InvariantViolation(
                "member emitted an expression in statement position",
            )),
        }
    }

    /// Index of the member in `scope` within its parent's member list.
    fn position(&self, scope: &Scope<'_>) -> usize {
        scope
            .parent
            .map(|parent| self.graph.node(parent.node()).kind.children())
            .and_then(|siblings| siblings.iter().position(|s| *s == scope.node()))
            .unwrap_or(0)
    }

    fn slot(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        ty: TypeId,
        at: Accessor,
        optional: bool,
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        let absent = Expr::is(Check::Undefined, &at);
        if op.is_expression() {
            let Some(child) = self.expr_of(cx, scope, ty, &at, op)? else {
                return Ok(None);
            };
            return Ok(Some(Code::Expr(if optional && op == Operation::IsType {
                Expr::or([absent, child])
            } else {
                child
            })));
        }

        let stmts = self.stmts_of(cx, scope, ty, &at, op)?;
        if stmts.is_empty() {
            return Ok(None);
        }
        // the unknown-key operations skip absent values on their own
        if optional && !op.is_unknown_keys() {
            return Ok(Some(Code::stmts(vec![Stmt::if_then(Expr::not(absent), stmts)])));
        }
        Ok(Some(Code::stmts(stmts)))
    }

    /// `...T[]`: every item from position `from` on.
    fn rest(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        element: TypeId,
        from: usize,
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        let at = scope.at();
        let var = at.next_var(VarKind::Index);
        let item = at.var(var);
        match op {
            Operation::IsType | Operation::HasUnknownKeys => {
                let Some(child) = self.expr_of(cx, scope, element, &item, op)? else {
                    return Ok(None);
                };
                // a statement fragment the parent places before its final return
                let body = if op == Operation::IsType {
                    Stmt::return_if(Expr::not(child), false)
                } else {
                    Stmt::return_if(child, true)
                };
                Ok(Some(Code::stmts(vec![Stmt::for_each(at, var, from, vec![body])])))
            }
            Operation::JsonStringify => {
                let child = self
                    .expr_of(cx, scope, element, &item, op)?
                    .unwrap_or_else(|| Expr::Json(alloc::boxed::Box::new(Expr::Get(item.clone()))));
                Ok(Some(Code::Expr(Expr::Join {
                    at: at.clone(),
                    var,
                    over: JoinOver::Items { from },
                    item: alloc::boxed::Box::new(child),
                    skip: None,
                })))
            }
            _ => {
                let body = self.stmts_of(cx, scope, element, &item, op)?;
                if body.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Code::stmts(vec![Stmt::for_each(at, var, from, body)])))
            }
        }
    }
}
