//! The compiler engine: walks run types and assembles cached functions.
//!
//! A request for (operation, root) either hits the cache or inserts a pending
//! entry and visits the root. Each child is then inlined into the caller or
//! factored into its own cached function:
//!
//! - atomic nodes are always inlined
//! - circular nodes are always factored, which is what makes recursion finite
//! - named interfaces and classes are factored unless they are the root
//! - a returning block needed in expression position is factored when
//!   [`JitOptions::factor_return_blocks`] is set, and wrapped in an invoked
//!   block otherwise
//!
//! Union members selected by the unknown-key operations are tested by shape
//! only: under strict unknown keys their `isType` test skips the unknown-key
//! clause, and factored tests of that kind are cached apart from the strict
//! ones.
//!
//! Scopes are immutable values linked to their parent, so every push has a
//! matching pop by construction and the scope chain always mirrors the
//! nesting of the generated code.

use alloc::format;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use runtype_core::{TypeGraph, TypeId, TypeKind};

use crate::cache::{CompiledBody, CompiledOperation, JitCache};
use crate::code::{Accessor, Code, Expr, KnownKeys, Stmt};
use crate::lower::Lowerer;
use crate::operation::CallMode;
use crate::render;
use crate::runtype::{RunTypeFamily, RunTypes};
use crate::tracing_macros::{debug, trace};
use crate::{FnHash, JitError, JitOptions, Operation};

/// One frame of the traversal.
#[derive(Debug)]
pub(crate) struct StackItem {
    pub node: TypeId,
    /// Where the node's value sits relative to the function argument.
    pub at: Accessor,
}

/// The traversal stack as a linked list of frames.
#[derive(Debug)]
pub(crate) struct Scope<'s> {
    pub parent: Option<&'s Scope<'s>>,
    pub item: StackItem,
}

impl Scope<'static> {
    pub fn root(node: TypeId) -> Self {
        Scope {
            parent: None,
            item: StackItem {
                node,
                at: Accessor::root(),
            },
        }
    }
}

impl Scope<'_> {
    pub fn child(&self, node: TypeId, at: Accessor) -> Scope<'_> {
        Scope {
            parent: Some(self),
            item: StackItem { node, at },
        }
    }

    pub fn node(&self) -> TypeId {
        self.item.node
    }

    pub fn at(&self) -> &Accessor {
        &self.item.at
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn depth(&self) -> usize {
        self.parent.map_or(0, |p| p.depth() + 1)
    }

    /// Whether `node` is this frame or one of its ancestors.
    pub fn contains(&self, node: TypeId) -> bool {
        self.item.node == node || self.parent.is_some_and(|p| p.contains(node))
    }
}

/// State of one function being compiled.
pub(crate) struct CompileOp {
    /// Known-key sets hoisted into the context code.
    context: Vec<Arc<[Arc<str>]>>,
    /// Called functions, in first-call order.
    callees: Vec<Arc<CompiledOperation>>,
    /// Object tests ignore unknown keys even in strict mode.
    shape_only: bool,
}

/// Emission state to roll back to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mark {
    context: usize,
    callees: usize,
}

impl CompileOp {
    fn new(shape_only: bool) -> Self {
        Self {
            context: Vec::new(),
            callees: Vec::new(),
            shape_only,
        }
    }

    pub fn shape_only(&self) -> bool {
        self.shape_only
    }

    /// Switch shape-only testing, returning the previous setting.
    pub fn set_shape_only(&mut self, shape_only: bool) -> bool {
        core::mem::replace(&mut self.shape_only, shape_only)
    }

    fn mark(&self) -> Mark {
        Mark {
            context: self.context.len(),
            callees: self.callees.len(),
        }
    }

    fn rollback(&mut self, mark: Mark) {
        self.context.truncate(mark.context);
        self.callees.truncate(mark.callees);
    }

    fn depend(&mut self, callee: Arc<CompiledOperation>) {
        if !self.callees.iter().any(|c| c.hash() == callee.hash()) {
            self.callees.push(callee);
        }
    }

    /// Known keys of an object shape; long lists become a hoisted set.
    pub fn known_keys(&mut self, keys: Arc<[Arc<str>]>, threshold: usize) -> KnownKeys {
        if keys.len() <= threshold {
            return KnownKeys::Inline(keys);
        }
        let slot = match self.context.iter().position(|k| *k == keys) {
            Some(slot) => slot,
            None => {
                self.context.push(keys.clone());
                self.context.len() - 1
            }
        };
        KnownKeys::Hoisted { slot, keys }
    }
}

/// Compiles functions for one request.
pub(crate) struct Compiler<'r> {
    pub graph: &'r TypeGraph,
    pub types: &'r RunTypes,
    pub cache: &'r JitCache,
    pub options: &'r JitOptions,
    /// Entries inserted by this request, removed again if it fails.
    journal: RefCell<Vec<FnHash>>,
}

impl<'r> Compiler<'r> {
    pub fn new(
        graph: &'r TypeGraph,
        types: &'r RunTypes,
        cache: &'r JitCache,
        options: &'r JitOptions,
    ) -> Self {
        Self {
            graph,
            types,
            cache,
            options,
            journal: RefCell::new(Vec::new()),
        }
    }

    /// Get or compile the function for `op` over `root`.
    pub fn compile(&self, op: Operation, root: TypeId) -> Result<Arc<CompiledOperation>, JitError> {
        let result = self.compile_root(op, root, false);
        if let Err(_err) = &result {
            debug!(%op, node = %root, error = %_err, "compilation failed, dropping pending entries");
            for hash in self.journal.borrow_mut().drain(..) {
                self.cache.remove(hash);
            }
        }
        result
    }

    fn compile_root(
        &self,
        op: Operation,
        root: TypeId,
        shape_only: bool,
    ) -> Result<Arc<CompiledOperation>, JitError> {
        let run_type = self.types.get(root);
        let key = if shape_only {
            Arc::from(format!("shape:{}", run_type.config.jit_id()))
        } else {
            run_type.config.jit_id_arc().clone()
        };
        let (entry, inserted) = self.cache.insert_pending(op, key)?;
        if !inserted {
            trace!(%op, node = %root, hash = %entry.hash(), "cache hit");
            return Ok(entry);
        }
        self.journal.borrow_mut().push(entry.hash());
        debug!(%op, node = %root, jit_id = run_type.config.jit_id(), "compiling");

        let mut cx = CompileOp::new(shape_only);
        let scope = Scope::root(root);
        let code = if run_type.family == RunTypeFamily::Function || !run_type.config.skips(op) {
            self.emit(&mut cx, &scope, op)?
        } else {
            None
        };
        let body = normalize_root(op, code)?;

        let name = render::fn_name(op, entry.hash());
        let source_code = render::function(op, &name, &render::body(&body));
        let context_code = render::context(&cx.context);
        let function = Lowerer::new(self.cache).function(&body)?;
        let child_dependencies = child_dependencies(entry.hash(), &cx.callees);
        entry.complete(CompiledBody {
            source_code,
            context_code,
            callees: cx.callees,
            child_dependencies,
            function,
        })?;
        Ok(entry)
    }

    /// Emit the code of the node in `scope` itself.
    pub(crate) fn emit(
        &self,
        cx: &mut CompileOp,
        scope: &Scope<'_>,
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        let kind = &self.graph.node(scope.node()).kind;
        match self.types.get(scope.node()).family {
            RunTypeFamily::Atomic => Ok(self.emit_atomic(scope, kind, op)),
            RunTypeFamily::Collection => self.emit_collection(cx, scope, kind, op),
            RunTypeFamily::Member => self.emit_member(cx, scope, kind, op),
            RunTypeFamily::Function => self.emit_function(scope, op),
        }
    }

    /// Code for a child node, inlined or as a call.
    pub(crate) fn visit(
        &self,
        cx: &mut CompileOp,
        parent: &Scope<'_>,
        node: TypeId,
        at: Accessor,
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        let run_type = self.types.get(node);
        if run_type.config.skips(op) {
            return Ok(None);
        }
        let kind = &self.graph.node(node).kind;
        if run_type.family == RunTypeFamily::Collection && (run_type.circular || is_named(kind)) {
            trace!(%op, %node, circular = run_type.circular, "factoring child");
            return self.factor(cx, node, at, op).map(|call| Some(Code::Expr(call)));
        }
        if parent.contains(node) {
            return Err(JitError::InvariantViolation(
                "inline expansion reached a node that is already being emitted",
            ));
        }
        let scope = parent.child(node, at);
        self.emit(cx, &scope, op)
    }

    /// Code for a child in expression position.
    pub(crate) fn expr_of(
        &self,
        cx: &mut CompileOp,
        parent: &Scope<'_>,
        node: TypeId,
        at: &Accessor,
        op: Operation,
    ) -> Result<Option<Expr>, JitError> {
        let mark = cx.mark();
        match self.visit(cx, parent, node, at.clone(), op)? {
            None => Ok(None),
            Some(Code::Expr(e)) => Ok(Some(e)),
            Some(Code::Block {
                stmts,
                returns: true,
            }) => {
                if self.options.factor_return_blocks {
                    trace!(%op, %node, "factoring returning block");
                    cx.rollback(mark);
                    self.factor(cx, node, at.clone(), op).map(Some)
                } else {
                    Ok(Some(Expr::Invoke(stmts)))
                }
            }
            Some(Code::Block { returns: false, .. }) => Err(JitError::InvariantViolation(
                "statement block used in expression position",
            )),
        }
    }

    /// Code for a child in statement position.
    pub(crate) fn stmts_of(
        &self,
        cx: &mut CompileOp,
        parent: &Scope<'_>,
        node: TypeId,
        at: &Accessor,
        op: Operation,
    ) -> Result<Vec<Stmt>, JitError> {
        Ok(match self.visit(cx, parent, node, at.clone(), op)? {
            None => Vec::new(),
            Some(Code::Expr(e)) => match op.call_mode() {
                CallMode::Transform => vec![Stmt::Assign(at.clone(), e)],
                _ => vec![Stmt::Expr(e)],
            },
            Some(Code::Block { stmts, .. }) => stmts,
        })
    }

    fn factor(
        &self,
        cx: &mut CompileOp,
        node: TypeId,
        at: Accessor,
        op: Operation,
    ) -> Result<Expr, JitError> {
        let callee = self.compile_root(op, node, cx.shape_only())?;
        let hash = callee.hash();
        cx.depend(callee);
        Ok(Expr::Call { hash, op, at })
    }
}

fn is_named(kind: &TypeKind) -> bool {
    matches!(
        kind,
        TypeKind::ObjectLiteral { name: Some(_), .. } | TypeKind::Class { .. }
    )
}

/// Turn the root's code into a complete function body.
fn normalize_root(op: Operation, code: Option<Code>) -> Result<Vec<Stmt>, JitError> {
    let root = Accessor::root();
    Ok(match (op.call_mode(), code) {
        (CallMode::Read, None) => vec![Stmt::Return(match op {
            Operation::IsType => Expr::bool(true),
            Operation::HasUnknownKeys => Expr::bool(false),
            _ => Expr::Json(alloc::boxed::Box::new(Expr::Get(root))),
        })],
        (CallMode::Read, Some(Code::Expr(e))) => vec![Stmt::Return(e)],
        (CallMode::Read, Some(Code::Block { stmts, returns })) => {
            if !returns {
                return Err(JitError::InvariantViolation(
                    "expression function without a return",
                ));
            }
            stmts
        }
        (CallMode::Report | CallMode::Mutate, None) => Vec::new(),
        (CallMode::Report | CallMode::Mutate, Some(Code::Expr(e))) => vec![Stmt::Expr(e)],
        (CallMode::Report | CallMode::Mutate, Some(Code::Block { stmts, .. })) => stmts,
        (CallMode::Transform, None) => vec![Stmt::Return(Expr::Take(root))],
        (CallMode::Transform, Some(Code::Expr(e))) => vec![Stmt::Return(e)],
        (CallMode::Transform, Some(Code::Block { mut stmts, .. })) => {
            stmts.push(Stmt::Return(Expr::Take(root)));
            stmts
        }
    })
}

/// Functions reachable through `callees` that are not called directly.
fn child_dependencies(this: FnHash, callees: &[Arc<CompiledOperation>]) -> Vec<FnHash> {
    let mut seen: Vec<FnHash> = callees.iter().map(|c| c.hash()).collect();
    seen.push(this);
    let mut out = Vec::new();
    let mut queue = callees.to_vec();
    while let Some(entry) = queue.pop() {
        let Some(body) = entry.body() else {
            continue;
        };
        for callee in &body.callees {
            if !seen.contains(&callee.hash()) {
                seen.push(callee.hash());
                out.push(callee.hash());
                queue.push(callee.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_link_to_their_parents() {
        let mut g = TypeGraph::new();
        let s = g.string();
        let list = g.array(s);
        let root = Scope::root(list);
        let child = root.child(s, Accessor::root().index(0));
        assert!(root.is_root());
        assert_eq!(child.depth(), 1);
        assert!(child.contains(list));
        assert!(!root.contains(s));
    }

    #[test]
    fn known_keys_hoist_above_threshold() {
        let mut cx = CompileOp::new(false);
        let short: Arc<[Arc<str>]> = Arc::from(vec![Arc::from("a")]);
        assert!(matches!(cx.known_keys(short, 2), KnownKeys::Inline(_)));
        let long: Arc<[Arc<str>]> = ["a", "b", "c"].into_iter().map(Arc::from).collect();
        let first = cx.known_keys(long.clone(), 2);
        let again = cx.known_keys(long, 2);
        assert_eq!(first, again);
        assert!(matches!(first, KnownKeys::Hoisted { slot: 0, .. }));

        let mark = Mark {
            context: 0,
            callees: 0,
        };
        cx.rollback(mark);
        assert!(cx.context.is_empty());
    }

    #[test]
    fn transform_roots_return_the_argument() {
        let body = normalize_root(Operation::JsonEncode, None).unwrap();
        assert_eq!(body, vec![Stmt::Return(Expr::Take(Accessor::root()))]);
        let body = normalize_root(Operation::IsType, None).unwrap();
        assert_eq!(body, vec![Stmt::Return(Expr::bool(true))]);
        assert!(normalize_root(Operation::StripUnknownKeys, None).unwrap().is_empty());
    }
}
