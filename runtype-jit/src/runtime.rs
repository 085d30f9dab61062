use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use parking_lot::Mutex;
use runtype_core::{TypeGraph, TypeId, TypeKind};
use runtype_value::Value;

use crate::cache::{CompiledOperation, JitCache};
use crate::compiler::Compiler;
use crate::jit_config::JitConfig;
use crate::lower::Frame;
use crate::runtype::{RunTypeFamily, RunTypes};
use crate::tracing_macros::debug;
use crate::{FnHash, JitError, JitOptions, Operation, PathItem, RuntimeError, TypeError};

/// Compiles and caches functions for the nodes of one type graph.
///
/// Building a runtime resolves the identity of every node up front, so the
/// code generated for a node never depends on the order in which functions
/// are requested.
///
/// ```
/// use runtype_core::TypeGraph;
/// use runtype_jit::Runtime;
/// use runtype_value::value;
///
/// let mut g = TypeGraph::new();
/// let s = g.string();
/// let list = g.array(s);
/// let rt = Runtime::new(g).unwrap();
///
/// let is_list = rt.run_type(list).is_type_fn().unwrap();
/// assert!(is_list.is_type(&value!(["a", "b"])).unwrap());
/// assert!(!is_list.is_type(&value!(["a", 1])).unwrap());
/// ```
pub struct Runtime {
    graph: TypeGraph,
    types: RunTypes,
    cache: JitCache,
    options: JitOptions,
    /// Held for the duration of one compile request.
    compiling: Mutex<()>,
}

impl Runtime {
    /// Build a runtime with default options.
    pub fn new(graph: TypeGraph) -> Result<Self, JitError> {
        Self::with_options(graph, JitOptions::default())
    }

    /// Build a runtime. Fails if the graph nests deeper than
    /// [`JitOptions::max_depth`].
    pub fn with_options(graph: TypeGraph, options: JitOptions) -> Result<Self, JitError> {
        let types = RunTypes::new(&graph, options.max_depth)?;
        debug!(nodes = graph.len(), "runtime ready");
        Ok(Self {
            graph,
            types,
            cache: JitCache::new(),
            options,
            compiling: Mutex::new(()),
        })
    }

    /// The type graph this runtime compiles.
    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    /// The options every function of this runtime is compiled with.
    pub fn options(&self) -> &JitOptions {
        &self.options
    }

    /// Number of compiled functions in the cache.
    pub fn cached_functions(&self) -> usize {
        self.cache.len()
    }

    /// The run type of a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this runtime's graph.
    pub fn run_type(&self, id: TypeId) -> RunTypeRef<'_> {
        assert!(
            self.graph.get(id).is_some(),
            "{id} does not belong to this runtime's graph"
        );
        RunTypeRef { runtime: self, id }
    }

    fn compile(&self, op: Operation, id: TypeId) -> Result<JitFunction, JitError> {
        let _guard = self.compiling.lock();
        let compiler = Compiler::new(&self.graph, &self.types, &self.cache, &self.options);
        let entry = compiler.compile(op, id)?;
        Ok(JitFunction { entry })
    }
}

/// A node of a [`Runtime`]'s graph, ready to compile.
#[derive(Clone, Copy)]
pub struct RunTypeRef<'r> {
    runtime: &'r Runtime,
    id: TypeId,
}

impl<'r> RunTypeRef<'r> {
    /// The node's id.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The node's kind.
    pub fn kind(&self) -> &'r TypeKind {
        &self.runtime.graph.node(self.id).kind
    }

    /// The node's family.
    pub fn family(&self) -> RunTypeFamily {
        self.runtime.types.get(self.id).family
    }

    /// Identity and skip flags.
    pub fn jit_config(&self) -> &'r JitConfig {
        &self.runtime.types.get(self.id).config
    }

    /// The structural identity of the node.
    pub fn jit_id(&self) -> &'r str {
        self.jit_config().jit_id()
    }

    /// Whether the node is part of a cycle and always compiles to its own function.
    pub fn is_circular(&self) -> bool {
        self.runtime.types.get(self.id).circular
    }

    /// Declared name of interfaces, classes, enums and functions.
    pub fn type_name(&self) -> Option<&'r str> {
        self.kind().type_name()
    }

    /// The parameter list of a function type.
    pub fn parameters(&self) -> Option<RunTypeRef<'r>> {
        match self.kind() {
            TypeKind::Function { parameters, .. } => Some(self.runtime.run_type(*parameters)),
            _ => None,
        }
    }

    /// The return type of a function type.
    pub fn return_type(&self) -> Option<RunTypeRef<'r>> {
        match self.kind() {
            TypeKind::Function { return_type, .. } => Some(self.runtime.run_type(*return_type)),
            _ => None,
        }
    }

    /// Compile `op` for this node, or get it from the cache.
    pub fn create_jit_function(&self, op: Operation) -> Result<JitFunction, JitError> {
        self.runtime.compile(op, self.id)
    }

    /// [`Operation::IsType`]
    pub fn is_type_fn(&self) -> Result<JitFunction, JitError> {
        self.create_jit_function(Operation::IsType)
    }

    /// [`Operation::TypeErrors`]
    pub fn type_errors_fn(&self) -> Result<JitFunction, JitError> {
        self.create_jit_function(Operation::TypeErrors)
    }

    /// [`Operation::JsonEncode`]
    pub fn json_encode_fn(&self) -> Result<JitFunction, JitError> {
        self.create_jit_function(Operation::JsonEncode)
    }

    /// [`Operation::JsonDecode`]
    pub fn json_decode_fn(&self) -> Result<JitFunction, JitError> {
        self.create_jit_function(Operation::JsonDecode)
    }

    /// [`Operation::JsonStringify`]
    pub fn json_stringify_fn(&self) -> Result<JitFunction, JitError> {
        self.create_jit_function(Operation::JsonStringify)
    }

    /// [`Operation::HasUnknownKeys`]
    pub fn has_unknown_keys_fn(&self) -> Result<JitFunction, JitError> {
        self.create_jit_function(Operation::HasUnknownKeys)
    }

    /// [`Operation::UnknownKeyErrors`]
    pub fn unknown_key_errors_fn(&self) -> Result<JitFunction, JitError> {
        self.create_jit_function(Operation::UnknownKeyErrors)
    }

    /// [`Operation::StripUnknownKeys`]
    pub fn strip_unknown_keys_fn(&self) -> Result<JitFunction, JitError> {
        self.create_jit_function(Operation::StripUnknownKeys)
    }

    /// [`Operation::UnknownKeysToUndefined`]
    pub fn unknown_keys_to_undefined_fn(&self) -> Result<JitFunction, JitError> {
        self.create_jit_function(Operation::UnknownKeysToUndefined)
    }
}

impl core::fmt::Debug for RunTypeRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RunTypeRef")
            .field("id", &self.id)
            .field("jit_id", &self.jit_id())
            .finish()
    }
}

/// A compiled function.
///
/// Handles are cheap to clone; two handles for the same (operation, jit id)
/// share one cache entry, see [`JitFunction::same_function`].
#[derive(Clone, Debug)]
pub struct JitFunction {
    entry: Arc<CompiledOperation>,
}

impl JitFunction {
    /// The operation this function implements.
    pub fn op(&self) -> Operation {
        self.entry.op()
    }

    /// Hash of (operation, jit id).
    pub fn hash(&self) -> FnHash {
        self.entry.hash()
    }

    /// The generated function's name, `<operation>_<hash>`.
    pub fn name(&self) -> String {
        crate::render::fn_name(self.op(), self.hash())
    }

    /// The jit id the function was compiled for.
    pub fn jit_id(&self) -> &str {
        self.entry.jit_id()
    }

    /// The generated source.
    pub fn source_code(&self) -> &str {
        self.entry.body().map_or("", |body| body.source_code.as_str())
    }

    /// Hoisted constants the source refers to, empty when there are none.
    pub fn context_code(&self) -> &str {
        self.entry.body().map_or("", |body| body.context_code.as_str())
    }

    /// Functions this one calls directly.
    pub fn dependencies(&self) -> Vec<FnHash> {
        self.entry
            .body()
            .map(|body| body.callees.iter().map(|c| c.hash()).collect())
            .unwrap_or_default()
    }

    /// Functions reached only through [`Self::dependencies`].
    pub fn child_dependencies(&self) -> &[FnHash] {
        self.entry
            .body()
            .map_or(&[], |body| body.child_dependencies.as_slice())
    }

    /// Context code and source of this function and everything it calls,
    /// in first-call order.
    pub fn bundle_source(&self) -> String {
        let mut seen = Vec::new();
        let mut out = String::new();
        bundle(&self.entry, &mut seen, &mut out);
        out
    }

    /// Whether both handles point at the same cache entry.
    pub fn same_function(&self, other: &JitFunction) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }

    fn expect(&self, requested: Operation) -> Result<(), RuntimeError> {
        if self.op() == requested {
            Ok(())
        } else {
            Err(RuntimeError::WrongOperation {
                compiled: self.op(),
                requested,
            })
        }
    }

    /// Run an [`Operation::IsType`] function.
    pub fn is_type(&self, value: &Value) -> Result<bool, RuntimeError> {
        self.expect(Operation::IsType)?;
        self.read_bool(value)
    }

    /// Run an [`Operation::TypeErrors`] function.
    pub fn type_errors(&self, value: &Value) -> Result<Vec<TypeError>, RuntimeError> {
        self.type_errors_at(value, &[])
    }

    /// Run an [`Operation::TypeErrors`] function; paths start with `base`.
    pub fn type_errors_at(
        &self,
        value: &Value,
        base: &[PathItem],
    ) -> Result<Vec<TypeError>, RuntimeError> {
        self.expect(Operation::TypeErrors)?;
        self.report(value, base)
    }

    /// Run an [`Operation::JsonEncode`] function on a copy of `value`.
    pub fn json_encode(&self, value: &Value) -> Result<Value, RuntimeError> {
        self.expect(Operation::JsonEncode)?;
        self.transform(value.clone())
    }

    /// Run an [`Operation::JsonDecode`] function on a copy of `value`.
    pub fn json_decode(&self, value: &Value) -> Result<Value, RuntimeError> {
        self.expect(Operation::JsonDecode)?;
        self.transform(value.clone())
    }

    /// Run an [`Operation::JsonStringify`] function.
    pub fn json_stringify(&self, value: &Value) -> Result<String, RuntimeError> {
        self.expect(Operation::JsonStringify)?;
        match self.entry.lowered()?.run(&mut Frame::shared(value))? {
            Value::String(text) => Ok(text),
            _ => Err(RuntimeError::NotJsonSafe(runtype_value::ValueError::NotJsonSafe {
                type_name: value.type_name(),
            })),
        }
    }

    /// Run an [`Operation::HasUnknownKeys`] function.
    pub fn has_unknown_keys(&self, value: &Value) -> Result<bool, RuntimeError> {
        self.expect(Operation::HasUnknownKeys)?;
        self.read_bool(value)
    }

    /// Run an [`Operation::UnknownKeyErrors`] function.
    pub fn unknown_key_errors(&self, value: &Value) -> Result<Vec<TypeError>, RuntimeError> {
        self.expect(Operation::UnknownKeyErrors)?;
        self.report(value, &[])
    }

    /// Run an [`Operation::StripUnknownKeys`] function in place.
    pub fn strip_unknown_keys(&self, value: &mut Value) -> Result<(), RuntimeError> {
        self.expect(Operation::StripUnknownKeys)?;
        self.mutate(value)
    }

    /// Run an [`Operation::UnknownKeysToUndefined`] function in place.
    pub fn unknown_keys_to_undefined(&self, value: &mut Value) -> Result<(), RuntimeError> {
        self.expect(Operation::UnknownKeysToUndefined)?;
        self.mutate(value)
    }

    fn read_bool(&self, value: &Value) -> Result<bool, RuntimeError> {
        let result = self.entry.lowered()?.run(&mut Frame::shared(value))?;
        Ok(matches!(result, Value::Bool(true)))
    }

    fn report(&self, value: &Value, base: &[PathItem]) -> Result<Vec<TypeError>, RuntimeError> {
        let mut errors = Vec::new();
        self.entry
            .lowered()?
            .run(&mut Frame::reporting(value, &mut errors, base))?;
        Ok(errors)
    }

    fn transform(&self, mut value: Value) -> Result<Value, RuntimeError> {
        self.entry.lowered()?.run(&mut Frame::exclusive(&mut value))
    }

    fn mutate(&self, value: &mut Value) -> Result<(), RuntimeError> {
        self.entry.lowered()?.run(&mut Frame::exclusive(value))?;
        Ok(())
    }
}

fn bundle(entry: &Arc<CompiledOperation>, seen: &mut Vec<FnHash>, out: &mut String) {
    if seen.contains(&entry.hash()) {
        return;
    }
    seen.push(entry.hash());
    let Some(body) = entry.body() else {
        return;
    };
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    if !body.context_code.is_empty() {
        out.push_str(&body.context_code);
        out.push('\n');
    }
    out.push_str(&body.source_code);
    for callee in &body.callees {
        bundle(callee, seen, out);
    }
}
