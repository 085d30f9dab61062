//! Cache of compiled functions.
//!
//! Functions are cached by [`FnHash`], derived from (operation, jit id), so
//! every node with the same structural identity shares one compiled function.
//!
//! An entry is inserted *pending* before its body is compiled. Recursive
//! types call back into the entry being compiled, and the lowered call site
//! only needs the entry handle: the body is read when the call runs.
//!
//! Entries are never evicted. A recursive function holds its own entry
//! through its call sites, so its memory lives as long as the process.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use std::sync::OnceLock;

use std::collections::HashMap;
use parking_lot::RwLock;

use crate::lower::Lowered;
use crate::tracing_macros::trace;
use crate::{FnHash, JitError, Operation, RuntimeError};

const HASH_SEED: u64 = 0x7275_6e74_7970_6521;

/// Hash naming the function compiled for `op` over a node with `jit_id`.
pub(crate) fn fn_hash(op: Operation, jit_id: &str) -> FnHash {
    let mut key = String::with_capacity(op.id().len() + 1 + jit_id.len());
    key.push_str(op.id());
    key.push(':');
    key.push_str(jit_id);
    FnHash(museair::bfast::hash(key.as_bytes(), HASH_SEED))
}

/// Everything produced by a finished compilation.
pub(crate) struct CompiledBody {
    pub source_code: String,
    pub context_code: String,
    /// Functions called directly, in first-call order.
    pub callees: Vec<Arc<CompiledOperation>>,
    /// Functions reached only through callees.
    pub child_dependencies: Vec<FnHash>,
    pub function: Lowered,
}

/// One cache entry: a function compiled for (operation, jit id).
pub(crate) struct CompiledOperation {
    hash: FnHash,
    op: Operation,
    jit_id: Arc<str>,
    body: OnceLock<CompiledBody>,
}

impl CompiledOperation {
    fn pending(hash: FnHash, op: Operation, jit_id: Arc<str>) -> Self {
        Self {
            hash,
            op,
            jit_id,
            body: OnceLock::new(),
        }
    }

    pub fn hash(&self) -> FnHash {
        self.hash
    }

    pub fn op(&self) -> Operation {
        self.op
    }

    pub fn jit_id(&self) -> &Arc<str> {
        &self.jit_id
    }

    pub fn body(&self) -> Option<&CompiledBody> {
        self.body.get()
    }

    pub fn is_compiled(&self) -> bool {
        self.body.get().is_some()
    }

    /// Publish the compiled body. Happens once per entry.
    pub fn complete(&self, body: CompiledBody) -> Result<(), JitError> {
        self.body
            .set(body)
            .map_err(|_| JitError::InvariantViolation("function compiled twice"))
    }

    pub fn lowered(&self) -> Result<&Lowered, RuntimeError> {
        self.body
            .get()
            .map(|body| &body.function)
            .ok_or(RuntimeError::NotCompiled(self.hash))
    }
}

impl fmt::Debug for CompiledOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledOperation")
            .field("hash", &self.hash)
            .field("op", &self.op)
            .field("jit_id", &self.jit_id)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

/// Compiled functions of one [`Runtime`](crate::Runtime).
#[derive(Default)]
pub(crate) struct JitCache {
    entries: RwLock<HashMap<FnHash, Arc<CompiledOperation>>>,
}

impl JitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: FnHash) -> Option<Arc<CompiledOperation>> {
        self.entries.read().get(&hash).cloned()
    }

    /// Insert a pending entry for (op, jit id), or return the one already there.
    ///
    /// The flag is `true` when this call inserted the entry.
    pub fn insert_pending(
        &self,
        op: Operation,
        jit_id: Arc<str>,
    ) -> Result<(Arc<CompiledOperation>, bool), JitError> {
        let hash = fn_hash(op, &jit_id);
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&hash) {
            check_collision(existing, op, &jit_id)?;
            return Ok((existing.clone(), false));
        }
        trace!(%hash, %op, jit_id = %jit_id, "cache: pending entry");
        let entry = Arc::new(CompiledOperation::pending(hash, op, jit_id));
        entries.insert(hash, entry.clone());
        Ok((entry, true))
    }

    /// Drop an entry, used to undo pending entries of a failed compilation.
    pub fn remove(&self, hash: FnHash) {
        if self.entries.write().remove(&hash).is_some() {
            trace!(%hash, "cache: entry removed");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

fn check_collision(entry: &CompiledOperation, op: Operation, jit_id: &Arc<str>) -> Result<(), JitError> {
    if entry.op == op && entry.jit_id == *jit_id {
        Ok(())
    } else {
        Err(JitError::HashCollision {
            hash: entry.hash,
            existing: entry.jit_id.clone(),
            incoming: jit_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_on_op_and_id() {
        let a = fn_hash(Operation::IsType, "string");
        assert_eq!(a, fn_hash(Operation::IsType, "string"));
        assert_ne!(a, fn_hash(Operation::TypeErrors, "string"));
        assert_ne!(a, fn_hash(Operation::IsType, "number"));
        assert_eq!(a.to_string().len(), 12);
    }

    #[test]
    fn pending_entries_are_shared_and_removable() {
        let cache = JitCache::new();
        let id: Arc<str> = Arc::from("array[string]");
        let (first, inserted) = cache.insert_pending(Operation::IsType, id.clone()).unwrap();
        assert!(inserted);
        assert!(!first.is_compiled());
        assert_eq!(
            first.lowered().err(),
            Some(RuntimeError::NotCompiled(first.hash()))
        );

        let (second, inserted) = cache.insert_pending(Operation::IsType, id.clone()).unwrap();
        assert!(!inserted);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.get(first.hash()).is_some());

        cache.remove(first.hash());
        assert_eq!(cache.len(), 0);
        assert!(cache.get(first.hash()).is_none());
    }

    #[test]
    fn collisions_are_reported() {
        let cache = JitCache::new();
        let id: Arc<str> = Arc::from("string");
        let (entry, _) = cache.insert_pending(Operation::IsType, id).unwrap();
        let err = check_collision(&entry, Operation::IsType, &Arc::from("number")).unwrap_err();
        assert!(matches!(err, JitError::HashCollision { .. }));
    }
}
