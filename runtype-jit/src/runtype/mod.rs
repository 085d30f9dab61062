//! Per-node compile state and the per-family code emitters.
//!
//! A [`RunType`] wraps one [`TypeNode`](runtype_core::TypeNode) with its jit
//! config and circularity. Run types live in a [`RunTypes`] arena parallel to
//! the graph and are addressed by the same [`TypeId`].
//!
//! The emitters are split by family:
//! - [`atomic`]: leaf kinds
//! - [`collection`]: arrays, tuples, objects, unions, intersections and parameter lists
//! - [`member`]: properties, tuple members, parameters and rest elements
//! - [`function`]: function signatures

pub(crate) mod atomic;
pub(crate) mod collection;
pub(crate) mod function;
pub(crate) mod member;

use alloc::vec::Vec;

use runtype_core::{TypeGraph, TypeId, TypeKind};

use crate::JitError;
use crate::jit_config::{self, JitConfig};

/// The four families of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunTypeFamily {
    /// Leaf kinds: primitives, literals, enums, `Date`, `RegExp`.
    Atomic,
    /// Kinds holding other types: arrays, tuples, objects, unions, intersections, parameter lists.
    Collection,
    /// One slot of a collection.
    Member,
    /// A function signature.
    Function,
}

impl RunTypeFamily {
    /// Family of a node kind.
    pub fn of(kind: &TypeKind) -> Self {
        match kind {
            TypeKind::Function { .. } => RunTypeFamily::Function,
            kind if kind.is_atomic() => RunTypeFamily::Atomic,
            kind if kind.is_member() => RunTypeFamily::Member,
            _ => RunTypeFamily::Collection,
        }
    }
}

/// Compile state of one node.
#[derive(Debug, Clone)]
pub(crate) struct RunType {
    pub family: RunTypeFamily,
    pub config: JitConfig,
    pub circular: bool,
}

/// Run types of every node of a graph.
#[derive(Debug)]
pub(crate) struct RunTypes {
    types: Vec<RunType>,
}

impl RunTypes {
    /// Resolve every node of `graph`. Ids and circularity are final afterwards.
    pub fn new(graph: &TypeGraph, max_depth: usize) -> Result<Self, JitError> {
        let resolved = jit_config::resolve(graph, max_depth)?;
        let types = graph
            .iter()
            .zip(resolved.configs)
            .zip(resolved.circular)
            .map(|(((_, node), config), circular)| RunType {
                family: RunTypeFamily::of(&node.kind),
                config,
                circular,
            })
            .collect();
        Ok(Self { types })
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to the graph these run types were built from.
    pub fn get(&self, id: TypeId) -> &RunType {
        &self.types[id.index()]
    }
}
