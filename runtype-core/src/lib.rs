#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
//! Reflected type graphs for runtype.
//!
//! A [`TypeGraph`] is the shape description the JIT compiler in
//! `runtype-jit` consumes: an append-only arena of [`TypeNode`]s addressed by
//! stable [`TypeId`]s. Children may refer back to their ancestors, which is how
//! recursive types such as `type Tree = { children: Tree[] }` are described.

extern crate alloc;

pub mod arena;

mod kind;
pub use kind::{LiteralValue, TypeKind};

mod graph;
pub use graph::{TypeGraph, TypeId, TypeNode};
