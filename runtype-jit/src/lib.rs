#![warn(missing_docs)]
#![forbid(unsafe_code)]
//! Compiles validation and JSON functions for runtime type graphs.
//!
//! A [`Runtime`] takes a [`TypeGraph`](runtype_core::TypeGraph) and, for any
//! node and any of the nine [`Operation`]s, generates a function specialized
//! to that node's shape:
//!
//! - `isType` and `typeErrors` validate a [`Value`](runtype_value::Value)
//! - `jsonEncode` and `jsonDecode` convert between values and their JSON-safe
//!   wire form
//! - `jsonStringify` writes JSON text directly
//! - `hasUnknownKeys`, `unknownKeyErrors`, `stripUnknownKeys` and
//!   `unknownKeysToUndefined` deal with keys an object shape does not declare
//!
//! Functions are cached by the structural identity of their node (its jit
//! id), so structurally equal nodes share one compiled function. Recursive
//! types compile to functions that call themselves.
//!
//! Every function is kept as readable source (see
//! [`JitFunction::source_code`]) and as an executable closure tree.
//!
//! ```
//! use runtype_core::TypeGraph;
//! use runtype_jit::Runtime;
//! use runtype_value::value;
//!
//! let mut g = TypeGraph::new();
//! let s = g.string();
//! let n = g.number();
//! let name = g.property("name", s);
//! let age = g.optional_property("age", n);
//! let user = g.object_literal(vec![name, age]);
//!
//! let rt = Runtime::new(g).unwrap();
//! let errors = rt.run_type(user).type_errors_fn().unwrap();
//! let found = errors.type_errors(&value!({"name": 1})).unwrap();
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].to_string(), "$.name: expected string");
//! ```

extern crate alloc;

mod tracing_macros;

mod error;
pub use error::{FnHash, JitError, PathItem, RuntimeError, TypeError};

mod options;
pub use options::JitOptions;

mod operation;
pub use operation::Operation;

mod jit_config;
pub use jit_config::JitConfig;

mod runtype;
pub use runtype::RunTypeFamily;

mod runtime;
pub use runtime::{JitFunction, RunTypeRef, Runtime};

mod cache;
mod code;
mod compiler;
mod lower;
mod render;
