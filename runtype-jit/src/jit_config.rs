//! Structural identity of type nodes.
//!
//! Every node gets a jit id: a string that is equal for two nodes exactly when
//! their generated code is equal. Ids are built bottom-up from kind names,
//! literal values, member names and child ids. A reference back to a node
//! already on the walk stack renders as `$<kind><distance>`, the distance
//! counted in frames from the reference to the referenced node, so the id of
//! a node never depends on where the walk started.
//!
//! The same walk computes the skip flags and finds circular nodes. It runs
//! once, eagerly, when a [`Runtime`](crate::Runtime) is built.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use runtype_core::{LiteralValue, TypeGraph, TypeId, TypeKind};
use runtype_value::quote;

use crate::tracing_macros::{debug, trace};
use crate::{JitError, Operation};

/// Identity and skip flags of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitConfig {
    jit_id: Arc<str>,
    skip_jit: bool,
    skip_json_encode: bool,
    skip_json_decode: bool,
    skip_unknown_keys: bool,
}

impl JitConfig {
    /// The structural identity of the node.
    pub fn jit_id(&self) -> &str {
        &self.jit_id
    }

    pub(crate) fn jit_id_arc(&self) -> &Arc<str> {
        &self.jit_id
    }

    /// Every value passes `isType` and `typeErrors`.
    pub fn skip_jit(&self) -> bool {
        self.skip_jit
    }

    /// The wire form produced by `jsonEncode` equals the value.
    pub fn skip_json_encode(&self) -> bool {
        self.skip_json_encode
    }

    /// The value produced by `jsonDecode` equals the wire form.
    pub fn skip_json_decode(&self) -> bool {
        self.skip_json_decode
    }

    /// No object shape in the subtree, so the unknown-key operations have nothing to do.
    pub fn skip_unknown_keys(&self) -> bool {
        self.skip_unknown_keys
    }

    /// Whether the node contributes no code to `op`.
    pub fn skips(&self, op: Operation) -> bool {
        match op {
            Operation::IsType | Operation::TypeErrors => self.skip_jit,
            Operation::JsonEncode => self.skip_json_encode,
            Operation::JsonDecode => self.skip_json_decode,
            Operation::JsonStringify => false,
            Operation::HasUnknownKeys
            | Operation::UnknownKeyErrors
            | Operation::StripUnknownKeys
            | Operation::UnknownKeysToUndefined => self.skip_unknown_keys,
        }
    }
}

/// Flags before the id is attached.
#[derive(Debug, Clone, Copy)]
struct Flags {
    jit: bool,
    encode: bool,
    decode: bool,
    unknown_keys: bool,
}

impl Flags {
    const ALL: Flags = Flags {
        jit: true,
        encode: true,
        decode: true,
        unknown_keys: true,
    };

    const NONE: Flags = Flags {
        jit: false,
        encode: false,
        decode: false,
        unknown_keys: false,
    };

    fn of(config: &JitConfig) -> Self {
        Flags {
            jit: config.skip_jit,
            encode: config.skip_json_encode,
            decode: config.skip_json_decode,
            unknown_keys: config.skip_unknown_keys,
        }
    }

    /// Skips what every one of `children` skips.
    fn all(children: &[Walked]) -> Self {
        let mut flags = Flags::ALL;
        for child in children {
            flags.jit &= child.flags.jit;
            flags.encode &= child.flags.encode;
            flags.decode &= child.flags.decode;
            flags.unknown_keys &= child.flags.unknown_keys;
        }
        flags
    }
}

/// Result of walking one node.
struct Walked {
    id: String,
    flags: Flags,
    /// Shallowest stack depth a back-reference inside this subtree points at.
    reach: usize,
}

/// Identity, flags and circularity of every node of a graph, indexed by
/// [`TypeId::index`].
pub(crate) struct Resolved {
    pub configs: Vec<JitConfig>,
    pub circular: Vec<bool>,
}

/// Walk every node of `graph`.
pub(crate) fn resolve(graph: &TypeGraph, max_depth: usize) -> Result<Resolved, JitError> {
    let mut walker = Walker {
        graph,
        max_depth,
        memo: alloc::vec![None; graph.len()],
        circular: alloc::vec![false; graph.len()],
        stack: Vec::new(),
    };
    for (id, _) in graph.iter() {
        if walker.memo[id.index()].is_none() {
            walker.walk(id)?;
        }
    }
    let configs = walker
        .memo
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(JitError::InvariantViolation("a root walk left its node unresolved"))?;
    debug!(
        nodes = configs.len(),
        circular = walker.circular.iter().filter(|c| **c).count(),
        "resolved jit ids"
    );
    Ok(Resolved {
        configs,
        circular: walker.circular,
    })
}

struct Walker<'g> {
    graph: &'g TypeGraph,
    max_depth: usize,
    memo: Vec<Option<JitConfig>>,
    circular: Vec<bool>,
    stack: Vec<TypeId>,
}

impl Walker<'_> {
    fn walk(&mut self, id: TypeId) -> Result<Walked, JitError> {
        let kind = &self.graph.node(id).kind;

        if let Some(depth) = self.stack.iter().position(|s| *s == id) {
            // A member is never compiled on its own; its child is the node
            // that closes the cycle.
            let target = if kind.is_member() {
                self.stack.get(depth + 1).copied().unwrap_or(id)
            } else {
                id
            };
            if !self.circular[target.index()] {
                trace!(node = %target, kind = kind.name(), "circular reference");
            }
            self.circular[target.index()] = true;
            return Ok(Walked {
                id: format!("${}{}", kind.name(), self.stack.len() - depth),
                flags: Flags::NONE,
                reach: depth,
            });
        }

        if let Some(config) = &self.memo[id.index()] {
            return Ok(Walked {
                id: config.jit_id.to_string(),
                flags: Flags::of(config),
                reach: usize::MAX,
            });
        }

        if self.stack.len() >= self.max_depth {
            return Err(JitError::MaxDepthExceeded {
                max_depth: self.max_depth,
                kind: kind.name(),
            });
        }

        let depth = self.stack.len();
        self.stack.push(id);
        let walked = self.compute(id);
        self.stack.pop();
        let walked = walked?;

        if walked.reach >= depth {
            self.memo[id.index()] = Some(JitConfig {
                jit_id: Arc::from(walked.id.as_str()),
                skip_jit: walked.flags.jit,
                skip_json_encode: walked.flags.encode,
                skip_json_decode: walked.flags.decode,
                skip_unknown_keys: walked.flags.unknown_keys,
            });
        }
        Ok(walked)
    }

    fn children(&mut self, ids: &[TypeId]) -> Result<Vec<Walked>, JitError> {
        ids.iter().map(|id| self.walk(*id)).collect()
    }

    fn compute(&mut self, id: TypeId) -> Result<Walked, JitError> {
        let graph = self.graph;
        let kind = &graph.node(id).kind;

        if kind.is_atomic() {
            return Ok(Walked {
                id: atomic_id(kind),
                flags: atomic_flags(kind),
                reach: usize::MAX,
            });
        }

        let children = self.children(&kind.children())?;
        let reach = children.iter().map(|c| c.reach).min().unwrap_or(usize::MAX);
        let child_ids = || {
            children
                .iter()
                .map(|c| c.id.as_str())
                .collect::<Vec<_>>()
                .join(",")
        };
        let single = || children.first().map_or("", |c| c.id.as_str());

        let (id, flags) = match kind {
            TypeKind::Array { .. } => {
                let flags = Flags::all(&children);
                (format!("array[{}]", child_ids()), Flags { jit: false, ..flags })
            }
            TypeKind::Tuple { .. } | TypeKind::Parameters { .. } => {
                let flags = Flags::all(&children);
                (format!("{}[{}]", kind.name(), child_ids()), Flags { jit: false, ..flags })
            }
            TypeKind::ObjectLiteral { name, members } => {
                let label = if name.is_some() { "interface" } else { "objectLiteral" };
                (format!("{label}{{{}}}", child_ids()), object_flags(graph, members, &children, true))
            }
            TypeKind::Class {
                members,
                deserializable,
                ..
            } => {
                let label = if *deserializable { "class" } else { "opaqueClass" };
                (
                    format!("{label}{{{}}}", child_ids()),
                    object_flags(graph, members, &children, *deserializable),
                )
            }
            TypeKind::Union { .. } => {
                let all = Flags::all(&children);
                (
                    format!("union[{}]", child_ids()),
                    Flags {
                        jit: children.iter().any(|c| c.flags.jit),
                        encode: false,
                        decode: false,
                        unknown_keys: all.unknown_keys,
                    },
                )
            }
            TypeKind::Intersection { .. } => {
                (format!("intersection{{{}}}", child_ids()), Flags::all(&children))
            }
            TypeKind::Function { .. } => (format!("function[{}]", child_ids()), Flags::ALL),
            TypeKind::Property { name, optional, .. } => (
                format!("{}{}:{}", quote(name), optional_mark(*optional), single()),
                Flags::all(&children),
            ),
            TypeKind::IndexSignature { .. } => {
                let (key, value) = match children.as_slice() {
                    [key, value] => (key.id.as_str(), value),
                    _ => return Err(JitError::InvariantViolation("index signature without key and value")),
                };
                (format!("[{key}]:{}", value.id), value.flags)
            }
            TypeKind::TupleMember { optional, .. } | TypeKind::Parameter { optional, .. } => (
                format!("{}{}:{}", position(graph, id), optional_mark(*optional), single()),
                Flags::all(&children),
            ),
            TypeKind::Rest { .. } => (format!("...{}", single()), Flags::all(&children)),
            _ => return Err(JitError::InvariantViolation("atomic kind reached collection walk")),
        };

        Ok(Walked { id, flags, reach })
    }
}

fn optional_mark(optional: bool) -> &'static str {
    if optional { "?" } else { "" }
}

/// Index of a member inside its parent's member list.
pub(crate) fn position(graph: &TypeGraph, member: TypeId) -> usize {
    graph
        .node(member)
        .parent
        .map(|parent| graph.node(parent).kind.children())
        .and_then(|siblings| siblings.iter().position(|s| *s == member))
        .unwrap_or(0)
}

fn atomic_id(kind: &TypeKind) -> String {
    match kind {
        TypeKind::Literal(value) => format!("literal:{value}"),
        TypeKind::Enum { values, .. } => {
            let values = values.iter().map(ToString::to_string).collect::<Vec<_>>();
            format!("enum:[{}]", values.join(","))
        }
        other => other.name().to_string(),
    }
}

fn atomic_flags(kind: &TypeKind) -> Flags {
    match kind {
        TypeKind::Any | TypeKind::Unknown => Flags::ALL,
        TypeKind::Never => Flags {
            jit: false,
            encode: false,
            decode: false,
            unknown_keys: true,
        },
        TypeKind::Null
        | TypeKind::Boolean
        | TypeKind::Number
        | TypeKind::String
        | TypeKind::Object
        | TypeKind::Enum { .. } => Flags {
            jit: false,
            ..Flags::ALL
        },
        TypeKind::Literal(value) if !matches!(value, LiteralValue::BigInt(_)) => Flags {
            jit: false,
            ..Flags::ALL
        },
        // undefined, void, bigint, symbol, Date, RegExp and bigint literals
        // have a wire form of their own
        _ => Flags {
            jit: false,
            encode: false,
            decode: false,
            unknown_keys: true,
        },
    }
}

fn object_flags(graph: &TypeGraph, members: &[TypeId], children: &[Walked], decodable: bool) -> Flags {
    let all = Flags::all(children);
    let has_index_signature = members
        .iter()
        .any(|m| matches!(graph.node(*m).kind, TypeKind::IndexSignature { .. }));
    Flags {
        jit: false,
        encode: all.encode,
        decode: all.decode && decodable,
        unknown_keys: has_index_signature && all.unknown_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_of(graph: &TypeGraph, id: TypeId) -> String {
        let resolved = resolve(graph, 64).unwrap();
        resolved.configs[id.index()].jit_id().to_string()
    }

    #[test]
    fn structural_ids() {
        let mut g = TypeGraph::new();
        let s = g.string();
        let n = g.number();
        let a = g.property("a", s);
        let b = g.optional_property("b", n);
        let obj = g.object_literal(vec![a, b]);
        let list = g.array(obj);
        assert_eq!(id_of(&g, list), r#"array[objectLiteral{"a":string,"b"?:number}]"#);
    }

    #[test]
    fn recursive_ids_are_relative() {
        let mut g = TypeGraph::new();
        let tree = g.recursive(|g, me| {
            let child = g.optional_property("child", me);
            g.object_kind(vec![child])
        });
        let resolved = resolve(&g, 64).unwrap();
        assert_eq!(
            resolved.configs[tree.index()].jit_id(),
            r#"objectLiteral{"child"?:$objectLiteral2}"#
        );
        assert!(resolved.circular[tree.index()]);
        assert!(!resolved.configs[tree.index()].skip_json_encode());
    }

    #[test]
    fn skip_flags() {
        let mut g = TypeGraph::new();
        let s = g.string();
        let d = g.date();
        let any = g.any();
        let strings = g.array(s);
        let dates = g.array(d);
        let u = g.union(vec![s, any]);
        let resolved = resolve(&g, 64).unwrap();
        let config = |id: TypeId| &resolved.configs[id.index()];
        assert!(config(strings).skips(Operation::JsonEncode));
        assert!(!config(strings).skips(Operation::IsType));
        assert!(!config(dates).skips(Operation::JsonDecode));
        assert!(config(u).skips(Operation::IsType));
        assert!(!config(u).skips(Operation::JsonEncode));
        assert!(!config(any).skips(Operation::JsonStringify));
    }

    #[test]
    fn depth_is_bounded() {
        // ids of a cycle are recomputed for every entry point, so a long
        // cycle is walked to its full depth
        let mut g = TypeGraph::new();
        g.recursive(|g, me| {
            let mut ty = me;
            for _ in 0..10 {
                ty = g.array(ty);
            }
            let x = g.property("x", ty);
            g.object_kind(vec![x])
        });
        assert_eq!(
            resolve(&g, 4).err(),
            Some(JitError::MaxDepthExceeded {
                max_depth: 4,
                kind: "array"
            })
        );
    }
}
