use alloc::string::String;
use alloc::vec::Vec;

use crate::arena::{Arena, Idx};
use crate::kind::{LiteralValue, TypeKind};

/// Handle of a node inside a [`TypeGraph`].
pub type TypeId = Idx<TypeNode>;

/// One reflected type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    /// What this node describes, including its child references.
    pub kind: TypeKind,
    /// The first node that adopted this one as a child.
    pub parent: Option<TypeId>,
}

/// An append-only graph of [`TypeNode`]s.
///
/// This is the interface the type reflector hands to the compiler: node
/// identity is stable (a [`TypeId`] never moves) and children may refer back
/// to ancestors to describe recursive types.
///
/// ```
/// use runtype_core::TypeGraph;
///
/// let mut g = TypeGraph::new();
/// let name = g.string();
/// let age = g.number();
/// let name_prop = g.property("name", name);
/// let age_prop = g.optional_property("age", age);
/// let user = g.interface("User", vec![name_prop, age_prop]);
/// assert_eq!(g.node(user).kind.name(), "objectLiteral");
/// assert_eq!(g.node(name).parent, Some(name_prop));
/// assert_eq!(g.node(name_prop).parent, Some(user));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    nodes: Arena<TypeNode>,
}

impl TypeGraph {
    /// Create an empty graph.
    pub const fn new() -> Self {
        Self {
            nodes: Arena::new(),
        }
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this graph.
    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id]
    }

    /// Get a node, or `None` if `id` was not produced by this graph.
    pub fn get(&self, id: TypeId) -> Option<&TypeNode> {
        self.nodes.get(id)
    }

    /// Iterate over all nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeNode)> {
        self.nodes.iter()
    }

    /// Add a node and adopt its children.
    pub fn add(&mut self, kind: TypeKind) -> TypeId {
        let children = kind.children();
        let id = self.nodes.alloc(TypeNode { kind, parent: None });
        self.adopt(id, &children);
        id
    }

    /// Add a node that may refer to itself.
    ///
    /// The closure receives the id the node will have, so children built
    /// inside it can point back at it:
    ///
    /// ```
    /// use runtype_core::TypeGraph;
    ///
    /// let mut g = TypeGraph::new();
    /// let tree = g.recursive(|g, tree| {
    ///     let children = g.array(tree);
    ///     let prop = g.property("children", children);
    ///     g.object_kind(vec![prop])
    /// });
    /// assert_eq!(g.node(tree).kind.name(), "objectLiteral");
    /// ```
    pub fn recursive(&mut self, build: impl FnOnce(&mut Self, TypeId) -> TypeKind) -> TypeId {
        let id = self.nodes.alloc(TypeNode {
            kind: TypeKind::Unknown,
            parent: None,
        });
        let kind = build(self, id);
        let children = kind.children();
        if let Some(node) = self.nodes.get_mut(id) {
            node.kind = kind;
        }
        self.adopt(id, &children);
        id
    }

    fn adopt(&mut self, parent: TypeId, children: &[TypeId]) {
        for child in children {
            debug_assert!(
                self.nodes.get(*child).is_some(),
                "child {child} does not belong to this graph"
            );
            if *child == parent {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(*child) {
                if node.parent.is_none() {
                    node.parent = Some(parent);
                }
            }
        }
    }

    // atomic shorthands

    /// `any`
    pub fn any(&mut self) -> TypeId {
        self.add(TypeKind::Any)
    }

    /// `unknown`
    pub fn unknown(&mut self) -> TypeId {
        self.add(TypeKind::Unknown)
    }

    /// `never`
    pub fn never(&mut self) -> TypeId {
        self.add(TypeKind::Never)
    }

    /// `void`
    pub fn void(&mut self) -> TypeId {
        self.add(TypeKind::Void)
    }

    /// `undefined`
    pub fn undefined(&mut self) -> TypeId {
        self.add(TypeKind::Undefined)
    }

    /// `null`
    pub fn null(&mut self) -> TypeId {
        self.add(TypeKind::Null)
    }

    /// `boolean`
    pub fn boolean(&mut self) -> TypeId {
        self.add(TypeKind::Boolean)
    }

    /// `number`
    pub fn number(&mut self) -> TypeId {
        self.add(TypeKind::Number)
    }

    /// `bigint`
    pub fn bigint(&mut self) -> TypeId {
        self.add(TypeKind::BigInt)
    }

    /// `string`
    pub fn string(&mut self) -> TypeId {
        self.add(TypeKind::String)
    }

    /// `symbol`
    pub fn symbol(&mut self) -> TypeId {
        self.add(TypeKind::Symbol)
    }

    /// `object`
    pub fn object(&mut self) -> TypeId {
        self.add(TypeKind::Object)
    }

    /// `Date`
    pub fn date(&mut self) -> TypeId {
        self.add(TypeKind::Date)
    }

    /// `RegExp`
    pub fn regexp(&mut self) -> TypeId {
        self.add(TypeKind::RegExp)
    }

    /// A literal type.
    pub fn literal(&mut self, value: impl Into<LiteralValue>) -> TypeId {
        self.add(TypeKind::Literal(value.into()))
    }

    /// An enum with the given member values.
    pub fn enumeration(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = LiteralValue>,
    ) -> TypeId {
        self.add(TypeKind::Enum {
            name: name.into(),
            values: values.into_iter().collect(),
        })
    }

    // collections

    /// `T[]`
    pub fn array(&mut self, element: TypeId) -> TypeId {
        self.add(TypeKind::Array { element })
    }

    /// A tuple of member nodes built with [`Self::tuple_member`],
    /// [`Self::optional_tuple_member`] and [`Self::rest`].
    pub fn tuple(&mut self, members: Vec<TypeId>) -> TypeId {
        self.add(TypeKind::Tuple { members })
    }

    /// The kind of an anonymous object literal, for use with [`Self::recursive`].
    pub fn object_kind(&self, members: Vec<TypeId>) -> TypeKind {
        TypeKind::ObjectLiteral {
            name: None,
            members,
        }
    }

    /// An anonymous object literal type.
    pub fn object_literal(&mut self, members: Vec<TypeId>) -> TypeId {
        self.add(TypeKind::ObjectLiteral {
            name: None,
            members,
        })
    }

    /// A named interface.
    pub fn interface(&mut self, name: impl Into<String>, members: Vec<TypeId>) -> TypeId {
        self.add(TypeKind::ObjectLiteral {
            name: Some(name.into()),
            members,
        })
    }

    /// A class whose instances can be rebuilt from JSON.
    pub fn class(&mut self, name: impl Into<String>, members: Vec<TypeId>) -> TypeId {
        self.add(TypeKind::Class {
            name: name.into(),
            members,
            deserializable: true,
        })
    }

    /// A class that cannot be rebuilt from JSON (e.g. it needs constructor arguments).
    pub fn opaque_class(&mut self, name: impl Into<String>, members: Vec<TypeId>) -> TypeId {
        self.add(TypeKind::Class {
            name: name.into(),
            members,
            deserializable: false,
        })
    }

    /// `A | B | ...`
    pub fn union(&mut self, types: Vec<TypeId>) -> TypeId {
        self.add(TypeKind::Union { types })
    }

    /// `A & B & ...`
    pub fn intersection(&mut self, types: Vec<TypeId>) -> TypeId {
        self.add(TypeKind::Intersection { types })
    }

    // members

    /// A required property.
    pub fn property(&mut self, name: impl Into<String>, ty: TypeId) -> TypeId {
        self.add(TypeKind::Property {
            name: name.into(),
            optional: false,
            ty,
        })
    }

    /// An optional property (`name?: T`).
    pub fn optional_property(&mut self, name: impl Into<String>, ty: TypeId) -> TypeId {
        self.add(TypeKind::Property {
            name: name.into(),
            optional: true,
            ty,
        })
    }

    /// `[key: K]: V`
    pub fn index_signature(&mut self, key: TypeId, ty: TypeId) -> TypeId {
        self.add(TypeKind::IndexSignature { key, ty })
    }

    /// A required tuple element.
    pub fn tuple_member(&mut self, ty: TypeId) -> TypeId {
        self.add(TypeKind::TupleMember {
            name: None,
            optional: false,
            ty,
        })
    }

    /// An optional tuple element (`T?`).
    pub fn optional_tuple_member(&mut self, ty: TypeId) -> TypeId {
        self.add(TypeKind::TupleMember {
            name: None,
            optional: true,
            ty,
        })
    }

    /// A rest element (`...T[]`); `element` is `T`.
    pub fn rest(&mut self, element: TypeId) -> TypeId {
        self.add(TypeKind::Rest { ty: element })
    }

    /// A required parameter.
    pub fn parameter(&mut self, name: impl Into<String>, ty: TypeId) -> TypeId {
        self.add(TypeKind::Parameter {
            name: name.into(),
            optional: false,
            ty,
        })
    }

    /// An optional parameter.
    pub fn optional_parameter(&mut self, name: impl Into<String>, ty: TypeId) -> TypeId {
        self.add(TypeKind::Parameter {
            name: name.into(),
            optional: true,
            ty,
        })
    }

    /// A function signature. `parameters` are [`Self::parameter`] /
    /// [`Self::rest`] nodes; the parameter list node is created here.
    pub fn function(
        &mut self,
        name: Option<&str>,
        parameters: Vec<TypeId>,
        return_type: TypeId,
    ) -> TypeId {
        let parameters = self.add(TypeKind::Parameters {
            members: parameters,
        });
        self.add(TypeKind::Function {
            name: name.map(Into::into),
            parameters,
            return_type,
        })
    }
}
