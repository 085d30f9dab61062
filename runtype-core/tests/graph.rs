use runtype_core::{LiteralValue, TypeGraph, TypeKind};
use runtype_testhelpers::setup;

#[test]
fn builder_sets_parent_links() {
    setup();
    let mut g = TypeGraph::new();
    let s = g.string();
    let prop = g.property("name", s);
    let obj = g.object_literal(vec![prop]);

    assert_eq!(g.node(s).parent, Some(prop));
    assert_eq!(g.node(prop).parent, Some(obj));
    assert_eq!(g.node(obj).parent, None);
    assert_eq!(g.len(), 3);
}

#[test]
fn shared_child_keeps_first_parent() {
    setup();
    let mut g = TypeGraph::new();
    let n = g.number();
    let first = g.array(n);
    let _second = g.array(n);
    assert_eq!(g.node(n).parent, Some(first));
}

#[test]
fn recursive_node_refers_to_itself() {
    setup();
    let mut g = TypeGraph::new();
    let tree = g.recursive(|g, me| {
        let child = g.optional_property("child", me);
        g.object_kind(vec![child])
    });

    let TypeKind::ObjectLiteral { members, name } = &g.node(tree).kind else {
        panic!("expected object literal, got {:?}", g.node(tree).kind);
    };
    assert!(name.is_none());
    let TypeKind::Property { ty, optional, .. } = &g.node(members[0]).kind else {
        panic!("expected property");
    };
    assert!(*optional);
    assert_eq!(*ty, tree);
    // self references never become their own parent
    assert_eq!(g.node(tree).parent, None);
    assert_eq!(g.node(members[0]).parent, Some(tree));
}

#[test]
fn function_creates_parameter_list() {
    setup();
    let mut g = TypeGraph::new();
    let s = g.string();
    let b = g.boolean();
    let p = g.parameter("name", s);
    let f = g.function(Some("greet"), vec![p], b);

    let TypeKind::Function {
        parameters,
        return_type,
        name,
    } = &g.node(f).kind
    else {
        panic!("expected function");
    };
    assert_eq!(name.as_deref(), Some("greet"));
    assert_eq!(*return_type, b);
    assert_eq!(g.node(*parameters).kind.name(), "parameters");
    assert_eq!(g.node(*parameters).kind.children(), vec![p]);
}

#[test]
fn kind_names_and_type_names() {
    setup();
    let mut g = TypeGraph::new();
    let e = g.enumeration(
        "Color",
        [LiteralValue::from("red"), LiteralValue::from("green")],
    );
    let c = g.class("Point", vec![]);
    let i = g.interface("User", vec![]);
    let o = g.object_literal(vec![]);

    let names: Vec<_> = [e, c, i, o]
        .into_iter()
        .map(|id| (g.node(id).kind.name(), g.node(id).kind.type_name()))
        .collect();
    insta::assert_debug_snapshot!(names, @r#"
    [
        (
            "enum",
            Some(
                "Color",
            ),
        ),
        (
            "class",
            Some(
                "Point",
            ),
        ),
        (
            "objectLiteral",
            Some(
                "User",
            ),
        ),
        (
            "objectLiteral",
            None,
        ),
    ]
    "#);
}
