use runtype_core::{TypeGraph, TypeId};
use runtype_jit::{JitOptions, PathItem, Runtime, RuntimeError, TypeError};
use runtype_testhelpers::setup;
use runtype_value::{Map, Value, value};

/// `{ a: string }`
fn closed(g: &mut TypeGraph) -> TypeId {
    let s = g.string();
    let a = g.property("a", s);
    g.object_literal(vec![a])
}

#[test]
fn detects_unknown_keys() {
    setup();
    let mut g = TypeGraph::new();
    let obj = closed(&mut g);
    let rt = Runtime::new(g).unwrap();
    let has = rt.run_type(obj).has_unknown_keys_fn().unwrap();

    assert!(has.has_unknown_keys(&value!({"a": "x", "b": 1})).unwrap());
    assert!(!has.has_unknown_keys(&value!({"a": "x"})).unwrap());
    assert!(!has.has_unknown_keys(&value!({})).unwrap());
    assert!(!has.has_unknown_keys(&value!("not an object")).unwrap());
}

#[test]
fn reports_each_unknown_key() {
    setup();
    let mut g = TypeGraph::new();
    let obj = closed(&mut g);
    let rt = Runtime::new(g).unwrap();
    let errors = rt.run_type(obj).unknown_key_errors_fn().unwrap();

    assert_eq!(
        errors.unknown_key_errors(&value!({"a": "x", "b": 1, "c": 2})).unwrap(),
        vec![
            TypeError::new([PathItem::from("b")], "never"),
            TypeError::new([PathItem::from("c")], "never"),
        ]
    );
    assert!(errors.unknown_key_errors(&value!({"a": 1})).unwrap().is_empty());
}

#[test]
fn strips_and_clears_unknown_keys() {
    setup();
    let mut g = TypeGraph::new();
    let obj = closed(&mut g);
    let rt = Runtime::new(g).unwrap();

    let strip = rt.run_type(obj).strip_unknown_keys_fn().unwrap();
    let mut v = value!({"a": "x", "b": 1, "c": 2});
    strip.strip_unknown_keys(&mut v).unwrap();
    assert_eq!(v, value!({"a": "x"}));

    let clear = rt.run_type(obj).unknown_keys_to_undefined_fn().unwrap();
    let mut v = value!({"a": "x", "b": 1});
    clear.unknown_keys_to_undefined(&mut v).unwrap();
    let mut expected = Map::new();
    expected.insert("a".into(), value!("x"));
    expected.insert("b".into(), Value::Undefined);
    assert_eq!(v, Value::Object(expected));
}

#[test]
fn walks_into_nested_shapes() {
    setup();
    let mut g = TypeGraph::new();
    let item = closed(&mut g);
    let items = g.array(item);
    let inner = g.property("items", items);
    let n = g.number();
    let count = g.optional_property("count", n);
    let outer = g.object_literal(vec![inner, count]);
    let rt = Runtime::new(g).unwrap();

    let v = value!({"items": [{"a": "x"}, {"a": "y", "z": 1}], "q": true});

    let has = rt.run_type(outer).has_unknown_keys_fn().unwrap();
    assert!(has.has_unknown_keys(&v).unwrap());
    assert!(
        has.has_unknown_keys(&value!({"items": [{"a": "x", "z": 1}]}))
            .unwrap()
    );
    assert!(!has.has_unknown_keys(&value!({"items": [{"a": "x"}]})).unwrap());

    let errors = rt.run_type(outer).unknown_key_errors_fn().unwrap();
    assert_eq!(
        errors.unknown_key_errors(&v).unwrap(),
        vec![
            TypeError::new([PathItem::from("q")], "never"),
            TypeError::new(
                [PathItem::from("items"), PathItem::from(1), PathItem::from("z")],
                "never"
            ),
        ]
    );

    let strip = rt.run_type(outer).strip_unknown_keys_fn().unwrap();
    let mut stripped = v.clone();
    strip.strip_unknown_keys(&mut stripped).unwrap();
    assert_eq!(stripped, value!({"items": [{"a": "x"}, {"a": "y"}]}));
}

#[test]
fn index_signatures_have_no_unknown_keys() {
    setup();
    let mut g = TypeGraph::new();
    let key = g.string();
    let n = g.number();
    let sig = g.index_signature(key, n);
    let dict = g.object_literal(vec![sig]);
    let rt = Runtime::new(g).unwrap();

    let dict = rt.run_type(dict);
    assert!(dict.jit_config().skip_unknown_keys());
    let has = dict.has_unknown_keys_fn().unwrap();
    assert!(!has.has_unknown_keys(&value!({"x": 1, "y": 2})).unwrap());
    let strip = dict.strip_unknown_keys_fn().unwrap();
    let mut v = value!({"x": 1});
    strip.strip_unknown_keys(&mut v).unwrap();
    assert_eq!(v, value!({"x": 1}));
}

#[test]
fn unknown_key_count_is_limited() {
    setup();
    let mut g = TypeGraph::new();
    let obj = closed(&mut g);
    let rt = Runtime::with_options(g, JitOptions::default().with_max_unknown_keys(2)).unwrap();

    let strip = rt.run_type(obj).strip_unknown_keys_fn().unwrap();
    let mut v = value!({"a": "x", "b": 1, "c": 2, "d": 3});
    assert_eq!(
        strip.strip_unknown_keys(&mut v),
        Err(RuntimeError::TooManyUnknownKeys { limit: 2 })
    );

    let mut v = value!({"a": "x", "b": 1, "c": 2});
    strip.strip_unknown_keys(&mut v).unwrap();
    assert_eq!(v, value!({"a": "x"}));
}

#[test]
fn circular_shapes_are_walked() {
    setup();
    let mut g = TypeGraph::new();
    let node = g.recursive(|g, me| {
        let child = g.optional_property("child", me);
        g.object_kind(vec![child])
    });
    let rt = Runtime::new(g).unwrap();

    let strip = rt.run_type(node).strip_unknown_keys_fn().unwrap();
    let mut v = value!({"child": {"child": {"x": 1}, "y": 2}});
    strip.strip_unknown_keys(&mut v).unwrap();
    assert_eq!(v, value!({"child": {"child": {}}}));
}

#[test]
fn unions_use_the_matching_member() {
    setup();
    let mut g = TypeGraph::new();
    let obj = closed(&mut g);
    let s = g.string();
    let u = g.union(vec![s, obj]);
    let rt = Runtime::new(g).unwrap();

    let has = rt.run_type(u).has_unknown_keys_fn().unwrap();
    assert!(!has.has_unknown_keys(&value!("x")).unwrap());
    assert!(has.has_unknown_keys(&value!({"a": "x", "b": 1})).unwrap());

    let strip = rt.run_type(u).strip_unknown_keys_fn().unwrap();
    let mut v = value!({"a": "x", "b": 1});
    strip.strip_unknown_keys(&mut v).unwrap();
    assert_eq!(v, value!({"a": "x"}));
}

#[test]
fn strict_unions_still_find_unknown_keys() {
    setup();
    let mut g = TypeGraph::new();
    let left = closed(&mut g);
    let n = g.number();
    let b = g.property("b", n);
    let right = g.interface("Right", vec![b]);
    let u = g.union(vec![left, right]);
    let rt = Runtime::with_options(g, JitOptions::default().with_strict_unknown_keys(true)).unwrap();
    let u = rt.run_type(u);

    let v = value!({"a": "x", "c": 1});
    assert!(!u.is_type_fn().unwrap().is_type(&v).unwrap());
    assert!(u.has_unknown_keys_fn().unwrap().has_unknown_keys(&v).unwrap());
    assert_eq!(
        u.unknown_key_errors_fn().unwrap().unknown_key_errors(&v).unwrap(),
        vec![TypeError::new([PathItem::from("c")], "never")]
    );

    let mut stripped = v.clone();
    u.strip_unknown_keys_fn().unwrap().strip_unknown_keys(&mut stripped).unwrap();
    assert_eq!(stripped, value!({"a": "x"}));

    let mut cleared = value!({"b": 2, "z": true});
    u.unknown_keys_to_undefined_fn()
        .unwrap()
        .unknown_keys_to_undefined(&mut cleared)
        .unwrap();
    let mut expected = Map::new();
    expected.insert("b".into(), value!(2));
    expected.insert("z".into(), Value::Undefined);
    assert_eq!(cleared, Value::Object(expected));

    // member selection does not leak into the strict `isType` of a member
    let is_right = rt.run_type(right).is_type_fn().unwrap();
    assert!(!is_right.is_type(&value!({"b": 2, "z": true})).unwrap());
    assert!(is_right.is_type(&value!({"b": 2})).unwrap());
}
