use runtype_core::{TypeGraph, TypeId};
use runtype_jit::{JitError, Operation, Runtime, RuntimeError};
use runtype_testhelpers::setup;
use runtype_value::{Map, Value, ValueError, value};

/// `{ id: bigint, at: Date, pattern: RegExp, tags: string[], value: string | number, note?: string, when?: Date }`
fn event(g: &mut TypeGraph) -> TypeId {
    let b = g.bigint();
    let id = g.property("id", b);
    let d = g.date();
    let at = g.property("at", d);
    let r = g.regexp();
    let pattern = g.property("pattern", r);
    let s = g.string();
    let list = g.array(s);
    let tags = g.property("tags", list);
    let s = g.string();
    let n = g.number();
    let u = g.union(vec![s, n]);
    let value = g.property("value", u);
    let s = g.string();
    let note = g.optional_property("note", s);
    let d = g.date();
    let when = g.optional_property("when", d);
    g.object_literal(vec![id, at, pattern, tags, value, note, when])
}

fn object(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.insert(key.to_string(), value);
    }
    Value::Object(map)
}

fn samples() -> Vec<Value> {
    vec![
        object(vec![
            ("id", Value::BigInt(123)),
            ("at", Value::Date(1_700_000_000_123.0)),
            ("pattern", Value::regexp("a+", "gi")),
            ("tags", value!(["x", "y"])),
            ("value", value!(5)),
        ]),
        object(vec![
            ("id", Value::BigInt(i128::MIN)),
            ("at", Value::Date(0.0)),
            ("pattern", Value::regexp("^\\d+$", "")),
            ("tags", value!([])),
            ("value", value!("five")),
            ("note", value!("n")),
            ("when", Value::Date(86_400_000.0)),
        ]),
    ]
}

#[test]
fn encode_produces_json_safe_wire_values() {
    setup();
    let mut g = TypeGraph::new();
    let event = event(&mut g);
    let rt = Runtime::new(g).unwrap();
    let encode = rt.run_type(event).json_encode_fn().unwrap();

    let original = samples().remove(0);
    let wire = encode.json_encode(&original).unwrap();
    assert_eq!(
        wire,
        value!({
            "id": "123",
            "at": "2023-11-14T22:13:20.123Z",
            "pattern": "/a+/gi",
            "tags": ["x", "y"],
            "value": [1, 5]
        })
    );
    // the argument is left untouched
    assert_eq!(original, samples().remove(0));
}

#[test]
fn decode_inverts_encode() {
    setup();
    let mut g = TypeGraph::new();
    let event = event(&mut g);
    let rt = Runtime::new(g).unwrap();
    let encode = rt.run_type(event).json_encode_fn().unwrap();
    let decode = rt.run_type(event).json_decode_fn().unwrap();

    for sample in samples() {
        let text = encode.json_encode(&sample).unwrap().to_json_string().unwrap();
        let parsed = Value::parse_json(&text).unwrap();
        assert_eq!(decode.json_decode(&parsed).unwrap(), sample, "round trip of {text}");
    }
}

#[test]
fn stringify_matches_encoded_json() {
    setup();
    let mut g = TypeGraph::new();
    let event = event(&mut g);
    let rt = Runtime::new(g).unwrap();
    let encode = rt.run_type(event).json_encode_fn().unwrap();
    let stringify = rt.run_type(event).json_stringify_fn().unwrap();

    let mut extra = samples().remove(0);
    if let Value::Object(map) = &mut extra {
        map.insert("extra".into(), value!({"k": [1, "two"]}));
        map.insert("gone".into(), Value::Undefined);
    }
    for sample in samples().into_iter().chain([extra]) {
        let text = stringify.json_stringify(&sample).unwrap();
        let encoded = encode.json_encode(&sample).unwrap().to_json_string().unwrap();
        assert_eq!(
            Value::parse_json(&text).unwrap(),
            Value::parse_json(&encoded).unwrap(),
            "stringify of {sample:?}"
        );
    }
}

#[test]
fn undeclared_keys_survive_stringify() {
    setup();
    let mut g = TypeGraph::new();
    let s = g.string();
    let a = g.property("a", s);
    let obj = g.object_literal(vec![a]);
    let key = g.number();
    let n = g.number();
    let sig = g.index_signature(key, n);
    let s = g.string();
    let name = g.property("name", s);
    let indexed = g.object_literal(vec![name, sig]);
    let rt = Runtime::new(g).unwrap();

    let v = value!({"a": "x", "b": 1});
    assert!(rt.run_type(obj).is_type_fn().unwrap().is_type(&v).unwrap());
    let text = rt.run_type(obj).json_stringify_fn().unwrap().json_stringify(&v).unwrap();
    let encoded = rt.run_type(obj).json_encode_fn().unwrap().json_encode(&v).unwrap();
    assert_eq!(Value::parse_json(&text).unwrap(), encoded);

    // numeric keys go through the signature, the rest are written as they are
    let stringify = rt.run_type(indexed).json_stringify_fn().unwrap();
    assert_eq!(
        stringify
            .json_stringify(&value!({"name": "n", "1": 2, "tag": "t"}))
            .unwrap(),
        r#"{"name":"n","1":2,"tag":"t"}"#
    );
}

#[test]
fn stringify_text() {
    setup();
    let mut g = TypeGraph::new();
    let s = g.string();
    let n = g.number();
    let a = g.property("a", s);
    let b = g.optional_property("b", n);
    let obj = g.object_literal(vec![a, b]);
    let n = g.number();
    let s = g.string();
    let first = g.tuple_member(n);
    let second = g.optional_tuple_member(s);
    let pair = g.tuple(vec![first, second]);
    let key = g.string();
    let n = g.number();
    let sig = g.index_signature(key, n);
    let counts = g.object_literal(vec![sig]);
    let any = g.any();
    let loose = g.property("a", any);
    let loose = g.object_literal(vec![loose]);
    let rt = Runtime::new(g).unwrap();

    let obj = rt.run_type(obj).json_stringify_fn().unwrap();
    assert_eq!(obj.json_stringify(&value!({"a": "x\"y"})).unwrap(), r#"{"a":"x\"y"}"#);
    assert_eq!(obj.json_stringify(&value!({"a": "x", "b": 2})).unwrap(), r#"{"a":"x","b":2}"#);
    // undeclared keys are written after the declared ones
    assert_eq!(obj.json_stringify(&value!({"z": 1, "a": "x"})).unwrap(), r#"{"a":"x","z":1}"#);
    assert_eq!(
        obj.json_stringify(&object(vec![("a", value!("x")), ("u", Value::Undefined)])).unwrap(),
        r#"{"a":"x"}"#
    );

    let pair = rt.run_type(pair).json_stringify_fn().unwrap();
    assert_eq!(pair.json_stringify(&value!([1])).unwrap(), "[1]");
    assert_eq!(pair.json_stringify(&value!([1, "a"])).unwrap(), r#"[1,"a"]"#);

    let counts = rt.run_type(counts).json_stringify_fn().unwrap();
    assert_eq!(counts.json_stringify(&value!({"x": 1, "y": 2})).unwrap(), r#"{"x":1,"y":2}"#);
    assert_eq!(counts.json_stringify(&value!({})).unwrap(), "{}");

    let loose = rt.run_type(loose).json_stringify_fn().unwrap();
    assert_eq!(loose.json_stringify(&value!({})).unwrap(), "{}");
    assert_eq!(loose.json_stringify(&value!({"a": [1, null]})).unwrap(), r#"{"a":[1,null]}"#);
    assert_eq!(
        loose.json_stringify(&object(vec![("a", Value::BigInt(1))])),
        Err(RuntimeError::NotJsonSafe(ValueError::NotJsonSafe {
            type_name: "bigint"
        }))
    );
}

#[test]
fn unions_tag_the_first_matching_member() {
    setup();
    let mut g = TypeGraph::new();
    let a = g.literal("a");
    let s = g.string();
    let u = g.union(vec![a, s]);
    let rt = Runtime::new(g).unwrap();
    let encode = rt.run_type(u).json_encode_fn().unwrap();
    let decode = rt.run_type(u).json_decode_fn().unwrap();
    let stringify = rt.run_type(u).json_stringify_fn().unwrap();

    assert_eq!(encode.json_encode(&value!("a")).unwrap(), value!([0, "a"]));
    assert_eq!(encode.json_encode(&value!("b")).unwrap(), value!([1, "b"]));
    assert_eq!(stringify.json_stringify(&value!("b")).unwrap(), r#"[1,"b"]"#);
    assert_eq!(decode.json_decode(&value!([1, "b"])).unwrap(), value!("b"));

    assert!(matches!(
        encode.json_encode(&value!(1)),
        Err(RuntimeError::UnionMismatch {
            actual: "number",
            ..
        })
    ));
    assert!(matches!(
        stringify.json_stringify(&value!(true)),
        Err(RuntimeError::UnionMismatch {
            actual: "boolean",
            ..
        })
    ));
    assert_eq!(
        decode.json_decode(&value!([2, "b"])),
        Err(RuntimeError::UnionDiscriminator { members: 2 })
    );
    assert_eq!(
        decode.json_decode(&value!("b")),
        Err(RuntimeError::UnionDiscriminator { members: 2 })
    );
}

#[test]
fn wire_values_that_do_not_parse_are_errors() {
    setup();
    let mut g = TypeGraph::new();
    let d = g.date();
    let b = g.bigint();
    let rt = Runtime::new(g).unwrap();

    let decode = rt.run_type(d).json_decode_fn().unwrap();
    assert_eq!(
        decode.json_decode(&value!("2024-01-02T03:04:05.006Z")).unwrap(),
        Value::Date(1_704_164_645_006.0)
    );
    assert_eq!(
        decode.json_decode(&value!("tomorrow")),
        Err(RuntimeError::InvalidWireValue {
            expected: "date",
            actual: "string"
        })
    );

    let decode = rt.run_type(b).json_decode_fn().unwrap();
    assert_eq!(
        decode.json_decode(&value!(12)),
        Err(RuntimeError::InvalidWireValue {
            expected: "bigint",
            actual: "number"
        })
    );
    assert_eq!(
        decode.json_decode(&value!(i128::MAX.to_string())).unwrap(),
        Value::BigInt(i128::MAX)
    );
    // bigints are limited to the i128 range
    assert_eq!(
        decode.json_decode(&value!("170141183460469231731687303715884105728")),
        Err(RuntimeError::InvalidWireValue {
            expected: "bigint",
            actual: "string"
        })
    );
}

#[test]
fn never_throws_when_reached() {
    setup();
    let mut g = TypeGraph::new();
    let never = g.never();
    let a = g.property("a", never);
    let obj = g.object_literal(vec![a]);
    let rt = Runtime::new(g).unwrap();

    let encode = rt.run_type(obj).json_encode_fn().unwrap();
    assert_eq!(encode.json_encode(&value!({"a": 1})), Err(RuntimeError::Never));
}

#[test]
fn types_without_wire_form_pass_through() {
    setup();
    let mut g = TypeGraph::new();
    let s = g.string();
    let list = g.array(s);
    let rt = Runtime::new(g).unwrap();

    let encode = rt.run_type(list).json_encode_fn().unwrap();
    assert!(encode.dependencies().is_empty());
    assert_eq!(encode.json_encode(&value!(["a"])).unwrap(), value!(["a"]));
    let decode = rt.run_type(list).json_decode_fn().unwrap();
    assert_eq!(decode.json_decode(&value!(["a"])).unwrap(), value!(["a"]));
}

#[test]
fn classes_decode_only_when_rebuildable() {
    setup();
    let mut g = TypeGraph::new();
    let n = g.number();
    let x = g.property("x", n);
    let point = g.class("Point", vec![x]);
    let d = g.date();
    let opened = g.property("opened", d);
    let conn = g.opaque_class("Connection", vec![opened]);
    let rt = Runtime::new(g).unwrap();

    let decode = rt.run_type(point).json_decode_fn().unwrap();
    assert_eq!(decode.json_decode(&value!({"x": 1})).unwrap(), value!({"x": 1}));

    let before = rt.cached_functions();
    let err = rt.run_type(conn).json_decode_fn().unwrap_err();
    assert!(matches!(
        err,
        JitError::UnsupportedOperation {
            op: Operation::JsonDecode,
            kind: "class",
            ..
        }
    ));
    // a failed compilation leaves nothing behind
    assert_eq!(rt.cached_functions(), before);

    let encode = rt.run_type(conn).json_encode_fn().unwrap();
    assert_eq!(
        encode
            .json_encode(&object(vec![("opened", Value::Date(0.0))]))
            .unwrap(),
        value!({"opened": "1970-01-01T00:00:00.000Z"})
    );
}
