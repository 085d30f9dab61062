use runtype_value::{Value, value, wire};
use runtype_testhelpers::setup;

#[test]
fn macro_builds_nested_values() {
    setup();
    let v = value!({"a": [1, "two", null], "b": {"c": true}});
    assert_eq!(v.get("a").get_index(1), &Value::from("two"));
    assert_eq!(v.get("b").get("c"), &Value::Bool(true));
    assert!(v.get("a").get_index(2).is_null());
}

#[test]
fn dates_serialize_to_iso_strings() {
    setup();
    let v = Value::Array(vec![Value::Date(86_400_000.0), Value::Date(f64::NAN)]);
    insta::assert_snapshot!(v.to_json_string().unwrap(), @r#"["1970-01-02T00:00:00.000Z",null]"#);
}

#[test]
fn json_text_round_trip() {
    setup();
    let text = r#"{"id":12,"ratio":0.25,"name":"x","items":[{"k":false}],"none":null}"#;
    let v = Value::parse_json(text).unwrap();
    assert_eq!(v.to_json_string().unwrap(), text);
}

#[test]
fn wire_helpers_invert_each_other() {
    setup();
    let iso = wire::date_to_iso(1_234_567.0).unwrap();
    assert_eq!(wire::date_from_iso(&iso), Some(1_234_567.0));
    let re = wire::regexp_to_wire("^a+$", "i");
    assert_eq!(wire::regexp_from_wire(&re), Some(("^a+$".into(), "i".into())));
}
