// The serde-facing surface: serialize through serde, bridge to and from
// serde_json values, and the Display rendering.

use jot_core::{parse, JsonArray, JsonObject, JsonValue, OpaqueValue};

#[test]
fn parsed_documents_serialize_through_serde() {
    let value = parse(r#"{"name":"imp","hp":12,"tags":["small","fiend"]}"#);
    let json = serde_json::to_value(&value).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"name": "imp", "hp": 12, "tags": ["small", "fiend"]})
    );
}

#[test]
fn serde_json_values_convert_both_ways() {
    let source = serde_json::json!({
        "enabled": true,
        "count": 3,
        "ratio": 0.75,
        "nested": {"empty": null}
    });
    let value = JsonValue::from(&source);
    assert_eq!(value.as_object().unwrap().get("count").as_int(0), 3);
    assert_eq!(serde_json::Value::from(&value), source);
}

#[test]
fn display_renders_the_serialized_form() {
    let object = JsonObject::new();
    object.set("b", 2);
    object.set("a", 1);
    assert_eq!(object.to_string(), r#"{"a":1,"b":2}"#);

    let array = JsonArray::new();
    array.push(JsonValue::Null);
    array.push("x");
    assert_eq!(array.to_string(), r#"[null,"x"]"#);

    assert_eq!(JsonValue::Float(1.5).to_string(), "1.5");
}

#[test]
fn opaque_values_render_their_type_name_in_the_serde_view() {
    struct Widget;
    let value = JsonValue::from(OpaqueValue::new(Widget));
    let json = serde_json::to_value(&value).unwrap();
    let name = json.as_str().expect("string view");
    assert!(name.contains("Widget"));
}

#[test]
fn container_string_views_serialize() {
    let object = JsonObject::new();
    object.set("k", 1);
    assert_eq!(JsonValue::Object(object).as_string(""), r#"{"k":1}"#);
}
