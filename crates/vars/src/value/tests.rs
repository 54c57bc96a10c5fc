use serde_json::json;

use super::*;

#[test]
fn all_value_is_recognised_in_both_shapes() {
	assert!(VariableValue::from(ALL_VALUE).is_all());
	assert!(VariableValue::from(vec![ALL_VALUE.to_string()]).is_all());
	assert!(!VariableValue::from("web").is_all());
}

#[test]
fn json_field_paths_resolve() {
	let value = VariableValue::Json(json!({ "labels": { "zone": "eu-1" }, "hosts": ["a", "b"] }));
	assert_eq!(value.field("labels.zone"), Some(VariableValue::Json(json!("eu-1"))));
	assert_eq!(value.field("hosts.1").map(|v| v.to_plain_string()), Some("b".to_string()));
	assert_eq!(value.field("labels.missing"), None);
}

#[test]
fn list_index_paths_resolve() {
	let value = VariableValue::from(vec!["x".to_string(), "y".to_string()]);
	assert_eq!(value.field("1"), Some(VariableValue::from("y")));
	assert_eq!(value.field("name"), None);
}

#[test]
fn custom_values_compare_by_rendering() {
	let a = VariableValue::Custom(Arc::new(CustomAllValue::new(".*")));
	let b = VariableValue::Custom(Arc::new(CustomAllValue::new(".*")));
	let c = VariableValue::Custom(Arc::new(CustomAllValue::new("*")));
	assert_eq!(a, b);
	assert_ne!(a, c);
	assert_ne!(a, VariableValue::from(".*"));
}

#[test]
fn text_display_joins_lists() {
	assert_eq!(VariableText::from(vec!["a".to_string(), "b".to_string()]).display(), "a + b");
	assert_eq!(VariableText::from("solo").display(), "solo");
}
