use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};

use super::*;

fn object(value: Value) -> Map<String, Value> {
	match value {
		Value::Object(map) => map,
		other => panic!("expected object, got {other}"),
	}
}

#[test]
fn test_node_attribute_key_replaces_hyphens() {
	assert_eq!(node_attribute_key("gitlab-workhorse"), "gitlab_workhorse");
	assert_eq!(node_attribute_key("redis"), "redis");
}

#[test]
fn test_service_name_replaces_underscores() {
	assert_eq!(service_name("node_exporter"), "node-exporter");
}

#[test]
fn test_dig_nested() {
	let value = json!({ "a": { "b": { "c": 1 } } });
	assert_eq!(dig(&value, &["a", "b", "c"]), Some(&json!(1)));
	assert_eq!(dig(&value, &["a", "x"]), None);
	assert_eq!(dig(&value, &["a", "b", "c", "d"]), None);
	assert_eq!(dig(&value, &[]), Some(&value));
}

#[test]
fn test_deep_merge_objects_and_scalars() {
	let mut base = json!({ "enable": false, "nested": { "a": 1, "b": 2 }, "list": [1] });
	deep_merge(
		&mut base,
		json!({ "enable": true, "nested": { "b": 3 }, "list": [2, 3], "new": "x" }),
	);
	assert_eq!(
		base,
		json!({ "enable": true, "nested": { "a": 1, "b": 3 }, "list": [2, 3], "new": "x" })
	);
}

#[test]
fn test_deep_merge_replaces_null_base() {
	let mut base = Value::Null;
	deep_merge(&mut base, json!("value"));
	assert_eq!(base, json!("value"));
}

#[test]
fn test_strip_nils_recursive() {
	let input = object(json!({
		"keep": 1,
		"drop": null,
		"nested": { "drop": null, "deeper": { "drop": null, "keep": "x" } },
		"list": [{ "drop": null, "keep": true }, null, 3],
	}));
	assert_eq!(
		Value::Object(strip_nils(input)),
		json!({
			"keep": 1,
			"nested": { "deeper": { "keep": "x" } },
			"list": [{ "keep": true }, null, 3],
		})
	);
}

#[test]
fn test_strip_nils_keeps_empty_objects() {
	let input = object(json!({ "empty": {}, "nested": { "only": null } }));
	assert_eq!(
		Value::Object(strip_nils(input)),
		json!({ "empty": {}, "nested": {} })
	);
}

fn arb_value() -> impl Strategy<Value = Value> {
	let leaf = prop_oneof![
		Just(Value::Null),
		any::<bool>().prop_map(Value::Bool),
		any::<i64>().prop_map(Value::from),
		"[a-z]{0,6}".prop_map(Value::String),
	];
	leaf.prop_recursive(4, 32, 6, |inner| {
		prop_oneof![
			prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
			prop::collection::btree_map("[a-z_-]{1,6}", inner, 0..5)
				.prop_map(|m| Value::Object(m.into_iter().collect())),
		]
	})
}

fn contains_null_key(value: &Value) -> bool {
	match value {
		Value::Object(map) => map.values().any(|v| v.is_null() || contains_null_key(v)),
		Value::Array(items) => items.iter().any(contains_null_key),
		_ => false,
	}
}

proptest! {
	#[test]
	fn prop_node_key_inverts_service_name(name in "[a-z][a-z_]{0,16}") {
		prop_assert_eq!(node_attribute_key(&service_name(&name)), name);
	}

	#[test]
	fn prop_service_name_inverts_node_key(name in "[a-z][a-z-]{0,16}") {
		prop_assert_eq!(service_name(&node_attribute_key(&name)), name);
	}

	#[test]
	fn prop_strip_nils_is_idempotent(map in prop::collection::btree_map("[a-z]{1,4}", arb_value(), 0..6)) {
		let map: Map<String, Value> = map.into_iter().collect();
		let once = strip_nils(map);
		let twice = strip_nils(once.clone());
		prop_assert_eq!(&once, &twice);
		prop_assert!(!contains_null_key(&Value::Object(once)));
	}
}
