//! Helpers over structured setting values.
//!
//! Settings are plain [`serde_json::Value`]s. `Null` means "unset" and is
//! removed from the final tree; an empty object is the default for settings
//! that hold a mapping.

use serde_json::{Map, Value};

#[cfg(test)]
mod tests;

/// Maps a user-facing name to its node attribute key (hyphens become underscores).
pub fn node_attribute_key(name: &str) -> String {
	name.replace('-', "_")
}

/// Maps a setting key to its service name (underscores become hyphens).
pub fn service_name(name: &str) -> String {
	name.replace('_', "-")
}

/// Returns true when `value` is absent or `null`.
pub fn is_unset(value: Option<&Value>) -> bool {
	value.is_none_or(Value::is_null)
}

/// Follows `path` through nested objects.
pub fn dig<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
	path.iter().try_fold(value, |current, key| current.as_object()?.get(*key))
}

/// Merges `overlay` into `base`.
///
/// Objects merge key by key, recursively. Any other combination replaces
/// `base` with `overlay`.
pub fn deep_merge(base: &mut Value, overlay: Value) {
	match (base, overlay) {
		(Value::Object(base), Value::Object(overlay)) => {
			for (key, value) in overlay {
				match base.get_mut(&key) {
					Some(existing) => deep_merge(existing, value),
					None => {
						base.insert(key, value);
					}
				}
			}
		}
		(base, overlay) => *base = overlay,
	}
}

/// Removes every `null` entry from `map`, at every depth.
///
/// Objects nested inside arrays are stripped too; array elements themselves
/// are kept in place so positions stay stable.
pub fn strip_nils(map: Map<String, Value>) -> Map<String, Value> {
	map.into_iter()
		.filter(|(_, value)| !value.is_null())
		.map(|(key, value)| (key, strip_value(value)))
		.collect()
}

fn strip_value(value: Value) -> Value {
	match value {
		Value::Object(map) => Value::Object(strip_nils(map)),
		Value::Array(items) => Value::Array(items.into_iter().map(strip_value).collect()),
		other => other,
	}
}
