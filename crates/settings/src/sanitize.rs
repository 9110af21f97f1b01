//! Output tree construction.
//!
//! Attributes are grouped under their parent namespace, roles under `roles`,
//! and every `null` is stripped at every depth.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SettingsError};
use crate::registry::Registry;
use crate::value::{dig, node_attribute_key, strip_nils};


/// The generated configuration tree for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedConfig(Map<String, Value>);

impl ResolvedConfig {
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// Follows `path` from the root of the tree.
	pub fn dig(&self, path: &[&str]) -> Option<&Value> {
		let (first, rest) = path.split_first()?;
		dig(self.0.get(*first)?, rest)
	}

	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}

	pub fn into_inner(self) -> Map<String, Value> {
		self.0
	}
}

impl From<ResolvedConfig> for Value {
	fn from(config: ResolvedConfig) -> Self {
		Value::Object(config.0)
	}
}

/// Groups live values by namespace without stripping nulls.
pub fn sanitized_config(registry: &Registry) -> Result<Map<String, Value>> {
	let mut results: Map<String, Value> = registry
		.namespaces()
		.map(|ns| (ns.to_string(), Value::Object(Map::new())))
		.collect();

	for spec in registry.sorted_attributes() {
		let value = registry
			.settings()
			.get(&spec.name)
			.cloned()
			.unwrap_or(Value::Null);
		let key = node_attribute_key(&spec.name);
		let Some(parent) = &spec.parent else {
			results.insert(key, value);
			continue;
		};
		match results.get_mut(parent).and_then(Value::as_object_mut) {
			Some(bucket) => {
				bucket.insert(key, value);
			}
			None => {
				return Err(SettingsError::InvalidParent {
					key: spec.name.clone(),
					parent: parent.clone(),
				});
			}
		}
	}

	let mut roles = Map::new();
	for spec in registry.roles() {
		let value = registry
			.settings()
			.get(&spec.key())
			.cloned()
			.unwrap_or(Value::Null);
		roles.insert(node_attribute_key(&spec.name), value);
	}
	match results.get_mut("roles").and_then(Value::as_object_mut) {
		Some(bucket) => bucket.extend(roles),
		None => {
			results.insert("roles".to_string(), Value::Object(roles));
		}
	}
	Ok(results)
}

/// Builds the final tree: [`sanitized_config`] with nulls stripped.
pub fn build_output_tree(registry: &Registry) -> Result<ResolvedConfig> {
	let tree = strip_nils(sanitized_config(registry)?);
	debug!(keys = tree.len(), "output tree built");
	Ok(ResolvedConfig(tree))
}
