//! Cluster-wide role declarations.
//!
//! The cluster source is a JSON document shared by every node, mapping role
//! keys to `{ "enable": bool }`. Its declarations take precedence over the
//! node-local settings file.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SettingsError};
use crate::overrides::{RoleOverride, override_role};
use crate::registry::{RoleSpec, role_key};
use crate::store::Settings;

/// Default file name of the cluster source.
pub const CLUSTER_CONFIG_FILE: &str = "gitlab-cluster.json";

/// Role declarations read from the cluster source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
	source: String,
	roles: IndexMap<String, Option<bool>>,
}

impl Default for ClusterConfig {
	fn default() -> Self {
		Self::empty(CLUSTER_CONFIG_FILE)
	}
}

impl ClusterConfig {
	pub fn empty(source: impl Into<String>) -> Self {
		Self {
			source: source.into(),
			roles: IndexMap::new(),
		}
	}

	/// Reads the cluster source at `path`; a missing file declares nothing.
	pub fn load(path: &Path) -> Result<Self> {
		let source = path.display().to_string();
		match fs::read_to_string(path) {
			Ok(content) => Self::from_json(source, &content),
			Err(err) if err.kind() == ErrorKind::NotFound => {
				debug!(path = %source, "no cluster config");
				Ok(Self::empty(source))
			}
			Err(err) => Err(SettingsError::io(path)(err)),
		}
	}

	/// Parses a cluster document; `source` names it in override notices.
	pub fn from_json(source: impl Into<String>, input: &str) -> Result<Self> {
		let mut config = Self::empty(source);
		if input.trim().is_empty() {
			return Ok(config);
		}
		let Value::Object(document) = serde_json::from_str::<Value>(input)? else {
			return Err(SettingsError::invalid_value(
				config.source,
				"expected a JSON object",
			));
		};
		for (key, entry) in document {
			let enable = match entry.get("enable") {
				None | Some(Value::Null) => None,
				Some(Value::Bool(enable)) => Some(*enable),
				Some(other) => {
					return Err(SettingsError::invalid_value(
						format!("{key}.enable"),
						format!("expected a boolean, found {other}"),
					));
				}
			};
			config.roles.insert(normalize(&key), enable);
		}
		Ok(config)
	}

	/// Declares `role` (with or without the `_role` suffix).
	pub fn with_role(mut self, role: &str, enable: bool) -> Self {
		self.roles.insert(normalize(role), Some(enable));
		self
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// Declared enablement of `role`, `None` when not declared.
	pub fn role(&self, role: &str) -> Option<bool> {
		self.roles.get(&normalize(role)).copied().flatten()
	}

	pub fn roles(&self) -> impl Iterator<Item = (&str, Option<bool>)> {
		self.roles.iter().map(|(k, v)| (k.as_str(), *v))
	}

	/// Applies the declarations for `registered` roles through the override
	/// resolver, in the order the roles are given.
	///
	/// Declarations naming an unregistered role are ignored.
	pub fn apply_roles<'r>(
		&self,
		settings: &mut Settings,
		registered: impl IntoIterator<Item = &'r RoleSpec>,
	) -> Result<Vec<RoleOverride>> {
		let mut notices = Vec::new();
		let mut applied = Vec::new();
		for spec in registered {
			let key = spec.key();
			if let Some(notice) = override_role(settings, &key, self.role(&key), &self.source)? {
				notices.push(notice);
			}
			applied.push(key);
		}
		for (key, _) in self.roles().filter(|(key, _)| !applied.iter().any(|k| k == key)) {
			debug!(role = %key, source = %self.source, "ignoring unregistered cluster role");
		}
		Ok(notices)
	}
}

fn normalize(role: &str) -> String {
	if role.ends_with("_role") {
		role.to_string()
	} else {
		role_key(role)
	}
}
