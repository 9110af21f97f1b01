//! The live settings store.
//!
//! [`Settings`] holds the current value of every registered attribute and
//! role, keyed by the name it was registered under (`redis`, `gitlab_rails`,
//! `redis_master_role`). Registration seeds it with defaults, the user
//! settings file merges over those, and pipeline handlers read and write it
//! in priority order.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{Result, SettingsError};
use crate::value::{deep_merge, dig};

/// Name reported for the node-local settings source when no file was loaded.
pub const DEFAULT_ORIGIN: &str = "gitlab.toml";

/// Product edition the configuration is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Edition {
	/// Community edition.
	#[default]
	Ce,
	/// Enterprise edition; materializes edition-restricted attributes.
	Ee,
}

impl Edition {
	/// Returns true when an attribute with the given restriction is materialized.
	pub fn includes(self, edition_restricted: bool) -> bool {
		!edition_restricted || self == Edition::Ee
	}
}

impl FromStr for Edition {
	type Err = SettingsError;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_ascii_lowercase().as_str() {
			"ce" => Ok(Edition::Ce),
			"ee" => Ok(Edition::Ee),
			other => Err(SettingsError::invalid_value(
				"edition",
				format!("expected 'ce' or 'ee', got '{other}'"),
			)),
		}
	}
}

impl core::fmt::Display for Edition {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Ce => write!(f, "ce"),
			Self::Ee => write!(f, "ee"),
		}
	}
}

/// Active configuration values for one generation run.
#[derive(Debug, Clone)]
pub struct Settings {
	values: Map<String, Value>,
	/// Everything the user settings file assigned, for precedence checks.
	user: Map<String, Value>,
	/// Secrets recorded during the current run, by section.
	secrets: Map<String, Value>,
	/// Role names listed under `roles` in the user settings file.
	requested_roles: Vec<String>,
	edition: Edition,
	origin: String,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			values: Map::new(),
			user: Map::new(),
			secrets: Map::new(),
			requested_roles: Vec::new(),
			edition: Edition::default(),
			origin: DEFAULT_ORIGIN.to_string(),
		}
	}
}

impl Settings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values.get(key)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.values.contains_key(key)
	}

	/// Follows `path` from the top-level setting named by its first element.
	pub fn dig(&self, path: &[&str]) -> Option<&Value> {
		let (first, rest) = path.split_first()?;
		dig(self.values.get(*first)?, rest)
	}

	/// Reads `top.key` as a string.
	pub fn str_in(&self, top: &str, key: &str) -> Option<&str> {
		self.dig(&[top, key]).and_then(Value::as_str)
	}

	/// Replaces the whole value of a top-level setting.
	pub fn set(&mut self, key: impl Into<String>, value: Value) {
		self.values.insert(key.into(), value);
	}

	/// Assigns `top.key = value`, creating the `top` mapping when it is unset.
	///
	/// Fails when `top` holds a scalar.
	pub fn set_in(&mut self, top: &str, key: &str, value: Value) -> Result<()> {
		let slot = self
			.values
			.entry(top.to_string())
			.or_insert_with(|| Value::Object(Map::new()));
		if slot.is_null() {
			*slot = Value::Object(Map::new());
		}
		match slot {
			Value::Object(map) => {
				map.insert(key.to_string(), value);
				Ok(())
			}
			other => Err(SettingsError::invalid_value(
				top,
				format!("expected a mapping to assign '{key}', found {other}"),
			)),
		}
	}

	/// Merges a user-supplied value over the current one and remembers it.
	pub fn apply_user(&mut self, key: &str, value: Value) {
		deep_merge(
			self.values.entry(key.to_string()).or_insert(Value::Null),
			value.clone(),
		);
		deep_merge(
			self.user.entry(key.to_string()).or_insert(Value::Null),
			value,
		);
	}

	/// Whether the user settings file explicitly assigned `top.key`.
	pub fn user_configured(&self, top: &str, key: &str) -> bool {
		self.user
			.get(top)
			.and_then(|value| dig(value, &[key]))
			.is_some_and(|value| !value.is_null())
	}

	/// Whether `key.enable` is exactly `true`.
	pub fn is_enabled(&self, key: &str) -> bool {
		self.dig(&[key, "enable"]).and_then(Value::as_bool) == Some(true)
	}

	/// Records a secret value for persistence.
	pub fn record_secret(&mut self, section: &str, key: &str, value: Value) {
		let slot = self
			.secrets
			.entry(section.to_string())
			.or_insert_with(|| Value::Object(Map::new()));
		if !slot.is_object() {
			*slot = Value::Object(Map::new());
		}
		if let Some(map) = slot.as_object_mut() {
			map.insert(key.to_string(), value);
		}
	}

	/// Secrets recorded so far, by section.
	pub fn secrets(&self) -> &Map<String, Value> {
		&self.secrets
	}

	pub(crate) fn reset_secrets(&mut self, seed: Map<String, Value>) {
		self.secrets = seed;
	}

	/// Roles the user settings file lists under `roles`, as written.
	pub fn requested_roles(&self) -> &[String] {
		&self.requested_roles
	}

	pub fn request_roles(&mut self, roles: impl IntoIterator<Item = String>) {
		self.requested_roles.extend(roles);
	}

	pub fn edition(&self) -> Edition {
		self.edition
	}

	pub fn set_edition(&mut self, edition: Edition) {
		self.edition = edition;
	}

	/// Human-readable name of the node-local settings source.
	pub fn origin(&self) -> &str {
		&self.origin
	}

	pub fn set_origin(&mut self, origin: impl Into<String>) {
		self.origin = origin.into();
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.values.iter()
	}
}
