//! User settings file.
//!
//! The node-local settings are a TOML document whose top-level keys are
//! registered attribute names or role keys:
//!
//! ```toml
//! roles = ["redis_master_role"]
//! edition = "ee"
//! external_url = "https://gitlab.example.com"
//!
//! [redis]
//! port = 6380
//! password = "secret"
//!
//! [monitoring_role]
//! enable = true
//! ```
//!
//! `roles` and `edition` are reserved. Every other key must name a registered
//! setting; anything else is rejected as [`SettingsError::UnknownSetting`] so
//! spelling mistakes fail loudly instead of being ignored. Tables merge over
//! the registered defaults, scalars replace them.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Result, SettingsError};
use crate::registry::Registry;
use crate::store::Edition;

/// Default location of the user settings file.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/gitlab/gitlab.toml";

const ROLES_KEY: &str = "roles";
const EDITION_KEY: &str = "edition";

/// Loads the settings file at `path` into `registry`.
///
/// A missing file leaves the defaults in place. The path becomes the origin
/// named in role override notices.
pub fn load_user_config(registry: &mut Registry, path: &Path) -> Result<()> {
	let input = match fs::read_to_string(path) {
		Ok(input) => input,
		Err(err) if err.kind() == ErrorKind::NotFound => {
			info!(path = %path.display(), "no settings file, using defaults");
			return Ok(());
		}
		Err(err) => return Err(SettingsError::io(path)(err)),
	};
	registry.settings_mut().set_origin(path.display().to_string());
	apply_user_config(registry, &input)
}

/// Parses a TOML settings document and applies it.
pub fn apply_user_config(registry: &mut Registry, input: &str) -> Result<()> {
	let table: toml::Table = toml::from_str(input)?;
	match serde_json::to_value(table)? {
		Value::Object(values) => apply_user_values(registry, values),
		_ => Ok(()),
	}
}

/// Applies already-parsed user values.
///
/// All keys are checked before anything is applied, so a rejected document
/// leaves the registry untouched.
pub fn apply_user_values(registry: &mut Registry, mut values: Map<String, Value>) -> Result<()> {
	let edition = values
		.remove(EDITION_KEY)
		.map(|value| match value {
			Value::String(edition) => edition.parse::<Edition>(),
			other => Err(SettingsError::invalid_value(
				EDITION_KEY,
				format!("expected a string, found {other}"),
			)),
		})
		.transpose()?;
	let roles = values.remove(ROLES_KEY).map(parse_roles_list).transpose()?;

	if let Some(unknown) = values.keys().find(|key| !is_registered(registry, key)) {
		return Err(SettingsError::UnknownSetting(unknown.clone()));
	}

	let settings = registry.settings_mut();
	if let Some(edition) = edition {
		settings.set_edition(edition);
	}
	if let Some(roles) = roles {
		settings.request_roles(roles);
	}
	for (key, value) in values {
		debug!(setting = %key, "user setting");
		settings.apply_user(&key, value);
	}
	Ok(())
}

fn is_registered(registry: &Registry, key: &str) -> bool {
	registry.attribute(key).is_some()
		|| (key.ends_with("_role") && registry.role(key).is_some())
}

fn parse_roles_list(value: Value) -> Result<Vec<String>> {
	let Value::Array(items) = value else {
		return Err(SettingsError::invalid_value(ROLES_KEY, "expected an array of role names"));
	};
	items
		.into_iter()
		.map(|item| match item {
			Value::String(role) => Ok(role),
			other => Err(SettingsError::invalid_value(
				ROLES_KEY,
				format!("expected a role name, found {other}"),
			)),
		})
		.collect()
}
