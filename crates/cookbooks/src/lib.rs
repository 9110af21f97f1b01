//! Service modules for the settings registry.
//!
//! Each module declares the attributes, handlers and roles of one area of
//! the distribution. [`register_all`] wires every module into a registry in
//! a fixed order; registration order only matters between attributes of equal
//! priority.

use omnibus_settings::value::is_unset;
use omnibus_settings::{Registry, Result, Settings};
use serde_json::Value;

pub mod gitlab;
pub mod monitoring;
pub mod package;
pub mod postgresql;
pub mod redis;
pub mod roles;
pub mod sentinel;
pub mod services;

/// Registers every service module.
pub fn register_all(registry: &mut Registry) -> Result<()> {
	package::register(registry)?;
	gitlab::register(registry)?;
	redis::register(registry)?;
	sentinel::register(registry)?;
	postgresql::register(registry)?;
	monitoring::register(registry)?;
	roles::register(registry)?;
	services::register(registry)?;
	Ok(())
}

/// A registry with every service module registered.
pub fn registry() -> Result<Registry> {
	let mut registry = Registry::new();
	register_all(&mut registry)?;
	Ok(registry)
}

/// Assigns `top.key = value` unless a value is already present.
pub(crate) fn set_default(settings: &mut Settings, top: &str, key: &str, value: Value) -> Result<()> {
	if is_unset(settings.dig(&[top, key])) {
		settings.set_in(top, key, value)?;
	}
	Ok(())
}

/// Reads `top.key` as an owned string, treating empty strings as unset.
pub(crate) fn string_in(settings: &Settings, top: &str, key: &str) -> Option<String> {
	settings
		.str_in(top, key)
		.filter(|value| !value.is_empty())
		.map(str::to_string)
}
