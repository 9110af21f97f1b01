//! Managed services and the groups they belong to.
//!
//! Service modules declare each service once, together with its groups.
//! Enabling by name or by group writes `<service>.enable` into the live
//! settings, except where the user settings file set that flag explicitly.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use crate::error::{Result, SettingsError};
use crate::store::Settings;
use crate::value::node_attribute_key;

/// Services every node runs, independent of roles.
pub const SYSTEM_GROUP: &str = "system";
/// Services enabled when no service-managing role is active.
pub const DEFAULT_GROUP: &str = "default";

/// Registry of managed services keyed by setting key.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
	services: IndexMap<String, Vec<String>>,
}

impl ServiceRegistry {
	/// Declares a service and its groups.
	///
	/// Hyphenated service names are stored under their underscored setting key.
	pub fn register(&mut self, name: &str, groups: &[&str]) -> Result<()> {
		let key = node_attribute_key(name);
		if self.services.contains_key(&key) {
			return Err(SettingsError::DuplicateName {
				kind: "service",
				name: key,
			});
		}
		self.services
			.insert(key, groups.iter().map(|g| g.to_string()).collect());
		Ok(())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &[String])> {
		self.services.iter().map(|(k, v)| (k, v.as_slice()))
	}

	/// Whether `<service>.enable` is currently true.
	pub fn enabled(&self, settings: &Settings, name: &str) -> bool {
		settings.is_enabled(&node_attribute_key(name))
	}

	/// Enables services matching `names` (service names or groups).
	///
	/// Returns the setting keys that were written. Fails when a matched
	/// service's setting holds a scalar instead of a mapping.
	pub fn enable(
		&self,
		settings: &mut Settings,
		names: &[&str],
		except: &[&str],
	) -> Result<Vec<String>> {
		let names: Vec<String> = names.iter().map(|n| node_attribute_key(n)).collect();
		// System services are only touched when the system group is asked for.
		let protect_system = !names.iter().any(|n| n == SYSTEM_GROUP);

		let mut changed = Vec::new();
		for (service, groups) in &self.services {
			let selected = names.contains(service) || groups.iter().any(|g| names.contains(g));
			if !selected {
				continue;
			}
			let excepted = groups.iter().any(|g| {
				except.contains(&g.as_str()) || (protect_system && g == SYSTEM_GROUP)
			});
			if excepted || settings.user_configured(service, "enable") {
				continue;
			}
			settings.set_in(service, "enable", Value::Bool(true))?;
			trace!(service = %service, "service enabled");
			changed.push(service.clone());
		}
		Ok(changed)
	}

	pub fn enable_group(
		&self,
		settings: &mut Settings,
		group: &str,
		except: &[&str],
	) -> Result<Vec<String>> {
		self.enable(settings, &[group], except)
	}
}
