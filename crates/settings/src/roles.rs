//! Role loading stage.
//!
//! Resolves which roles are active on this node and lets each active role
//! enable its services:
//!
//! 1. system services are enabled unconditionally;
//! 2. roles listed under `roles` in the user settings file are enabled;
//! 3. the cluster source overrides any role it declares;
//! 4. without an active service-managing role, the default services are enabled;
//! 5. every active role with [`Capabilities::LOAD_ROLE`] runs, in registration order.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::cluster::ClusterConfig;
use crate::error::{ConfigWarning, Result, SettingsError};
use crate::handler::{Capabilities, Context, NodeIdentity, Stage, invoke};
use crate::registry::{Registry, RoleSpec, role_key, role_name};
use crate::services::{DEFAULT_GROUP, SYSTEM_GROUP, ServiceRegistry};
use crate::store::Settings;

#[cfg(test)]
mod tests;

/// Runs the role stage for `node`.
pub fn load_roles(
	registry: &mut Registry,
	node: &NodeIdentity,
	cluster: &ClusterConfig,
) -> Result<Vec<ConfigWarning>> {
	let Registry {
		roles,
		services,
		settings,
		..
	} = registry;
	let services = &*services;
	info!(node = %node, "loading roles");

	services.enable_group(settings, SYSTEM_GROUP, &[])?;
	parse_enabled(roles, settings)?;

	let warnings = cluster
		.apply_roles(settings, roles.values())?
		.into_iter()
		.map(ConfigWarning::RoleOverridden)
		.collect();

	load_default_role(roles, services, settings)?;

	for spec in roles.values() {
		if !settings.is_enabled(&spec.key()) {
			continue;
		}
		if !spec.capabilities().contains(Capabilities::LOAD_ROLE) {
			continue;
		}
		if let Some(handler) = spec.get_handler() {
			invoke(Stage::Roles, &spec.name, || {
				handler.load_role(&mut Context::new(settings, services, node))
			})?;
		}
	}
	Ok(warnings)
}

/// Enables the roles listed under `roles` in the user settings file.
///
/// Entries may carry the `_role` suffix. Unknown names fail together.
fn parse_enabled(roles: &IndexMap<String, RoleSpec>, settings: &mut Settings) -> Result<()> {
	let requested: Vec<String> = settings
		.requested_roles()
		.iter()
		.map(|role| role_name(role.trim()).to_string())
		.collect();
	let unknown: Vec<String> = requested
		.iter()
		.filter(|role| !roles.contains_key(role.as_str()))
		.cloned()
		.collect();
	if !unknown.is_empty() {
		return Err(SettingsError::UnknownRole(unknown));
	}
	for role in requested {
		debug!(role = %role, "role enabled by settings file");
		settings.set_in(&role_key(&role), "enable", Value::Bool(true))?;
	}
	Ok(())
}

/// Enables the default services unless a service-managing role is active.
fn load_default_role(
	roles: &IndexMap<String, RoleSpec>,
	services: &ServiceRegistry,
	settings: &mut Settings,
) -> Result<()> {
	let managed = roles
		.values()
		.find(|spec| spec.manage_services && settings.is_enabled(&spec.key()));
	match managed {
		Some(spec) => debug!(role = %spec.name, "default services left to role"),
		None => {
			let enabled = services.enable_group(settings, DEFAULT_GROUP, &[])?;
			debug!(services = enabled.len(), "default role enabled");
		}
	}
	Ok(())
}
