//! Deployment roles.
//!
//! Every role except `monitoring` manages its own services, so enabling it
//! replaces the default service set instead of adding to it.

use omnibus_settings::{
	Capabilities, Context, Edition, Handler, HandlerSlot, Registry, Result, RoleSpec, SettingsError,
};
use serde_json::Value;

use crate::redis::REDIS;
use crate::set_default;

pub fn register(registry: &mut Registry) -> Result<()> {
	registry.register_role(
		RoleSpec::new("application").handler(HandlerSlot::deferred(|| EnableGroup("rails"))),
	)?;
	registry.register_role(
		RoleSpec::new("redis_master").handler(HandlerSlot::deferred(|| RedisRole::Master)),
	)?;
	registry.register_role(
		RoleSpec::new("redis_replica").handler(HandlerSlot::deferred(|| RedisRole::Replica)),
	)?;
	registry.register_role(
		RoleSpec::new("redis_sentinel").handler(HandlerSlot::deferred(|| SentinelRole)),
	)?;
	registry.register_role(
		RoleSpec::new("postgres").handler(HandlerSlot::deferred(|| EnableGroup("postgres_role"))),
	)?;
	registry.register_role(
		RoleSpec::new("monitoring")
			.manage_services(false)
			.handler(HandlerSlot::deferred(|| EnableGroup("monitoring_role"))),
	)?;
	Ok(())
}

/// Enables one service group.
struct EnableGroup(&'static str);

impl Handler for EnableGroup {
	fn capabilities(&self) -> Capabilities {
		Capabilities::LOAD_ROLE
	}

	fn load_role(&self, ctx: &mut Context<'_>) -> Result<()> {
		ctx.enable_services(&[self.0])?;
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedisRole {
	Master,
	Replica,
}

impl RedisRole {
	fn name(self) -> &'static str {
		match self {
			Self::Master => "redis_master",
			Self::Replica => "redis_replica",
		}
	}

	fn other(self) -> Self {
		match self {
			Self::Master => Self::Replica,
			Self::Replica => Self::Master,
		}
	}
}

impl Handler for RedisRole {
	fn capabilities(&self) -> Capabilities {
		Capabilities::LOAD_ROLE
	}

	fn load_role(&self, ctx: &mut Context<'_>) -> Result<()> {
		if ctx.role_enabled(self.other().name()) {
			return Err(SettingsError::handler(
				format!("{}_role", self.name()),
				"redis_master_role and redis_replica_role cannot be enabled on the same node",
			));
		}
		set_default(
			ctx.settings,
			REDIS,
			"master",
			Value::Bool(*self == Self::Master),
		)?;
		ctx.enable_services(&["redis_node"])?;
		Ok(())
	}
}

struct SentinelRole;

impl Handler for SentinelRole {
	fn capabilities(&self) -> Capabilities {
		Capabilities::LOAD_ROLE
	}

	fn load_role(&self, ctx: &mut Context<'_>) -> Result<()> {
		if ctx.edition() != Edition::Ee {
			return Err(SettingsError::handler(
				"redis_sentinel_role",
				"redis sentinel is only available in the enterprise edition",
			));
		}
		ctx.enable_services(&["redis_sentinel_role"])?;
		Ok(())
	}
}
