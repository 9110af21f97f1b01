//! Redis Sentinel (enterprise edition only).

use omnibus_settings::{
	AttributeSpec, Capabilities, Context, Handler, HandlerSlot, Registry, Result, SettingsError,
};
use serde_json::{Value, json};

use crate::redis::{DEFAULT_MASTER_NAME, DEFAULT_SENTINEL_PORT, REDIS};
use crate::{set_default, string_in};

pub const SENTINEL: &str = "sentinel";

pub fn register(registry: &mut Registry) -> Result<()> {
	registry.register_ee_attribute(
		AttributeSpec::new(SENTINEL)
			.top_level()
			.default_value(json!({ "port": DEFAULT_SENTINEL_PORT, "quorum": 1 }))
			.handler(HandlerSlot::deferred(|| Sentinel)),
	)?;
	Ok(())
}

/// Points the sentinel at the Redis master group.
struct Sentinel;

impl Handler for Sentinel {
	fn capabilities(&self) -> Capabilities {
		Capabilities::PARSE_VARIABLES
	}

	fn parse_variables(&self, ctx: &mut Context<'_>) -> Result<()> {
		if !ctx.service_enabled(SENTINEL) {
			return Ok(());
		}
		let settings = &mut *ctx.settings;
		if string_in(settings, REDIS, "master_ip").is_none() {
			return Err(SettingsError::handler(
				SENTINEL,
				"redis master_ip must be set when running sentinel",
			));
		}
		if string_in(settings, REDIS, "master_password").is_none() {
			return Err(SettingsError::handler(
				SENTINEL,
				"redis master_password must be set when running sentinel",
			));
		}
		let master_name =
			string_in(settings, REDIS, "master_name").unwrap_or_else(|| DEFAULT_MASTER_NAME.to_string());
		set_default(settings, SENTINEL, "master_name", Value::String(master_name))
	}
}
