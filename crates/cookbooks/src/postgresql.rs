//! Bundled PostgreSQL.

use omnibus_settings::{AttributeSpec, Capabilities, Context, Handler, HandlerSlot, Registry, Result};
use serde_json::{Value, json};

use crate::redis::RAILS;
use crate::set_default;

pub const POSTGRESQL: &str = "postgresql";
pub const DEFAULT_SOCKET_DIR: &str = "/var/opt/gitlab/postgresql";
pub const DEFAULT_PORT: u16 = 5432;

pub fn register(registry: &mut Registry) -> Result<()> {
	registry.register_attribute(
		AttributeSpec::new(POSTGRESQL)
			.top_level()
			.default_value(json!({
				"port": DEFAULT_PORT,
				"unix_socket_directory": DEFAULT_SOCKET_DIR
			}))
			.handler(HandlerSlot::deferred(|| Postgresql)),
	)?;
	Ok(())
}

/// Points rails at the bundled database when it runs on this node.
struct Postgresql;

impl Handler for Postgresql {
	fn capabilities(&self) -> Capabilities {
		Capabilities::PARSE_VARIABLES
	}

	fn parse_variables(&self, ctx: &mut Context<'_>) -> Result<()> {
		if !ctx.service_enabled(POSTGRESQL) {
			return Ok(());
		}
		let settings = &mut *ctx.settings;
		let socket_dir = settings
			.dig(&[POSTGRESQL, "unix_socket_directory"])
			.cloned()
			.unwrap_or_else(|| Value::from(DEFAULT_SOCKET_DIR));
		let port = settings
			.dig(&[POSTGRESQL, "port"])
			.cloned()
			.unwrap_or_else(|| Value::from(DEFAULT_PORT));
		set_default(settings, RAILS, "db_host", socket_dir)?;
		set_default(settings, RAILS, "db_port", port)
	}
}

#[cfg(test)]
mod tests {
	use omnibus_settings::{ClusterConfig, MemorySecretStore, NodeIdentity, Sources, generate_config};
	use pretty_assertions::assert_eq;

	use super::*;

	fn rails_db(config: &str) -> (Option<Value>, Option<Value>) {
		let mut registry = crate::registry().unwrap();
		omnibus_settings::apply_user_config(&mut registry, config).unwrap();
		let generated = generate_config(
			&mut registry,
			&NodeIdentity::new("db-1"),
			Sources {
				secrets: &mut MemorySecretStore::new(),
				cluster: &ClusterConfig::default(),
			},
		)
		.unwrap();
		let rails = generated.tree.dig(&["gitlab", "gitlab_rails"]).cloned();
		let field = |key: &str| rails.as_ref().and_then(|r| r.get(key)).cloned();
		(field("db_host"), field("db_port"))
	}

	#[test]
	fn test_local_database_feeds_rails() {
		assert_eq!(
			rails_db(""),
			(Some(json!(DEFAULT_SOCKET_DIR)), Some(json!(5432)))
		);
	}

	#[test]
	fn test_external_database_untouched() {
		let config = "[postgresql]\nenable = false\n\n[gitlab_rails]\ndb_host = \"db.example.com\"\n";
		assert_eq!(rails_db(config), (Some(json!("db.example.com")), None));
	}
}
