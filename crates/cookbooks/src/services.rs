//! Managed services and their groups.
//!
//! A service is enabled when a role enables one of its groups, or by the
//! default role through [`DEFAULT_GROUP`]. [`SYSTEM_GROUP`] services run on
//! every node.

use omnibus_settings::{DEFAULT_GROUP, Registry, Result, SYSTEM_GROUP};

/// Service name and groups, in registration order.
pub const SERVICES: [(&str, &[&str]); 11] = [
	("logrotate", &[DEFAULT_GROUP, SYSTEM_GROUP]),
	("puma", &[DEFAULT_GROUP, "rails"]),
	("sidekiq", &[DEFAULT_GROUP, "rails"]),
	("gitlab-workhorse", &[DEFAULT_GROUP, "rails"]),
	("nginx", &[DEFAULT_GROUP, "rails"]),
	("redis", &[DEFAULT_GROUP, "redis", "redis_node"]),
	("redis-exporter", &[DEFAULT_GROUP, "redis", "redis_node"]),
	("sentinel", &["redis_sentinel_role"]),
	("postgresql", &[DEFAULT_GROUP, "postgres", "postgres_role"]),
	("node-exporter", &[
		DEFAULT_GROUP,
		"monitoring",
		"monitoring_role",
		"redis_node",
		"postgres_role",
	]),
	("prometheus", &[DEFAULT_GROUP, "monitoring", "monitoring_role"]),
];

pub fn register(registry: &mut Registry) -> Result<()> {
	for (service, groups) in SERVICES {
		registry.register_service(service, groups)?;
	}
	Ok(())
}
