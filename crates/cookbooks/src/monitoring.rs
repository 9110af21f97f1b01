//! The `monitoring` namespace: Prometheus and its exporters.

use omnibus_settings::{AttributeSpec, Capabilities, Context, Handler, HandlerSlot, Registry, Result};
use serde_json::{Value, json};
use tracing::debug;

use crate::string_in;

pub const MONITORING_NAMESPACE: &str = "monitoring";
pub const PROMETHEUS: &str = "prometheus";

/// Exporters scraped when enabled: setting key, job name, default address.
pub const EXPORTERS: [(&str, &str, &str); 2] = [
	("node_exporter", "node", "localhost:9100"),
	("redis_exporter", "redis", "localhost:9121"),
];

pub fn register(registry: &mut Registry) -> Result<()> {
	registry.attribute_block(MONITORING_NAMESPACE, |registry| {
		// Runs last so every service has settled its enablement and address.
		registry.register_attribute(
			AttributeSpec::new(PROMETHEUS)
				.priority(30)
				.default_value(json!({ "listen_address": "localhost:9090" }))
				.handler(HandlerSlot::deferred(|| Prometheus)),
		)?;
		for (exporter, _, address) in EXPORTERS {
			registry.register_attribute(
				AttributeSpec::new(exporter).default_value(json!({ "listen_address": address })),
			)?;
		}
		Ok(())
	})
}

/// Builds the scrape configuration from the exporters enabled on this node.
struct Prometheus;

impl Handler for Prometheus {
	fn capabilities(&self) -> Capabilities {
		Capabilities::PARSE_VARIABLES
	}

	fn parse_variables(&self, ctx: &mut Context<'_>) -> Result<()> {
		if !ctx.service_enabled(PROMETHEUS) {
			return Ok(());
		}

		let mut jobs = vec![scrape_job(
			"prometheus",
			&string_in(ctx.settings, PROMETHEUS, "listen_address").unwrap_or_default(),
		)];
		for (exporter, job, default_address) in EXPORTERS {
			if !ctx.service_enabled(exporter) {
				continue;
			}
			let address = string_in(ctx.settings, exporter, "listen_address")
				.unwrap_or_else(|| default_address.to_string());
			jobs.push(scrape_job(job, &address));
		}
		debug!(jobs = jobs.len(), "prometheus scrape jobs");

		// User supplied jobs are kept after the generated ones.
		if let Some(Value::Array(custom)) = ctx.settings.dig(&[PROMETHEUS, "scrape_configs"]) {
			jobs.extend(custom.iter().cloned());
		}
		ctx.settings
			.set_in(PROMETHEUS, "scrape_configs", Value::Array(jobs))
	}
}

fn scrape_job(name: &str, target: &str) -> Value {
	json!({
		"job_name": name,
		"static_configs": [{ "targets": [target] }]
	})
}

#[cfg(test)]
mod tests {
	use omnibus_settings::{
		ClusterConfig, GeneratedConfig, MemorySecretStore, NodeIdentity, Sources, apply_user_config,
		generate_config,
	};
	use pretty_assertions::assert_eq;

	use super::*;

	fn generate(config: &str, cluster: &ClusterConfig) -> GeneratedConfig {
		let mut registry = crate::registry().unwrap();
		apply_user_config(&mut registry, config).unwrap();
		generate_config(
			&mut registry,
			&NodeIdentity::new("monitor-1"),
			Sources {
				secrets: &mut MemorySecretStore::new(),
				cluster,
			},
		)
		.unwrap()
	}

	fn job_names(generated: &GeneratedConfig) -> Vec<String> {
		generated
			.tree
			.dig(&["monitoring", "prometheus", "scrape_configs"])
			.and_then(Value::as_array)
			.map(|jobs| {
				jobs.iter()
					.filter_map(|job| job["job_name"].as_str().map(str::to_string))
					.collect()
			})
			.unwrap_or_default()
	}

	#[test]
	fn test_default_node_scrapes_all_exporters() {
		let generated = generate("", &ClusterConfig::default());
		assert_eq!(job_names(&generated), vec!["prometheus", "node", "redis"]);
	}

	#[test]
	fn test_disabled_exporter_not_scraped() {
		let generated = generate("[redis_exporter]\nenable = false\n", &ClusterConfig::default());
		assert_eq!(job_names(&generated), vec!["prometheus", "node"]);
	}

	#[test]
	fn test_custom_jobs_appended() {
		let generated = generate(
			r#"
[[prometheus.scrape_configs]]
job_name = "custom"
"#,
			&ClusterConfig::default(),
		);
		assert_eq!(
			job_names(&generated),
			vec!["prometheus", "node", "redis", "custom"]
		);
	}

	#[test]
	fn test_prometheus_off_on_redis_node() {
		let cluster = ClusterConfig::empty("cluster").with_role("redis_master", true);
		let generated = generate("", &cluster);
		assert!(job_names(&generated).is_empty());
		assert_eq!(
			generated.tree.dig(&["monitoring", "node_exporter", "enable"]),
			Some(&json!(true))
		);
	}
}
