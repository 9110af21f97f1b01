use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::handler::{Handler, HandlerSlot};
use crate::registry::AttributeSpec;

struct RedisMaster;

impl Handler for RedisMaster {
	fn capabilities(&self) -> Capabilities {
		Capabilities::LOAD_ROLE
	}

	fn load_role(&self, ctx: &mut Context<'_>) -> Result<()> {
		ctx.enable_services(&["redis_node"])?;
		Ok(())
	}
}

struct Monitoring {
	calls: Rc<RefCell<u32>>,
}

impl Handler for Monitoring {
	fn capabilities(&self) -> Capabilities {
		Capabilities::LOAD_ROLE
	}

	fn load_role(&self, ctx: &mut Context<'_>) -> Result<()> {
		*self.calls.borrow_mut() += 1;
		ctx.enable_services(&["monitoring_role"])?;
		Ok(())
	}
}

fn registry(monitoring_calls: Rc<RefCell<u32>>) -> Registry {
	let mut registry = Registry::new();
	for name in ["logrotate", "redis", "puma", "prometheus"] {
		registry.register_attribute(AttributeSpec::new(name)).unwrap();
	}
	registry.register_service("logrotate", &[DEFAULT_GROUP, SYSTEM_GROUP]).unwrap();
	registry.register_service("redis", &[DEFAULT_GROUP, "redis_node"]).unwrap();
	registry.register_service("puma", &[DEFAULT_GROUP, "rails"]).unwrap();
	registry.register_service("prometheus", &["monitoring_role"]).unwrap();
	registry
		.register_role(RoleSpec::new("redis_master").handler(HandlerSlot::deferred(|| RedisMaster)))
		.unwrap();
	registry
		.register_role(
			RoleSpec::new("monitoring")
				.manage_services(false)
				.handler(HandlerSlot::ready(Monitoring {
					calls: monitoring_calls,
				})),
		)
		.unwrap();
	registry
}

fn node() -> NodeIdentity {
	NodeIdentity::new("node-1")
}

fn enabled(registry: &Registry, service: &str) -> bool {
	registry.services().enabled(registry.settings(), service)
}

#[test]
fn test_no_roles_enables_default_and_system() {
	let mut registry = registry(Rc::default());
	let warnings = load_roles(&mut registry, &node(), &ClusterConfig::default()).unwrap();

	assert!(warnings.is_empty());
	assert!(enabled(&registry, "logrotate"));
	assert!(enabled(&registry, "redis"));
	assert!(enabled(&registry, "puma"));
	assert!(!enabled(&registry, "prometheus"));
}

#[test]
fn test_managing_role_suppresses_default_services() {
	let mut registry = registry(Rc::default());
	registry
		.settings_mut()
		.request_roles(["redis_master_role".to_string()]);

	load_roles(&mut registry, &node(), &ClusterConfig::default()).unwrap();

	assert!(registry.settings().is_enabled("redis_master_role"));
	assert!(enabled(&registry, "logrotate"));
	assert!(enabled(&registry, "redis"));
	assert!(!enabled(&registry, "puma"));
}

#[test]
fn test_non_managing_role_stacks_with_default() {
	let calls = Rc::new(RefCell::new(0));
	let mut registry = registry(calls.clone());
	registry.settings_mut().request_roles(["monitoring".to_string()]);

	load_roles(&mut registry, &node(), &ClusterConfig::default()).unwrap();

	assert_eq!(*calls.borrow(), 1);
	assert!(enabled(&registry, "prometheus"));
	assert!(enabled(&registry, "puma"));
}

#[test]
fn test_disabled_role_handler_not_invoked() {
	let calls = Rc::new(RefCell::new(0));
	let mut registry = registry(calls.clone());
	load_roles(&mut registry, &node(), &ClusterConfig::default()).unwrap();
	assert_eq!(*calls.borrow(), 0);
}

#[test]
fn test_unknown_roles_rejected() {
	let mut registry = registry(Rc::default());
	registry.settings_mut().request_roles([
		"redis_master_role".to_string(),
		"geo_primary_role".to_string(),
		"spam".to_string(),
	]);
	let err = load_roles(&mut registry, &node(), &ClusterConfig::default()).unwrap_err();
	assert!(matches!(
		err,
		SettingsError::UnknownRole(ref names) if names == &["geo_primary", "spam"]
	));
}

#[test]
fn test_cluster_overrides_local_role() {
	let mut registry = registry(Rc::default());
	registry
		.settings_mut()
		.apply_user("redis_master_role", json!({ "enable": true }));
	let cluster = ClusterConfig::empty("/etc/gitlab/gitlab-cluster.json").with_role("redis_master", false);

	let warnings = load_roles(&mut registry, &node(), &cluster).unwrap();

	assert!(!registry.settings().is_enabled("redis_master_role"));
	assert_eq!(warnings.len(), 1);
	let ConfigWarning::RoleOverridden(notice) = &warnings[0] else {
		panic!("expected a role override, got {:?}", warnings[0]);
	};
	assert_eq!(notice.role, "redis_master_role");
	assert_eq!(notice.source, "/etc/gitlab/gitlab-cluster.json");
	assert_eq!(notice.overridden, "gitlab.toml");
	// With the managing role gone, the default services come back.
	assert!(enabled(&registry, "puma"));
}

#[test]
fn test_cluster_enables_undeclared_role_silently() {
	let mut registry = registry(Rc::default());
	let cluster = ClusterConfig::empty("cluster").with_role("redis_master", true);
	let warnings = load_roles(&mut registry, &node(), &cluster).unwrap();
	assert!(warnings.is_empty());
	assert!(registry.settings().is_enabled("redis_master_role"));
	assert!(!enabled(&registry, "puma"));
}

#[test]
fn test_user_disabled_service_stays_disabled() {
	let mut registry = registry(Rc::default());
	registry.settings_mut().apply_user("puma", json!({ "enable": false }));
	load_roles(&mut registry, &node(), &ClusterConfig::default()).unwrap();
	assert!(!enabled(&registry, "puma"));
	assert!(enabled(&registry, "redis"));
}

#[test]
fn test_scalar_service_setting_fails_stage() {
	let mut registry = registry(Rc::default());
	registry.settings_mut().apply_user("puma", json!(false));
	let err = load_roles(&mut registry, &node(), &ClusterConfig::default()).unwrap_err();
	assert!(matches!(err, SettingsError::InvalidValue { ref key, .. } if key == "puma"));
}

#[test]
fn test_unregistered_cluster_role_ignored() {
	let mut registry = registry(Rc::default());
	let cluster = ClusterConfig::empty("cluster").with_role("geo_primary", true);
	let warnings = load_roles(&mut registry, &node(), &cluster).unwrap();
	assert!(warnings.is_empty());
	assert_eq!(registry.settings().get("geo_primary_role"), None);
	assert!(enabled(&registry, "puma"));
}
