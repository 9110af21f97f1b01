//! Attribute and role registration.
//!
//! Service modules populate a [`Registry`] once at startup. Each attribute is
//! a top-level setting with a default, an optional parent namespace, a
//! priority and an optional handler; each role is a setting named
//! `<name>_role` whose `enable` flag is resolved at generation time.
//!
//! ```ignore
//! registry.attribute_block("gitlab", |registry| {
//!     registry.register_attribute(
//!         AttributeSpec::new("gitlab_rails")
//!             .priority(15)
//!             .handler(HandlerSlot::deferred(|| GitlabRails)),
//!     )?;
//!     Ok(())
//! })?;
//! ```
//!
//! Registering `gitlab_rails` above sets `settings["gitlab_rails"] = {}`
//! right away; the generated tree carries it as `gitlab.gitlab_rails`.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{Result, SettingsError};
use crate::handler::{Capabilities, Handler, HandlerSlot};
use crate::services::ServiceRegistry;
use crate::store::{Edition, Settings};


/// Priority assigned when none is given; lower runs first.
pub const DEFAULT_PRIORITY: i32 = 20;

/// Output buckets that always exist.
pub const BASE_NAMESPACES: [&str; 3] = ["gitlab", "roles", "monitoring"];

const ROLE_SUFFIX: &str = "_role";

/// Setting key holding the configuration of role `name`.
pub fn role_key(name: &str) -> String {
	format!("{name}{ROLE_SUFFIX}")
}

/// Role name for a setting key, accepting keys with or without the suffix.
pub fn role_name(key: &str) -> &str {
	key.strip_suffix(ROLE_SUFFIX).unwrap_or(key)
}

/// Specification of a single attribute.
#[derive(Debug)]
pub struct AttributeSpec {
	pub name: String,
	/// Output namespace; `None` places the attribute at the top level.
	pub parent: Option<String>,
	pub priority: i32,
	/// Only materialized in the enterprise edition.
	pub edition_restricted: bool,
	pub default: Value,
	handler: HandlerSlot,
	parent_set: bool,
}

impl AttributeSpec {
	/// Creates a spec with priority 20, no restriction and an empty mapping default.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			parent: None,
			priority: DEFAULT_PRIORITY,
			edition_restricted: false,
			default: Value::Object(Map::new()),
			handler: HandlerSlot::None,
			parent_set: false,
		}
	}

	/// Sets the parent namespace, overriding the enclosing attribute block.
	pub fn parent(mut self, parent: impl Into<String>) -> Self {
		self.parent = Some(parent.into());
		self.parent_set = true;
		self
	}

	/// Places the attribute at the top level even inside an attribute block.
	pub fn top_level(mut self) -> Self {
		self.parent = None;
		self.parent_set = true;
		self
	}

	pub fn priority(mut self, priority: i32) -> Self {
		self.priority = priority;
		self
	}

	pub fn edition_restricted(mut self) -> Self {
		self.edition_restricted = true;
		self
	}

	pub fn default_value(mut self, default: Value) -> Self {
		self.default = default;
		self
	}

	/// Uses `null` as the default, for attributes holding non-mapping values.
	pub fn scalar(self) -> Self {
		self.default_value(Value::Null)
	}

	pub fn handler(mut self, handler: HandlerSlot) -> Self {
		self.handler = handler;
		self
	}

	pub fn get_handler(&self) -> Option<&dyn Handler> {
		self.handler.get()
	}

	pub fn capabilities(&self) -> Capabilities {
		self.handler.capabilities()
	}
}

/// Specification of a role.
#[derive(Debug)]
pub struct RoleSpec {
	pub name: String,
	/// Enabling a service-managing role suppresses the default service set.
	pub manage_services: bool,
	handler: HandlerSlot,
}

impl RoleSpec {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			manage_services: true,
			handler: HandlerSlot::None,
		}
	}

	pub fn manage_services(mut self, manage: bool) -> Self {
		self.manage_services = manage;
		self
	}

	pub fn handler(mut self, handler: HandlerSlot) -> Self {
		self.handler = handler;
		self
	}

	/// Setting key for this role (`<name>_role`).
	pub fn key(&self) -> String {
		role_key(&self.name)
	}

	pub fn get_handler(&self) -> Option<&dyn Handler> {
		self.handler.get()
	}

	pub fn capabilities(&self) -> Capabilities {
		self.handler.capabilities()
	}
}

/// Process-wide registry of attributes, roles, services and namespaces,
/// together with the live settings they populate.
#[derive(Debug)]
pub struct Registry {
	pub(crate) attributes: IndexMap<String, AttributeSpec>,
	pub(crate) roles: IndexMap<String, RoleSpec>,
	pub(crate) services: ServiceRegistry,
	pub(crate) namespaces: IndexSet<String>,
	pub(crate) settings: Settings,
	default_parent: Option<String>,
}

impl Default for Registry {
	fn default() -> Self {
		Self {
			attributes: IndexMap::new(),
			roles: IndexMap::new(),
			services: ServiceRegistry::default(),
			namespaces: BASE_NAMESPACES.iter().map(|ns| ns.to_string()).collect(),
			settings: Settings::new(),
			default_parent: None,
		}
	}
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an attribute and seeds its live value with the default.
	pub fn register_attribute(&mut self, mut spec: AttributeSpec) -> Result<&AttributeSpec> {
		if self.attributes.contains_key(&spec.name) {
			return Err(SettingsError::DuplicateName {
				kind: "attribute",
				name: spec.name,
			});
		}
		if !spec.parent_set {
			spec.parent = self.default_parent.clone();
		}
		trace!(
			attribute = %spec.name,
			parent = ?spec.parent,
			priority = spec.priority,
			"register attribute"
		);
		self.settings.set(spec.name.clone(), spec.default.clone());
		let (index, _) = self.attributes.insert_full(spec.name.clone(), spec);
		Ok(&self.attributes[index])
	}

	/// Registers an attribute only materialized in the enterprise edition.
	pub fn register_ee_attribute(&mut self, spec: AttributeSpec) -> Result<&AttributeSpec> {
		self.register_attribute(spec.edition_restricted())
	}

	/// Registers a role and seeds `<name>_role` with an empty mapping.
	pub fn register_role(&mut self, spec: RoleSpec) -> Result<&RoleSpec> {
		if self.roles.contains_key(&spec.name) {
			return Err(SettingsError::DuplicateName {
				kind: "role",
				name: spec.name,
			});
		}
		trace!(role = %spec.name, manage_services = spec.manage_services, "register role");
		self.settings.set(spec.key(), Value::Object(Map::new()));
		let (index, _) = self.roles.insert_full(spec.name.clone(), spec);
		Ok(&self.roles[index])
	}

	/// Runs `body` with `namespace` as the default parent for new attributes.
	///
	/// The previous default parent is restored afterwards, also when `body`
	/// returns an error.
	pub fn attribute_block<T>(
		&mut self,
		namespace: &str,
		body: impl FnOnce(&mut Self) -> Result<T>,
	) -> Result<T> {
		let previous = self.default_parent.replace(namespace.to_string());
		let result = body(self);
		self.default_parent = previous;
		result
	}

	/// Establishes an extra top-level output namespace.
	pub fn register_namespace(&mut self, namespace: &str) {
		self.namespaces.insert(namespace.to_string());
	}

	/// Declares a managed service and its groups.
	pub fn register_service(&mut self, name: &str, groups: &[&str]) -> Result<()> {
		self.services.register(name, groups)
	}

	pub fn default_parent(&self) -> Option<&str> {
		self.default_parent.as_deref()
	}

	pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
		self.attributes.get(name)
	}

	pub fn role(&self, name: &str) -> Option<&RoleSpec> {
		self.roles.get(role_name(name))
	}

	pub fn attributes(&self) -> impl Iterator<Item = &AttributeSpec> {
		self.attributes.values()
	}

	pub fn roles(&self) -> impl Iterator<Item = &RoleSpec> {
		self.roles.values()
	}

	pub fn namespaces(&self) -> impl Iterator<Item = &str> {
		self.namespaces.iter().map(String::as_str)
	}

	pub fn services(&self) -> &ServiceRegistry {
		&self.services
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn settings_mut(&mut self) -> &mut Settings {
		&mut self.settings
	}

	/// Attributes materialized in the active edition, by ascending priority.
	pub fn sorted_attributes(&self) -> Vec<&AttributeSpec> {
		sorted_attributes(&self.attributes, self.settings.edition())
	}
}

/// Edition-filtered attributes in ascending priority order.
///
/// The sort is stable, so equal priorities keep registration order.
pub(crate) fn sorted_attributes(
	attributes: &IndexMap<String, AttributeSpec>,
	edition: Edition,
) -> Vec<&AttributeSpec> {
	let mut sorted: Vec<&AttributeSpec> = attributes
		.values()
		.filter(|spec| edition.includes(spec.edition_restricted))
		.collect();
	sorted.sort_by_key(|spec| spec.priority);
	sorted
}
