//! Deferred handlers and the capabilities they expose to pipeline stages.
//!
//! Every attribute and role may carry a handler. A handler declares which
//! stage callbacks it implements through [`Capabilities`]; stages check the
//! declared set and only dispatch to capabilities that are present.
//!
//! Handlers are usually registered lazily through [`HandlerSlot::deferred`]:
//! the factory runs the first time anything asks the slot for its handler
//! (including a capability probe) and the instance is cached for the life of
//! the registry, so every stage of every run observes the same instance.

use std::cell::LazyCell;

use serde_json::Value;
use tracing::{debug, error};

use crate::error::Result;
use crate::registry::role_key;
use crate::secrets::SecretKind;
use crate::services::ServiceRegistry;
use crate::store::{Edition, Settings};

bitflags::bitflags! {
	/// Stage callbacks a handler implements.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct Capabilities: u8 {
		/// Produces secrets during the secret generation stage.
		const PARSE_SECRETS = 1 << 0;
		/// Validates secrets, whether generated or user supplied.
		const VALIDATE_SECRETS = 1 << 1;
		/// Enables services for an active role.
		const LOAD_ROLE = 1 << 2;
		/// Derives settings from other resolved settings.
		const PARSE_VARIABLES = 1 << 3;
	}
}

/// Stage callbacks for an attribute or role.
///
/// Only the callbacks named in [`Handler::capabilities`] are ever invoked.
pub trait Handler {
	/// Returns the callbacks this handler implements.
	fn capabilities(&self) -> Capabilities;

	fn parse_secrets(&self, _ctx: &mut Context<'_>) -> Result<()> {
		Ok(())
	}

	fn validate_secrets(&self, _ctx: &mut Context<'_>) -> Result<()> {
		Ok(())
	}

	fn load_role(&self, _ctx: &mut Context<'_>) -> Result<()> {
		Ok(())
	}

	fn parse_variables(&self, _ctx: &mut Context<'_>) -> Result<()> {
		Ok(())
	}
}

/// Factory producing a handler on first access.
pub type HandlerFactory = Box<dyn FnOnce() -> Box<dyn Handler>>;

/// Storage for an optional, possibly deferred handler.
#[derive(Default)]
pub enum HandlerSlot {
	/// No handler; every capability probe is empty.
	#[default]
	None,
	/// A ready instance.
	Ready(Box<dyn Handler>),
	/// A factory resolved on first access and cached afterwards.
	Deferred(LazyCell<Box<dyn Handler>, HandlerFactory>),
}

impl HandlerSlot {
	pub fn ready(handler: impl Handler + 'static) -> Self {
		Self::Ready(Box::new(handler))
	}

	pub fn deferred<F, H>(factory: F) -> Self
	where
		F: FnOnce() -> H + 'static,
		H: Handler + 'static,
	{
		let factory: HandlerFactory = Box::new(move || -> Box<dyn Handler> { Box::new(factory()) });
		Self::Deferred(LazyCell::new(factory))
	}

	/// Returns the handler, running a deferred factory if needed.
	pub fn get(&self) -> Option<&dyn Handler> {
		match self {
			Self::None => None,
			Self::Ready(handler) => Some(handler.as_ref()),
			Self::Deferred(cell) => Some(LazyCell::force(cell).as_ref()),
		}
	}

	/// Capabilities of the handler, or none when the slot is empty.
	pub fn capabilities(&self) -> Capabilities {
		self.get()
			.map(|handler| handler.capabilities())
			.unwrap_or_else(Capabilities::empty)
	}
}

impl core::fmt::Debug for HandlerSlot {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::None => write!(f, "HandlerSlot::None"),
			Self::Ready(_) => write!(f, "HandlerSlot::Ready"),
			Self::Deferred(_) => write!(f, "HandlerSlot::Deferred"),
		}
	}
}

/// Name of the node a configuration is generated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity(String);

impl NodeIdentity {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	pub fn name(&self) -> &str {
		&self.0
	}
}

impl core::fmt::Display for NodeIdentity {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.write_str(&self.0)
	}
}

/// Pipeline stage a handler is dispatched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Secrets,
	ValidateSecrets,
	Roles,
	Variables,
}

impl core::fmt::Display for Stage {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Secrets => write!(f, "parse_secrets"),
			Self::ValidateSecrets => write!(f, "validate_secrets"),
			Self::Roles => write!(f, "load_role"),
			Self::Variables => write!(f, "parse_variables"),
		}
	}
}

/// Runs one handler callback, logging dispatch and failure.
pub(crate) fn invoke(stage: Stage, name: &str, call: impl FnOnce() -> Result<()>) -> Result<()> {
	debug!(stage = %stage, name, "invoking handler");
	call().inspect_err(|err| error!(stage = %stage, name, %err, "handler failed"))
}

/// Shared state handed to handler callbacks.
///
/// Handlers run strictly one after another and see each other's writes.
pub struct Context<'a> {
	pub settings: &'a mut Settings,
	pub services: &'a ServiceRegistry,
	pub node: &'a NodeIdentity,
}

impl<'a> Context<'a> {
	pub fn new(
		settings: &'a mut Settings,
		services: &'a ServiceRegistry,
		node: &'a NodeIdentity,
	) -> Self {
		Self {
			settings,
			services,
			node,
		}
	}

	pub fn edition(&self) -> Edition {
		self.settings.edition()
	}

	/// Whether the role named `role` (without the `_role` suffix) is enabled.
	pub fn role_enabled(&self, role: &str) -> bool {
		self.settings.is_enabled(&role_key(role))
	}

	pub fn service_enabled(&self, service: &str) -> bool {
		self.services.enabled(self.settings, service)
	}

	/// Enables services by name or group.
	pub fn enable_services(&mut self, names: &[&str]) -> Result<Vec<String>> {
		self.services.enable(self.settings, names, &[])
	}

	/// Makes sure `section.key` holds a secret and records it for persistence.
	///
	/// An existing value (user supplied or loaded from the secret store) is
	/// kept; otherwise a new one is generated from `kind`.
	pub fn ensure_secret(&mut self, section: &str, key: &str, kind: SecretKind) -> Result<()> {
		let existing = self
			.settings
			.dig(&[section, key])
			.filter(|value| !value.is_null())
			.cloned();
		let value = match existing {
			Some(existing) => existing,
			None => {
				let generated = Value::String(kind.generate());
				self.settings.set_in(section, key, generated.clone())?;
				debug!(section, key, node = %self.node, "generated secret");
				generated
			}
		};
		self.settings.record_secret(section, key, value);
		Ok(())
	}
}
