//! Variable parsing stage.

use tracing::info;

use crate::error::Result;
use crate::handler::{Capabilities, Context, NodeIdentity, Stage, invoke};
use crate::registry::{Registry, sorted_attributes};

/// Invokes every `parse_variables` handler in ascending priority order.
///
/// Handlers share the live settings; a later priority observes, and may
/// overwrite, what earlier ones wrote.
pub fn parse_variables(registry: &mut Registry, node: &NodeIdentity) -> Result<()> {
	let Registry {
		attributes,
		services,
		settings,
		..
	} = registry;
	let services = &*services;
	info!(node = %node, "parsing variables");

	for spec in sorted_attributes(attributes, settings.edition()) {
		if !spec.capabilities().contains(Capabilities::PARSE_VARIABLES) {
			continue;
		}
		if let Some(handler) = spec.get_handler() {
			invoke(Stage::Variables, &spec.name, || {
				handler.parse_variables(&mut Context::new(settings, services, node))
			})?;
		}
	}
	Ok(())
}
