//! Packaging flags consulted by the secret stage.

use omnibus_settings::secrets::PACKAGE_SECTION;
use omnibus_settings::{AttributeSpec, Registry, Result};
use serde_json::json;

pub fn register(registry: &mut Registry) -> Result<()> {
	registry.register_attribute(
		AttributeSpec::new(PACKAGE_SECTION)
			.top_level()
			.priority(5)
			.default_value(json!({
				"generate_default_secrets": true,
				"generate_secrets_json_file": true
			})),
	)?;
	Ok(())
}
