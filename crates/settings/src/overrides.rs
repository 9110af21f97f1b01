//! Role overrides from a higher-precedence source.

use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::store::Settings;

/// Record of a role declaration replaced by a higher-precedence source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleOverride {
	/// Role setting key (`<name>_role`).
	pub role: String,
	/// The `enable` value that was replaced.
	pub previous: Value,
	pub value: bool,
	/// Source that won.
	pub source: String,
	/// Source that was overridden.
	pub overridden: String,
}

impl core::fmt::Display for RoleOverride {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		write!(
			f,
			"The '{}' is defined in {} as '{}' and overrides the setting in {}",
			self.role, self.source, self.value, self.overridden
		)
	}
}

/// Sets `role.enable = value` on behalf of `source`.
///
/// `None` leaves the role untouched. When the role already carried an explicit
/// `enable`, the replacement is logged and returned.
pub fn override_role(
	settings: &mut Settings,
	role: &str,
	value: Option<bool>,
	source: &str,
) -> Result<Option<RoleOverride>> {
	let Some(value) = value else {
		return Ok(None);
	};

	let notice = settings
		.dig(&[role, "enable"])
		.filter(|previous| !previous.is_null())
		.map(|previous| RoleOverride {
			role: role.to_string(),
			previous: previous.clone(),
			value,
			source: source.to_string(),
			overridden: settings.origin().to_string(),
		});
	if let Some(notice) = &notice {
		warn!(
			role,
			previous = %notice.previous,
			value,
			source,
			overridden = %notice.overridden,
			"role declaration overridden"
		);
	}

	settings.set_in(role, "enable", Value::Bool(value))?;
	Ok(notice)
}
