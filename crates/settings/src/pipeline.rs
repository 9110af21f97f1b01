//! Generation entry point.
//!
//! Runs secrets, roles, variables and the tree builder in that order. The
//! first failing stage aborts the run; nothing downstream executes and no
//! tree is returned.

use tracing::{info, warn};

use crate::cluster::ClusterConfig;
use crate::error::{ConfigWarning, Result};
use crate::handler::NodeIdentity;
use crate::registry::Registry;
use crate::roles::load_roles;
use crate::sanitize::{ResolvedConfig, build_output_tree};
use crate::secrets::{SecretStore, generate_secrets};
use crate::variables::parse_variables;

/// External collaborators consulted during generation.
pub struct Sources<'a> {
	pub secrets: &'a mut dyn SecretStore,
	pub cluster: &'a ClusterConfig,
}

/// Result of a successful generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedConfig {
	pub tree: ResolvedConfig,
	/// Non-fatal conditions, in the order they were raised.
	pub warnings: Vec<ConfigWarning>,
}

/// Generates the configuration tree for `node`.
pub fn generate_config(
	registry: &mut Registry,
	node: &NodeIdentity,
	sources: Sources<'_>,
) -> Result<GeneratedConfig> {
	info!(node = %node, edition = %registry.settings().edition(), "generating configuration");

	let mut warnings = generate_secrets(registry, node, sources.secrets)?;
	warnings.extend(load_roles(registry, node, sources.cluster)?);
	parse_variables(registry, node)?;
	let tree = build_output_tree(registry)?;

	if !warnings.is_empty() {
		warn!(node = %node, count = warnings.len(), "configuration generated with warnings");
	}
	Ok(GeneratedConfig { tree, warnings })
}
