//! Subcommand implementations.

use std::io::Write;
use std::path::Path;

use anyhow::Context as _;
use omnibus_settings::value::service_name;
use omnibus_settings::{
	ClusterConfig, Edition, FileSecretStore, GeneratedConfig, NodeIdentity, Registry, Sources,
	generate_config, load_user_config,
};
use tracing::info;

use crate::cli::GenerateArgs;

/// Runs the pipeline for `args` and returns the generated configuration.
///
/// Nothing is written to the output when any stage fails.
pub fn generate(args: &GenerateArgs) -> anyhow::Result<GeneratedConfig> {
	let mut registry = omnibus_cookbooks::registry()?;
	load_user_config(&mut registry, &args.config)
		.with_context(|| format!("loading {}", args.config.display()))?;
	if let Some(edition) = args.edition {
		registry.settings_mut().set_edition(edition);
	}

	let cluster_path = args.cluster_path();
	let cluster = ClusterConfig::load(&cluster_path)
		.with_context(|| format!("loading {}", cluster_path.display()))?;
	let mut secrets = FileSecretStore::new(&args.secrets);

	let generated = generate_config(
		&mut registry,
		&NodeIdentity::new(args.node_name()),
		Sources {
			secrets: &mut secrets,
			cluster: &cluster,
		},
	)?;

	let rendered = serde_json::to_string_pretty(&generated.tree)?;
	match &args.output {
		Some(path) => {
			write_output(path, &rendered).with_context(|| format!("writing {}", path.display()))?;
			info!(path = %path.display(), "configuration written");
		}
		None => writeln!(std::io::stdout().lock(), "{rendered}")?,
	}
	Ok(generated)
}

/// Replaces `path` with `rendered` through a temp file in the same directory,
/// so a failed write leaves the previous file intact.
fn write_output(path: &Path, rendered: &str) -> anyhow::Result<()> {
	let dir = match path.parent() {
		Some(dir) if !dir.as_os_str().is_empty() => dir,
		_ => Path::new("."),
	};
	let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
	writeln!(tmp, "{rendered}")?;
	tmp.as_file().sync_all()?;
	tmp.persist(path)?;
	Ok(())
}

/// One line per materialized attribute, role and service.
pub fn attribute_listing(edition: Edition) -> anyhow::Result<Vec<String>> {
	let mut registry: Registry = omnibus_cookbooks::registry()?;
	registry.settings_mut().set_edition(edition);

	let mut lines: Vec<String> = registry
		.sorted_attributes()
		.into_iter()
		.map(|spec| {
			let path = match &spec.parent {
				Some(parent) => format!("{parent}.{}", spec.name),
				None => spec.name.clone(),
			};
			format!("{path}\tpriority={}", spec.priority)
		})
		.collect();
	lines.extend(registry.roles().map(|spec| {
		format!("roles.{}\tmanage_services={}", spec.name, spec.manage_services)
	}));
	lines.extend(registry.services().iter().map(|(service, groups)| {
		format!("services.{}\tgroups={}", service_name(service), groups.join(","))
	}));
	Ok(lines)
}
