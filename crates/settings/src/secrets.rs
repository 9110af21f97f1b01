//! Secret generation stage.
//!
//! Persisted secrets are loaded into the live settings first, so handlers that
//! only generate missing values are idempotent across runs. Generation is
//! gated by `package.generate_default_secrets`; validation always runs so
//! user-supplied secrets are checked too. The recorded secret set is written
//! back unless `package.generate_secrets_json_file` is `false`.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ConfigWarning, Result};
use crate::handler::{Capabilities, Context, NodeIdentity, Stage, invoke};
use crate::registry::{Registry, sorted_attributes};
use crate::store::Settings;

pub mod store;


pub use store::{FileSecretStore, MemorySecretStore, SecretMap, SecretStore};

/// Settings section holding the packaging flags.
pub const PACKAGE_SECTION: &str = "package";

/// How a missing secret is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
	/// `n` random bytes, hex encoded (`2 * n` characters).
	Hex(usize),
	/// `n` random alphanumeric characters.
	Alphanumeric(usize),
}

impl SecretKind {
	pub fn generate(self) -> String {
		let mut rng = rand::rng();
		match self {
			Self::Hex(bytes) => {
				let mut buf = vec![0u8; bytes];
				rng.fill(buf.as_mut_slice());
				hex::encode(buf)
			}
			Self::Alphanumeric(len) => std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
				.take(len)
				.collect(),
		}
	}
}

/// Whether `package.generate_default_secrets` is anything but `false`.
pub fn generate_default_secrets(settings: &Settings) -> bool {
	settings.dig(&[PACKAGE_SECTION, "generate_default_secrets"]) != Some(&Value::Bool(false))
}

/// Whether `package.generate_secrets_json_file` is anything but `false`.
pub fn persist_secrets_file(settings: &Settings) -> bool {
	settings.dig(&[PACKAGE_SECTION, "generate_secrets_json_file"]) != Some(&Value::Bool(false))
}

/// Copies persisted secrets into the live settings where the key is unset.
///
/// Sections that do not name a mapping setting are skipped with a warning.
pub fn load_persisted(settings: &mut Settings, persisted: &SecretMap) -> Vec<ConfigWarning> {
	let mut warnings = Vec::new();
	for (section, values) in persisted {
		let Some(values) = values.as_object() else {
			continue;
		};
		let known = settings
			.get(section)
			.is_some_and(|current| current.is_object() || current.is_null());
		if !known {
			warn!(section = %section, "ignoring unknown section in secrets file");
			warnings.push(ConfigWarning::IgnoredSecretSection {
				section: section.clone(),
			});
			continue;
		}
		for (key, value) in values {
			if settings.dig(&[section, key]).is_some_and(|v| !v.is_null()) {
				continue;
			}
			// Only fails for scalars, which `known` already rules out.
			if settings.set_in(section, key, value.clone()).is_ok() {
				debug!(section = %section, key = %key, "loaded persisted secret");
			}
		}
	}
	warnings
}

/// Runs the secret stage for `node`.
///
/// Any handler failure aborts the stage before anything is written.
pub fn generate_secrets(
	registry: &mut Registry,
	node: &NodeIdentity,
	store: &mut dyn SecretStore,
) -> Result<Vec<ConfigWarning>> {
	let persisted = store.read()?;
	let Registry {
		attributes,
		services,
		settings,
		..
	} = registry;

	let mut warnings = load_persisted(settings, &persisted);
	// Sections of attributes outside the active edition survive the rewrite.
	settings.reset_secrets(persisted);

	let services = &*services;
	let generate = generate_default_secrets(settings);
	let sorted = sorted_attributes(attributes, settings.edition());

	if generate {
		info!(node = %node, "generating default secrets");
		for spec in &sorted {
			if !spec.capabilities().contains(Capabilities::PARSE_SECRETS) {
				continue;
			}
			if let Some(handler) = spec.get_handler() {
				invoke(Stage::Secrets, &spec.name, || {
					handler.parse_secrets(&mut Context::new(settings, services, node))
				})?;
			}
		}
	}

	for spec in &sorted {
		if !spec.capabilities().contains(Capabilities::VALIDATE_SECRETS) {
			continue;
		}
		if let Some(handler) = spec.get_handler() {
			invoke(Stage::ValidateSecrets, &spec.name, || {
				handler.validate_secrets(&mut Context::new(settings, services, node))
			})?;
		}
	}

	if !persist_secrets_file(settings) {
		if generate {
			let warning = ConfigWarning::SecretsNotPersisted;
			warn!(node = %node, "{warning}");
			warnings.push(warning);
		}
		return Ok(warnings);
	}

	info!(node = %node, sections = settings.secrets().len(), "writing secrets");
	store.write(settings.secrets())?;
	Ok(warnings)
}
