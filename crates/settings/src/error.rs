//! Error and warning types for settings registration and generation.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::overrides::RoleOverride;

/// Errors raised while registering settings or generating the output tree.
///
/// Registration errors (`DuplicateName`) are programmer errors and abort
/// startup. Everything else surfaces from [`generate_config`] and aborts the
/// run before anything is persisted.
///
/// [`generate_config`]: crate::pipeline::generate_config
#[derive(Debug, Error)]
pub enum SettingsError {
	/// An attribute, role or service name was registered twice.
	#[error("duplicate {kind} name: {name}")]
	DuplicateName { kind: &'static str, name: String },

	/// An attribute references a namespace that was never established.
	#[error("attribute parent value invalid for key: {key} ({parent})")]
	InvalidParent { key: String, parent: String },

	/// A redis instance declares both sentinel and cluster topology.
	#[error("both sentinel and cluster configurations are defined for the '{instance}' redis instance")]
	ShardConfigConflict { instance: String },

	/// A redis instance declares cluster nodes but does not support cluster mode.
	#[error("redis cluster is not supported for the '{instance}' redis instance")]
	ClusterNotAllowed { instance: String },

	/// A handler capability failed.
	#[error("{name}: {message}")]
	Handler { name: String, message: String },

	/// A top-level key in the user settings file is not a registered setting.
	#[error("unknown setting: {0}")]
	UnknownSetting(String),

	/// The `roles` list names roles that were never registered.
	#[error("invalid roles have been set: {}", .0.join(", "))]
	UnknownRole(Vec<String>),

	/// A setting holds a value of the wrong shape.
	#[error("invalid value for '{key}': {reason}")]
	InvalidValue { key: String, reason: String },

	/// Reading or writing a file failed.
	#[error("I/O error on {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	/// JSON (de)serialization failed.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// The user settings file is not valid TOML.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),
}

impl SettingsError {
	/// Builds a handler failure attributed to `name`.
	pub fn handler(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Handler {
			name: name.into(),
			message: message.into(),
		}
	}

	pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::InvalidValue {
			key: key.into(),
			reason: reason.into(),
		}
	}

	pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
		move |error| Self::Io {
			path: path.to_path_buf(),
			error,
		}
	}
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Non-fatal conditions reported alongside a generated configuration.
///
/// Warnings are logged as they occur and collected in
/// [`GeneratedConfig::warnings`] so callers can show them after the run.
///
/// [`GeneratedConfig::warnings`]: crate::pipeline::GeneratedConfig::warnings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
	/// Secrets were generated but the secrets file is disabled.
	SecretsNotPersisted,
	/// A cluster-wide role declaration replaced a local one.
	RoleOverridden(RoleOverride),
	/// A persisted secret section has no matching attribute.
	IgnoredSecretSection { section: String },
}

impl core::fmt::Display for ConfigWarning {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::SecretsNotPersisted => write!(
				f,
				"generating default secrets is enabled but writing the secrets file is disabled; \
				 secrets will not persist across runs"
			),
			Self::RoleOverridden(notice) => write!(f, "{notice}"),
			Self::IgnoredSecretSection { section } => write!(
				f,
				"ignoring section {section} in the secrets file, it is not a registered setting"
			),
		}
	}
}
