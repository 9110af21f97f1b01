//! Durable secret storage.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SettingsError};

/// Default location of the persisted secrets file.
pub const DEFAULT_SECRETS_FILE: &str = "/etc/gitlab/gitlab-secrets.json";

/// Secrets by section, then by key.
pub type SecretMap = Map<String, Value>;

/// A durable key-value blob holding generated secrets.
pub trait SecretStore {
	/// Returns the persisted secrets; an empty map when nothing was stored yet.
	fn read(&self) -> Result<SecretMap>;

	/// Replaces the persisted secrets.
	fn write(&mut self, secrets: &SecretMap) -> Result<()>;
}

/// JSON file store, written atomically with owner-only permissions.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
	path: PathBuf,
}

impl FileSecretStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl SecretStore for FileSecretStore {
	fn read(&self) -> Result<SecretMap> {
		let content = match fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(SecretMap::new()),
			Err(err) => return Err(SettingsError::io(&self.path)(err)),
		};
		if content.trim().is_empty() {
			return Ok(SecretMap::new());
		}
		match serde_json::from_str(&content)? {
			Value::Object(map) => Ok(map),
			other => Err(SettingsError::invalid_value(
				self.path.display().to_string(),
				format!("expected a JSON object, found {other}"),
			)),
		}
	}

	fn write(&mut self, secrets: &SecretMap) -> Result<()> {
		let dir = match self.path.parent() {
			Some(dir) if !dir.as_os_str().is_empty() => dir,
			_ => Path::new("."),
		};
		fs::create_dir_all(dir).map_err(SettingsError::io(dir))?;

		let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(SettingsError::io(dir))?;
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			tmp.as_file()
				.set_permissions(fs::Permissions::from_mode(0o600))
				.map_err(SettingsError::io(tmp.path()))?;
		}
		let mut body = serde_json::to_string_pretty(secrets)?;
		body.push('\n');
		tmp.write_all(body.as_bytes())
			.and_then(|()| tmp.as_file().sync_all())
			.map_err(SettingsError::io(&self.path))?;
		tmp.persist(&self.path)
			.map_err(|err| SettingsError::io(&self.path)(err.error))?;

		debug!(path = %self.path.display(), sections = secrets.len(), "secrets written");
		Ok(())
	}
}

/// In-memory store for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
	secrets: SecretMap,
	writes: usize,
	fail_writes: bool,
}

impl MemorySecretStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_secrets(secrets: SecretMap) -> Self {
		Self {
			secrets,
			..Self::default()
		}
	}

	/// Makes every subsequent write fail.
	pub fn fail_writes(mut self) -> Self {
		self.fail_writes = true;
		self
	}

	pub fn secrets(&self) -> &SecretMap {
		&self.secrets
	}

	/// Number of successful writes.
	pub fn writes(&self) -> usize {
		self.writes
	}
}

impl SecretStore for MemorySecretStore {
	fn read(&self) -> Result<SecretMap> {
		Ok(self.secrets.clone())
	}

	fn write(&mut self, secrets: &SecretMap) -> Result<()> {
		if self.fail_writes {
			return Err(SettingsError::Io {
				path: PathBuf::from("<memory>"),
				error: std::io::Error::other("simulated write failure"),
			});
		}
		self.secrets = secrets.clone();
		self.writes += 1;
		Ok(())
	}
}
