//! The `gitlab` namespace: rails, workhorse and the services in front of them.

use omnibus_settings::secrets::SecretKind;
use omnibus_settings::{
	AttributeSpec, Capabilities, Context, Handler, HandlerSlot, Registry, Result, SettingsError,
};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::redis::{RAILS, REDIS_INSTANCES, validate_instance_shard_config, workhorse_params};
use crate::{set_default, string_in};


pub const GITLAB_NAMESPACE: &str = "gitlab";
pub const EXTERNAL_URL: &str = "external_url";
pub const WORKHORSE: &str = "gitlab_workhorse";
pub const NGINX: &str = "nginx";

/// Shortest accepted `db_key_base`.
pub const MIN_DB_KEY_BASE_LEN: usize = 30;

const RAILS_SECRETS: [&str; 3] = ["secret_key_base", "db_key_base", "otp_key_base"];

pub fn register(registry: &mut Registry) -> Result<()> {
	registry.attribute_block(GITLAB_NAMESPACE, |registry| {
		registry.register_attribute(AttributeSpec::new(EXTERNAL_URL).scalar())?;
		registry.register_attribute(
			AttributeSpec::new(RAILS)
				.priority(15)
				.handler(HandlerSlot::deferred(|| GitlabRails)),
		)?;
		// Runs after the redis handler has settled the rails connection.
		registry.register_attribute(
			AttributeSpec::new(WORKHORSE)
				.priority(25)
				.handler(HandlerSlot::deferred(|| Workhorse)),
		)?;
		registry.register_attribute(AttributeSpec::new("puma"))?;
		registry.register_attribute(AttributeSpec::new("sidekiq"))?;
		registry.register_attribute(
			AttributeSpec::new(NGINX).handler(HandlerSlot::deferred(|| Nginx)),
		)?;
		registry.register_attribute(AttributeSpec::new("logrotate"))?;
		Ok(())
	})
}

/// Rails secrets, the external URL and Redis shard checks.
struct GitlabRails;

impl Handler for GitlabRails {
	fn capabilities(&self) -> Capabilities {
		Capabilities::PARSE_SECRETS | Capabilities::VALIDATE_SECRETS | Capabilities::PARSE_VARIABLES
	}

	fn parse_secrets(&self, ctx: &mut Context<'_>) -> Result<()> {
		for key in RAILS_SECRETS {
			ctx.ensure_secret(RAILS, key, SecretKind::Hex(64))?;
		}
		Ok(())
	}

	fn validate_secrets(&self, ctx: &mut Context<'_>) -> Result<()> {
		match ctx.settings.str_in(RAILS, "db_key_base") {
			Some(key) if key.len() < MIN_DB_KEY_BASE_LEN => Err(SettingsError::handler(
				RAILS,
				format!("db_key_base must be at least {MIN_DB_KEY_BASE_LEN} characters"),
			)),
			_ => Ok(()),
		}
	}

	fn parse_variables(&self, ctx: &mut Context<'_>) -> Result<()> {
		parse_external_url(ctx)?;
		for instance in REDIS_INSTANCES {
			validate_instance_shard_config(ctx.settings, instance)?;
		}
		Ok(())
	}
}

/// Derives `gitlab_host`, `gitlab_port`, `gitlab_https` and
/// `gitlab_relative_url_root` from `external_url`.
fn parse_external_url(ctx: &mut Context<'_>) -> Result<()> {
	let Some(external_url) = ctx
		.settings
		.get(EXTERNAL_URL)
		.and_then(Value::as_str)
		.map(str::to_string)
	else {
		return Ok(());
	};

	let url = Url::parse(&external_url).map_err(|err| {
		SettingsError::handler(
			EXTERNAL_URL,
			format!(
				"GitLab external URL must include a schema and FQDN, e.g. http://gitlab.example.com/ ({err})"
			),
		)
	})?;
	let https = match url.scheme() {
		"http" => false,
		"https" => true,
		other => {
			return Err(SettingsError::handler(
				EXTERNAL_URL,
				format!("unsupported external URL scheme: {other}"),
			));
		}
	};
	let Some(host) = url.host_str() else {
		return Err(SettingsError::handler(EXTERNAL_URL, "external URL has no host"));
	};
	let port = url.port_or_known_default().unwrap_or(if https { 443 } else { 80 });
	debug!(host, port, https, "parsed external url");

	let settings = &mut *ctx.settings;
	set_default(settings, RAILS, "gitlab_host", Value::from(host))?;
	set_default(settings, RAILS, "gitlab_port", Value::from(port))?;
	set_default(settings, RAILS, "gitlab_https", Value::Bool(https))?;
	let path = url.path().trim_end_matches('/');
	if !path.is_empty() {
		set_default(settings, RAILS, "gitlab_relative_url_root", Value::from(path))?;
	}
	Ok(())
}

/// Workhorse secret and Redis parameters.
struct Workhorse;

impl Handler for Workhorse {
	fn capabilities(&self) -> Capabilities {
		Capabilities::PARSE_SECRETS | Capabilities::PARSE_VARIABLES
	}

	fn parse_secrets(&self, ctx: &mut Context<'_>) -> Result<()> {
		ctx.ensure_secret(WORKHORSE, "secret_token", SecretKind::Hex(32))
	}

	fn parse_variables(&self, ctx: &mut Context<'_>) -> Result<()> {
		let params = workhorse_params(ctx.settings)?;
		ctx.settings.set_in(WORKHORSE, "redis", params.to_value())?;
		let root = string_in(ctx.settings, RAILS, "gitlab_relative_url_root").unwrap_or_default();
		set_default(
			ctx.settings,
			WORKHORSE,
			"auth_backend",
			Value::String(format!("http://localhost:8080{root}")),
		)
	}
}

/// Listen settings derived from the external URL.
struct Nginx;

impl Handler for Nginx {
	fn capabilities(&self) -> Capabilities {
		Capabilities::PARSE_VARIABLES
	}

	fn parse_variables(&self, ctx: &mut Context<'_>) -> Result<()> {
		let settings = &mut *ctx.settings;
		if let Some(https) = settings.dig(&[RAILS, "gitlab_https"]).cloned() {
			set_default(settings, NGINX, "listen_https", https)?;
		}
		if let Some(port) = settings.dig(&[RAILS, "gitlab_port"]).cloned() {
			set_default(settings, NGINX, "listen_port", port)?;
		}
		Ok(())
	}
}
