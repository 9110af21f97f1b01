//! Redis connection parameters and topology checks.
//!
//! Rails connects to Redis either over the local unix socket, a TCP host or,
//! when sentinels are configured, through the sentinel master group. Each
//! named Redis instance (`cache`, `sessions`, ...) may additionally declare
//! its own sentinels or cluster nodes, but never both.

use std::borrow::Cow;

use omnibus_settings::{
	AttributeSpec, Capabilities, Context, Handler, HandlerSlot, Registry, Result, Settings,
	SettingsError,
};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::{set_default, string_in};

#[cfg(test)]
mod tests;

pub const REDIS: &str = "redis";
pub(crate) const RAILS: &str = "gitlab_rails";

pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_SENTINEL_PORT: u16 = 26379;
pub const DEFAULT_REDIS_SOCKET: &str = "/var/opt/gitlab/redis/redis.socket";
pub const DEFAULT_MASTER_NAME: &str = "gitlab-redis";

/// Named Redis instances rails can be pointed at separately.
pub const REDIS_INSTANCES: [&str; 9] = [
	"cache",
	"queues",
	"shared_state",
	"trace_chunks",
	"rate_limiting",
	"cluster_rate_limiting",
	"sessions",
	"repository_cache",
	"workhorse",
];

/// Instances that support Redis Cluster.
pub const ALLOWED_CLUSTER_INSTANCES: [&str; 3] = ["cache", "rate_limiting", "cluster_rate_limiting"];

/// Host, port and password rails uses to reach Redis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisParams {
	/// `None` means the local unix socket.
	pub host: Option<String>,
	pub port: u16,
	pub password: Option<String>,
}

/// Connection parameters for rails.
///
/// With sentinels configured and `support_sentinel_groupname`, the sentinel
/// master group stands in for the host.
pub fn redis_params(settings: &Settings, support_sentinel_groupname: bool) -> Result<RedisParams> {
	if support_sentinel_groupname && has_entries(settings.dig(&[RAILS, "redis_sentinels"])) {
		return Ok(RedisParams {
			host: string_in(settings, REDIS, "master_name"),
			port: port(settings, REDIS, "master_port", DEFAULT_REDIS_PORT)?,
			password: string_in(settings, REDIS, "master_password"),
		});
	}
	Ok(RedisParams {
		host: string_in(settings, RAILS, "redis_host"),
		port: port(settings, RAILS, "redis_port", DEFAULT_REDIS_PORT)?,
		password: string_in(settings, RAILS, "redis_password"),
	})
}

/// URL rails uses to reach Redis.
///
/// The port is only included when it differs from 6379 and the database, when
/// set, becomes the path. Passwords are percent-encoded.
pub fn redis_url(settings: &Settings) -> Result<Url> {
	let params = redis_params(settings, true)?;
	let Some(host) = params.host else {
		let socket = settings
			.str_in(RAILS, "redis_socket")
			.unwrap_or(DEFAULT_REDIS_SOCKET);
		return parse_url("redis_socket", &format!("unix:{socket}"));
	};

	let scheme = if settings.dig(&[RAILS, "redis_ssl"]) == Some(&Value::Bool(true)) {
		"rediss"
	} else {
		"redis"
	};
	let mut url = parse_url("redis_host", &format!("{scheme}://{}/", url_host(&host)))?;
	if params.port != DEFAULT_REDIS_PORT {
		url.set_port(Some(params.port))
			.map_err(|()| invalid_url("redis_port", "cannot carry a port"))?;
	}
	if let Some(password) = &params.password {
		url.set_password(Some(password))
			.map_err(|()| invalid_url("redis_password", "cannot carry a password"))?;
	}
	match settings.dig(&[RAILS, "redis_database"]) {
		None | Some(Value::Null) => {}
		Some(Value::String(database)) => url.set_path(database),
		Some(database) => url.set_path(&database.to_string()),
	}
	Ok(url)
}

/// Redis settings for workhorse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkhorseRedisParams {
	pub url: Option<String>,
	pub password: Option<String>,
	pub sentinels: Vec<String>,
	pub sentinel_master: Option<String>,
	pub sentinel_password: Option<String>,
}

impl WorkhorseRedisParams {
	/// Workhorse configuration keys; unset fields become `null`.
	pub fn to_value(&self) -> Value {
		json!({
			"URL": self.url,
			"Password": self.password,
			"Sentinel": self.sentinels,
			"SentinelMaster": self.sentinel_master,
			"SentinelPassword": self.sentinel_password
		})
	}
}

/// Redis parameters for workhorse.
///
/// A dedicated workhorse instance (sentinels first, then a URL) wins over the
/// connection rails uses.
pub fn workhorse_params(settings: &Settings) -> Result<WorkhorseRedisParams> {
	let sentinels = entries(settings.dig(&[RAILS, "redis_workhorse_sentinels"]));
	if !sentinels.is_empty() {
		let sentinel_password = string_in(settings, RAILS, "redis_workhorse_sentinels_password");
		return Ok(WorkhorseRedisParams {
			url: None,
			password: string_in(settings, RAILS, "redis_workhorse_password"),
			sentinels: sentinel_urls(sentinels, sentinel_password.as_deref())?,
			sentinel_master: string_in(settings, RAILS, "redis_workhorse_sentinel_master"),
			sentinel_password,
		});
	}

	if let Some(instance) = string_in(settings, RAILS, "redis_workhorse_instance") {
		return Ok(WorkhorseRedisParams {
			url: Some(instance),
			password: string_in(settings, RAILS, "redis_workhorse_password"),
			..WorkhorseRedisParams::default()
		});
	}

	let params = redis_params(settings, true)?;
	let sentinels = entries(settings.dig(&[RAILS, "redis_sentinels"]));
	let sentinel_password = string_in(settings, RAILS, "redis_sentinels_password");
	Ok(WorkhorseRedisParams {
		url: Some(redis_url(settings)?.to_string()),
		password: params.password,
		sentinels: sentinel_urls(sentinels, sentinel_password.as_deref())?,
		sentinel_master: if sentinels.is_empty() {
			None
		} else {
			string_in(settings, REDIS, "master_name")
		},
		sentinel_password,
	})
}

/// Rejects shard configurations that mix sentinels and cluster nodes, or use
/// cluster nodes for an instance without cluster support.
pub fn validate_instance_shard_config(settings: &Settings, instance: &str) -> Result<()> {
	let sentinels = has_entries(settings.dig(&[RAILS, &format!("redis_{instance}_sentinels")]));
	let cluster = has_entries(settings.dig(&[RAILS, &format!("redis_{instance}_cluster_nodes")]));

	if sentinels && cluster {
		return Err(SettingsError::ShardConfigConflict {
			instance: instance.to_string(),
		});
	}
	if cluster && !ALLOWED_CLUSTER_INSTANCES.contains(&instance) {
		return Err(SettingsError::ClusterNotAllowed {
			instance: instance.to_string(),
		});
	}
	Ok(())
}

/// Feeds a locally running TCP Redis into the rails connection settings.
struct RedisSettings;

impl Handler for RedisSettings {
	fn capabilities(&self) -> Capabilities {
		Capabilities::PARSE_VARIABLES
	}

	fn parse_variables(&self, ctx: &mut Context<'_>) -> Result<()> {
		let settings = &mut *ctx.settings;
		if let Some(password) = string_in(settings, REDIS, "password") {
			set_default(settings, REDIS, "master_password", Value::String(password))?;
		}

		let local = ctx.services.enabled(settings, REDIS);
		if local && let Some(bind) = string_in(settings, REDIS, "bind") {
			let tcp_port = port(settings, REDIS, "port", DEFAULT_REDIS_PORT)?;
			debug!(bind = %bind, port = tcp_port, "rails uses local redis over tcp");
			set_default(settings, RAILS, "redis_host", Value::String(bind))?;
			set_default(settings, RAILS, "redis_port", Value::from(tcp_port))?;
			if let Some(password) = string_in(settings, REDIS, "password") {
				set_default(settings, RAILS, "redis_password", Value::String(password))?;
			}
		}

		let url = redis_url(settings)?;
		settings.set_in(RAILS, "redis_url", Value::String(url.into()))
	}
}

pub fn register(registry: &mut Registry) -> Result<()> {
	registry.register_attribute(
		AttributeSpec::new(REDIS)
			.top_level()
			.default_value(json!({
				"port": DEFAULT_REDIS_PORT,
				"master_name": DEFAULT_MASTER_NAME
			}))
			.handler(HandlerSlot::deferred(|| RedisSettings)),
	)?;
	Ok(())
}

fn parse_url(key: &str, input: &str) -> Result<Url> {
	Url::parse(input).map_err(|err| invalid_url(key, err.to_string()))
}

/// Brackets IPv6 literals for use in a URL authority.
fn url_host(host: &str) -> Cow<'_, str> {
	if host.contains(':') && !host.starts_with('[') {
		Cow::Owned(format!("[{host}]"))
	} else {
		Cow::Borrowed(host)
	}
}

fn invalid_url(key: &str, reason: impl Into<String>) -> SettingsError {
	SettingsError::invalid_value(format!("{RAILS}.{key}"), reason)
}

fn entries(value: Option<&Value>) -> &[Value] {
	value
		.and_then(Value::as_array)
		.map(Vec::as_slice)
		.unwrap_or_default()
}

fn has_entries(value: Option<&Value>) -> bool {
	!entries(value).is_empty()
}

/// Reads a port given as a number or a numeric string.
fn port(settings: &Settings, top: &str, key: &str, default: u16) -> Result<u16> {
	let invalid = |value: &Value| {
		SettingsError::invalid_value(format!("{top}.{key}"), format!("not a valid port: {value}"))
	};
	match settings.dig(&[top, key]) {
		None | Some(Value::Null) => Ok(default),
		Some(value @ Value::Number(number)) => number
			.as_u64()
			.and_then(|port| u16::try_from(port).ok())
			.ok_or_else(|| invalid(value)),
		Some(value @ Value::String(text)) => text.trim().parse().map_err(|_| invalid(value)),
		Some(value) => Err(invalid(value)),
	}
}

fn sentinel_urls(sentinels: &[Value], password: Option<&str>) -> Result<Vec<String>> {
	sentinels
		.iter()
		.map(|sentinel| {
			let host = sentinel
				.get("host")
				.and_then(Value::as_str)
				.ok_or_else(|| invalid_url("redis_sentinels", format!("sentinel without host: {sentinel}")))?;
			let port = match sentinel.get("port") {
				None | Some(Value::Null) => DEFAULT_SENTINEL_PORT.to_string(),
				Some(Value::String(port)) => port.clone(),
				Some(port) => port.to_string(),
			};
			let mut url = parse_url("redis_sentinels", &format!("redis://{}:{port}", url_host(host)))?;
			if let Some(password) = password {
				url.set_password(Some(password))
					.map_err(|()| invalid_url("redis_sentinels", "cannot carry a password"))?;
			}
			Ok(url.to_string())
		})
		.collect()
}
