use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

use super::*;

fn settings(values: Value) -> Settings {
	let mut settings = Settings::new();
	if let Value::Object(values) = values {
		for (key, value) in values {
			settings.apply_user(&key, value);
		}
	}
	settings
}

fn with_sentinels() -> Value {
	json!({
		"gitlab_rails": {
			"redis_host": "redis.example.com",
			"redis_port": 8888,
			"redis_password": "mypass",
			"redis_sentinels": [
				{ "host": "sentinel1.example.com", "port": "12345" },
				{ "host": "sentinel2.example.com", "port": "12345" }
			]
		},
		"redis": {
			"master_name": "master_from.redis.master_name",
			"master_password": "password_from.redis.master_password"
		}
	})
}

fn params(host: &str, port: u16, password: &str) -> RedisParams {
	RedisParams {
		host: Some(host.to_string()),
		port,
		password: Some(password.to_string()),
	}
}

#[test]
fn test_redis_params_without_sentinels() {
	let settings = settings(json!({
		"gitlab_rails": {
			"redis_host": "redis.example.com",
			"redis_port": 8888,
			"redis_password": "mypass"
		}
	}));
	let expected = params("redis.example.com", 8888, "mypass");
	assert_eq!(redis_params(&settings, true).unwrap(), expected);
	assert_eq!(redis_params(&settings, false).unwrap(), expected);
}

#[test]
fn test_redis_params_with_sentinels() {
	let settings = settings(with_sentinels());
	assert_eq!(
		redis_params(&settings, true).unwrap(),
		params(
			"master_from.redis.master_name",
			6379,
			"password_from.redis.master_password"
		)
	);
	assert_eq!(
		redis_params(&settings, false).unwrap(),
		params("redis.example.com", 8888, "mypass")
	);
}

#[test]
fn test_redis_url_defaults_to_socket() {
	assert_eq!(
		redis_url(&Settings::new()).unwrap().as_str(),
		"unix:/var/opt/gitlab/redis/redis.socket"
	);
}

#[rstest]
#[case::host(json!({ "redis_host": "redis.example.com" }), "redis://redis.example.com/")]
#[case::port(
	json!({ "redis_host": "redis.example.com", "redis_port": 8888 }),
	"redis://redis.example.com:8888/"
)]
#[case::default_port(
	json!({ "redis_host": "redis.example.com", "redis_port": "6379" }),
	"redis://redis.example.com/"
)]
#[case::database(
	json!({ "redis_host": "redis.example.com", "redis_database": 0 }),
	"redis://redis.example.com/0"
)]
#[case::password(
	json!({ "redis_host": "redis.example.com", "redis_password": "mypass" }),
	"redis://:mypass@redis.example.com/"
)]
#[case::encoded_password(
	json!({ "redis_host": "redis.example.com", "redis_password": "#223" }),
	"redis://:%23223@redis.example.com/"
)]
#[case::everything(
	json!({
		"redis_host": "redis.example.com",
		"redis_password": "mypass",
		"redis_database": 0,
		"redis_port": 8888
	}),
	"redis://:mypass@redis.example.com:8888/0"
)]
#[case::ssl(
	json!({
		"redis_host": "redis.example.com",
		"redis_password": "mypass",
		"redis_database": 0,
		"redis_port": 8888,
		"redis_ssl": true
	}),
	"rediss://:mypass@redis.example.com:8888/0"
)]
#[case::ipv6(json!({ "redis_host": "::1" }), "redis://[::1]/")]
#[case::ipv6_port(
	json!({ "redis_host": "fd00::5", "redis_port": 8888 }),
	"redis://[fd00::5]:8888/"
)]
#[case::ipv6_bracketed(json!({ "redis_host": "[::1]" }), "redis://[::1]/")]
fn test_redis_url(#[case] rails: Value, #[case] expected: &str) {
	let settings = settings(json!({ "gitlab_rails": rails }));
	assert_eq!(redis_url(&settings).unwrap().as_str(), expected);
}

#[test]
fn test_invalid_port_rejected() {
	let settings = settings(json!({
		"gitlab_rails": { "redis_host": "redis.example.com", "redis_port": 70000 }
	}));
	let err = redis_url(&settings).unwrap_err();
	assert!(matches!(err, SettingsError::InvalidValue { ref key, .. } if key == "gitlab_rails.redis_port"));
}

#[test]
fn test_workhorse_params_plain() {
	let settings = settings(json!({
		"gitlab_rails": {
			"redis_host": "redis.example.com",
			"redis_port": 8888,
			"redis_password": "mypass"
		}
	}));
	let params = workhorse_params(&settings).unwrap();
	assert_eq!(params.password.as_deref(), Some("mypass"));
	assert!(params.sentinels.is_empty());
	assert_eq!(
		params.url.as_deref(),
		Some("redis://:mypass@redis.example.com:8888/")
	);
}

#[test]
fn test_workhorse_params_with_sentinels() {
	let params = workhorse_params(&settings(with_sentinels())).unwrap();
	assert_eq!(
		params.password.as_deref(),
		Some("password_from.redis.master_password")
	);
	assert_eq!(
		params.sentinels,
		vec![
			"redis://sentinel1.example.com:12345",
			"redis://sentinel2.example.com:12345"
		]
	);
	assert_eq!(
		params.sentinel_master.as_deref(),
		Some("master_from.redis.master_name")
	);
	assert_eq!(params.sentinel_password, None);
	assert_eq!(
		params.url.as_deref(),
		Some("redis://:password_from.redis.master_password@master_from.redis.master_name/")
	);
}

#[test]
fn test_workhorse_params_dedicated_instance() {
	let mut values = with_sentinels();
	values["gitlab_rails"] = json!({
		"redis_workhorse_instance": "redis://:redis.workhorse.com:8888",
		"redis_workhorse_password": "workhorse.password"
	});
	let params = workhorse_params(&settings(values)).unwrap();
	assert_eq!(params.password.as_deref(), Some("workhorse.password"));
	assert!(params.sentinels.is_empty());
	assert_eq!(params.url.as_deref(), Some("redis://:redis.workhorse.com:8888"));
}

#[test]
fn test_workhorse_params_dedicated_sentinels() {
	let mut values = with_sentinels();
	values["gitlab_rails"] = json!({
		"redis_workhorse_sentinels": [
			{ "host": "sentinel1.workhorse.com", "port": "12345" },
			{ "host": "sentinel2.workhorse.com", "port": "12345" }
		],
		"redis_workhorse_sentinels_password": "workhorse.password",
		"redis_workhorse_sentinel_master": "workhorse.master"
	});
	let params = workhorse_params(&settings(values)).unwrap();
	assert_eq!(params.password, None);
	assert_eq!(
		params.sentinels,
		vec![
			"redis://:workhorse.password@sentinel1.workhorse.com:12345",
			"redis://:workhorse.password@sentinel2.workhorse.com:12345"
		]
	);
	assert_eq!(params.sentinel_master.as_deref(), Some("workhorse.master"));
	assert_eq!(params.sentinel_password.as_deref(), Some("workhorse.password"));
	assert_eq!(params.url, None);
}

fn nodes() -> Value {
	json!([
		{ "host": "node1.example.com", "port": "12345" },
		{ "host": "node2.example.com", "port": "12345" }
	])
}

#[test]
fn test_shard_with_sentinels_and_cluster_conflicts() {
	let settings = settings(json!({
		"gitlab_rails": {
			"redis_cache_sentinels": nodes(),
			"redis_cache_cluster_nodes": nodes()
		}
	}));
	let err = validate_instance_shard_config(&settings, "cache").unwrap_err();
	assert!(matches!(err, SettingsError::ShardConfigConflict { ref instance } if instance == "cache"));
}

#[rstest]
#[case::sentinels_only("cache", "sentinels")]
#[case::cluster_only("rate_limiting", "cluster_nodes")]
#[case::sessions_sentinels("sessions", "sentinels")]
fn test_single_topology_accepted(#[case] instance: &str, #[case] kind: &str) {
	let settings = settings(json!({
		"gitlab_rails": { format!("redis_{instance}_{kind}"): nodes() }
	}));
	validate_instance_shard_config(&settings, instance).unwrap();
}

#[test]
fn test_cluster_outside_allowed_instances() {
	let settings = settings(json!({
		"gitlab_rails": { "redis_sessions_cluster_nodes": nodes() }
	}));
	let err = validate_instance_shard_config(&settings, "sessions").unwrap_err();
	assert!(matches!(err, SettingsError::ClusterNotAllowed { ref instance } if instance == "sessions"));
}

#[test]
fn test_empty_topology_lists_ignored() {
	let settings = settings(json!({
		"gitlab_rails": { "redis_sessions_cluster_nodes": [], "redis_sessions_sentinels": [] }
	}));
	validate_instance_shard_config(&settings, "sessions").unwrap();
}

proptest::proptest! {
	#[test]
	fn prop_both_topologies_always_conflict(index in 0..REDIS_INSTANCES.len()) {
		let instance = REDIS_INSTANCES[index];
		let settings = settings(json!({
			"gitlab_rails": {
				format!("redis_{instance}_sentinels"): nodes(),
				format!("redis_{instance}_cluster_nodes"): nodes()
			}
		}));
		let conflict = matches!(
			validate_instance_shard_config(&settings, instance),
			Err(SettingsError::ShardConfigConflict { .. })
		);
		proptest::prop_assert!(conflict);
	}

	#[test]
	fn prop_cluster_only_follows_allow_list(index in 0..REDIS_INSTANCES.len()) {
		let instance = REDIS_INSTANCES[index];
		let settings = settings(json!({
			"gitlab_rails": { format!("redis_{instance}_cluster_nodes"): nodes() }
		}));
		let result = validate_instance_shard_config(&settings, instance);
		proptest::prop_assert_eq!(result.is_ok(), ALLOWED_CLUSTER_INSTANCES.contains(&instance));
	}
}

#[test]
fn test_sentinel_urls_bracket_ipv6() {
	let sentinels = [json!({ "host": "fd00::7", "port": 26379 }), json!({ "host": "10.0.0.7" })];
	assert_eq!(
		sentinel_urls(&sentinels, Some("pw")).unwrap(),
		vec!["redis://:pw@[fd00::7]:26379", "redis://:pw@10.0.0.7:26379"]
	);
}
