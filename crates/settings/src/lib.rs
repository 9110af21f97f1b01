//! Settings registry and configuration generation pipeline.
//!
//! Service modules declare their settings on a [`Registry`] at startup:
//! attributes (a top-level setting with a default, an optional parent
//! namespace, a priority and an optional handler), roles (a deployment
//! choice such as `redis_master` with its own enablement) and managed
//! services. The user settings file is merged over the defaults, then
//! [`generate_config`] runs the stages for one node:
//!
//! 1. **Secrets**: persisted secrets are loaded, missing ones generated and
//!    every secret validated ([`secrets`]).
//! 2. **Roles**: active roles are resolved from the settings file and the
//!    cluster source, and they enable their services ([`roles`]).
//! 3. **Variables**: handlers derive settings from other settings, in
//!    priority order ([`variables`]).
//! 4. **Tree**: values are grouped by namespace and stripped of nulls
//!    ([`sanitize`]).
//!
//! Each stage visits handlers strictly one after another over the shared
//! [`Settings`], so a handler sees everything written before it.

pub mod cluster;
pub mod config;
pub mod error;
pub mod handler;
pub mod overrides;
pub mod pipeline;
pub mod registry;
pub mod roles;
pub mod sanitize;
pub mod secrets;
pub mod services;
pub mod store;
pub mod value;
pub mod variables;

pub use cluster::{CLUSTER_CONFIG_FILE, ClusterConfig};
pub use config::{apply_user_config, apply_user_values, load_user_config};
pub use error::{ConfigWarning, Result, SettingsError};
pub use handler::{Capabilities, Context, Handler, HandlerSlot, NodeIdentity};
pub use overrides::{RoleOverride, override_role};
pub use pipeline::{GeneratedConfig, Sources, generate_config};
pub use registry::{AttributeSpec, DEFAULT_PRIORITY, Registry, RoleSpec};
pub use sanitize::{ResolvedConfig, build_output_tree};
pub use secrets::{FileSecretStore, MemorySecretStore, SecretKind, SecretMap, SecretStore};
pub use services::{DEFAULT_GROUP, SYSTEM_GROUP, ServiceRegistry};
pub use store::{Edition, Settings};
