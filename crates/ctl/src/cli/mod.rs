//! CLI schema for the omnibus-ctl binary.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use omnibus_settings::config::DEFAULT_CONFIG_FILE;
use omnibus_settings::secrets::store::DEFAULT_SECRETS_FILE;
use omnibus_settings::{CLUSTER_CONFIG_FILE, Edition};

#[derive(Parser, Debug)]
#[command(name = "omnibus-ctl")]
#[command(about = "Generate the resolved node configuration")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Verbose logging (repeat for trace)
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	pub verbose: u8,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
	/// Run the generation pipeline and print the resolved tree
	Generate(GenerateArgs),
	/// List registered attributes and roles
	Attributes {
		/// Edition to list attributes for
		#[arg(long, value_name = "EDITION")]
		edition: Option<Edition>,
	},
}

/// Inputs and output of a generation run.
#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
	/// User settings file
	#[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
	pub config: PathBuf,

	/// Cluster role file (defaults to gitlab-cluster.json next to the settings file)
	#[arg(long, value_name = "PATH")]
	pub cluster: Option<PathBuf>,

	/// Persisted secrets file
	#[arg(long, value_name = "PATH", default_value = DEFAULT_SECRETS_FILE)]
	pub secrets: PathBuf,

	/// Node name used in log output
	#[arg(long, value_name = "NAME")]
	pub node: Option<String>,

	/// Override the edition from the settings file
	#[arg(long, value_name = "EDITION")]
	pub edition: Option<Edition>,

	/// Write the tree here instead of stdout
	#[arg(short, long, value_name = "PATH")]
	pub output: Option<PathBuf>,
}

impl GenerateArgs {
	/// Cluster file path, falling back to the settings file's directory.
	pub fn cluster_path(&self) -> PathBuf {
		self.cluster.clone().unwrap_or_else(|| {
			self.config
				.parent()
				.unwrap_or_else(|| Path::new("."))
				.join(CLUSTER_CONFIG_FILE)
		})
	}

	/// Node name, falling back to `$HOSTNAME`.
	pub fn node_name(&self) -> String {
		self.node
			.clone()
			.or_else(|| std::env::var("HOSTNAME").ok())
			.unwrap_or_else(|| "localhost".to_string())
	}
}
