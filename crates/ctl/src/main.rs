//! omnibus-ctl binary.
//!
//! Loads the node settings, runs the generation pipeline and prints the
//! resolved configuration tree as JSON. Logs and warnings go to stderr so the
//! tree can be piped.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	match cli.command {
		Command::Generate(args) => {
			let generated = commands::generate(&args)?;
			for warning in &generated.warnings {
				eprintln!("warning: {warning}");
			}
		}
		Command::Attributes { edition } => {
			for line in commands::attribute_listing(edition.unwrap_or_default())? {
				println!("{line}");
			}
		}
	}
	Ok(())
}

fn setup_tracing(verbose: u8) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
		0 => EnvFilter::new("warn"),
		1 => EnvFilter::new("omnibus_settings=debug,omnibus_cookbooks=debug,info"),
		_ => EnvFilter::new("omnibus_settings=trace,omnibus_cookbooks=trace,debug"),
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();
}
