//! Guildhall simulator.
//!
//! Builds a session context over the in-memory settings store, transport,
//! cache and toast sink, replays a scripted change feed through it and prints
//! what the dashboard would have seen.

mod runner;
mod script;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use guildhall_config::Config;
use tracing::info;

use crate::runner::Runner;

#[derive(Parser, Debug)]
#[command(name = "guildhall-sim")]
#[command(about = "Replays a scripted change feed through the guildhall client core")]
struct Args {
	/// Configuration file (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// JSON-lines script; the built-in demo runs when omitted
	#[arg(short, long, value_name = "PATH")]
	script: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => Config::load(path).with_context(|| format!("loading config from {}", path.display()))?,
		None => Config::default(),
	};
	setup_tracing(&config.log.filter, args.verbose);

	let steps = match &args.script {
		Some(path) => {
			let input = std::fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))?;
			script::parse(&input).with_context(|| format!("parsing script {}", path.display()))?
		}
		None => script::parse(script::DEMO)?,
	};
	info!(steps = steps.len(), config = ?args.config, "sim.start");

	let report = Runner::new(&config).run(&steps).await?;
	println!("{report}");
	Ok(())
}

fn setup_tracing(filter: &str, verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = if verbose {
		EnvFilter::new("debug")
	} else {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
	};
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
