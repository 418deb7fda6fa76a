use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use offline_sw_bundler::config::{CacheConfig, SwConfigFile, parse_overrides};
use offline_sw_bundler::ServiceWorkerBuilder;

/// Generate an offline service worker for a built web app
#[derive(Parser, Debug)]
#[command(name = "offline-sw")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Config file path followed by optional `output=DIR` / `conf=FILE` overrides
  #[arg(value_name = "ARGS")]
  args: Vec<String>,

  /// Build output directory (same as `output=DIR`)
  #[arg(short, long, value_name = "DIR")]
  output: Option<String>,

  /// Configuration file (same as `conf=FILE`)
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Log every scanned file
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let level = if cli.verbose {
    tracing::Level::DEBUG
  } else {
    tracing::Level::INFO
  };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
    .with_target(false)
    .init();

  let mut overrides = parse_overrides(cli.args.iter().map(String::as_str));
  if cli.output.is_some() {
    overrides.output = cli.output.clone();
  }
  if let Some(path) = &cli.config {
    overrides.conf = Some(path.to_string_lossy().into_owned());
  }

  let cwd = std::env::current_dir().context("failed to determine working directory")?;
  let loaded = SwConfigFile::discover(&cwd, &overrides.config_path());
  let config = CacheConfig::resolve(&loaded.file, &overrides, &cwd)?;
  tracing::debug!("resolved configuration: {:?}", config);

  let report = ServiceWorkerBuilder::new(&config)
    .used_defaults(loaded.used_defaults())
    .build()?;

  println!();
  print!("{report}");
  Ok(())
}
