//! Implementation of the `tmplc fetch` command.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use tmplc_lib::config::PrecompileConfig;
use tmplc_lib::engine::{EngineDescriptor, Provisioner};

use super::layered_config;
use crate::output::{OutputFormat, format_duration, print_json, print_stat, print_success};

#[derive(Args, Debug, Default)]
pub struct FetchArgs {
  /// Config file (default: ./tmplc.lua when present)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  /// Engine script identifier
  #[arg(short, long)]
  pub engine: Option<String>,

  /// Engine cache directory
  #[arg(long)]
  pub cache_dir: Option<PathBuf>,

  /// Extra directory to search for bundled engine scripts (repeatable)
  #[arg(long = "script-dir")]
  pub script_dirs: Vec<PathBuf>,

  /// JSON download listing to look the engine up in
  #[arg(long, conflicts_with = "url_template")]
  pub url: Option<String>,

  /// Download URL with a {name} placeholder for the engine identifier
  #[arg(long)]
  pub url_template: Option<String>,

  /// Fail instead of downloading on a cache miss
  #[arg(long)]
  pub offline: bool,

  /// Network timeout (e.g. "30s")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub timeout: Option<Duration>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

impl FetchArgs {
  fn to_config(&self) -> PrecompileConfig {
    PrecompileConfig {
      engine_identifier: self.engine.clone(),
      cache_directory: self.cache_dir.clone(),
      script_directories: (!self.script_dirs.is_empty()).then(|| self.script_dirs.clone()),
      engine_url: self.url.clone(),
      engine_url_template: self.url_template.clone(),
      offline: self.offline.then_some(true),
      timeout: self.timeout,
      ..Default::default()
    }
  }
}

#[derive(Debug, Serialize)]
struct FetchSummary<'a> {
  engine: &'a EngineDescriptor,
  elapsed_ms: u64,
}

/// Execute the fetch command.
pub fn cmd_fetch(args: FetchArgs) -> Result<()> {
  let start = Instant::now();
  let config = layered_config(args.config.as_ref(), args.to_config())?;
  let engine_id = config.engine();
  let provision = config.provision_options().context("Invalid configuration")?;

  let engine = Provisioner::new(provision)
    .resolve(&engine_id)
    .with_context(|| format!("Failed to provision engine '{}'", engine_id))?;

  if args.output.is_json() {
    return print_json(&FetchSummary {
      engine: &engine,
      elapsed_ms: start.elapsed().as_millis() as u64,
    });
  }

  print_success(&format!("Engine {} is available", engine.name));
  print_stat("Source", engine.location.as_str());
  print_stat("Path", &engine.location.path().display().to_string());
  print_stat("Duration", &format_duration(start.elapsed()));
  Ok(())
}
