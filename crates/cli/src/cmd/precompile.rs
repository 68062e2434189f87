//! Implementation of the `tmplc precompile` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;

use tmplc_lib::assemble::AssembledModule;
use tmplc_lib::config::PrecompileConfig;
use tmplc_lib::engine::EngineDescriptor;
use tmplc_lib::precompile::{CompileFailure, FailurePolicy};
use tmplc_lib::{PrecompileError, precompile};

use super::layered_config;
use crate::output::{OutputFormat, format_duration, print_info, print_json, print_stat, print_success, symbols};

#[derive(Args, Debug, Default)]
pub struct PrecompileArgs {
  /// Config file (default: ./tmplc.lua when present)
  #[arg(short, long)]
  pub config: Option<PathBuf>,

  /// Directory holding the templates
  #[arg(short, long)]
  pub source: Option<PathBuf>,

  /// Directory for generated modules (default: the source directory)
  #[arg(short = 'O', long = "output-dir")]
  pub output_dir: Option<PathBuf>,

  /// Engine script identifier, e.g. handlebars-1.0.12.min.js
  #[arg(short, long)]
  pub engine: Option<String>,

  /// Template file extension (repeatable)
  #[arg(long = "ext")]
  pub extensions: Vec<String>,

  /// Extension of generated modules
  #[arg(long)]
  pub output_extension: Option<String>,

  /// Write every module directly under the output directory
  #[arg(long)]
  pub flatten: bool,

  /// Strip newlines, carriage returns and tabs before compiling
  #[arg(long)]
  pub purge_whitespace: bool,

  /// Helper known to exist at render time (repeatable)
  #[arg(long = "known-helper")]
  pub known_helpers: Vec<String>,

  /// Reject templates that use helpers not declared with --known-helper
  #[arg(long)]
  pub known_helpers_only: bool,

  /// Encoding of templates and generated modules
  #[arg(long)]
  pub encoding: Option<String>,

  /// Engine cache directory
  #[arg(long)]
  pub cache_dir: Option<PathBuf>,

  /// Extra directory to search for bundled engine scripts (repeatable)
  #[arg(long = "script-dir")]
  pub script_dirs: Vec<PathBuf>,

  /// Never download the engine
  #[arg(long)]
  pub offline: bool,

  /// Network timeout for engine downloads (e.g. "30s")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub timeout: Option<Duration>,

  /// Skip templates that fail to compile and report them all at the end
  #[arg(long)]
  pub keep_going: bool,

  /// Compile everything but write no files
  #[arg(long)]
  pub dry_run: bool,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

impl PrecompileArgs {
  /// The flag layer. Unset switches leave lower layers alone.
  fn to_config(&self) -> PrecompileConfig {
    PrecompileConfig {
      source_directory: self.source.clone(),
      output_directory: self.output_dir.clone(),
      template_extensions: non_empty(&self.extensions),
      preserve_hierarchy: self.flatten.then_some(false),
      purge_whitespace: self.purge_whitespace.then_some(true),
      known_helpers: non_empty(&self.known_helpers),
      known_helpers_only: self.known_helpers_only.then_some(true),
      encoding: self.encoding.clone(),
      engine_identifier: self.engine.clone(),
      cache_directory: self.cache_dir.clone(),
      script_directories: non_empty(&self.script_dirs),
      offline: self.offline.then_some(true),
      timeout: self.timeout,
      output_extension: self.output_extension.clone(),
      failure_policy: self.keep_going.then_some(FailurePolicy::CollectAll),
      dry_run: self.dry_run.then_some(true),
      ..Default::default()
    }
  }
}

fn non_empty<T: Clone>(values: &[T]) -> Option<Vec<T>> {
  (!values.is_empty()).then(|| values.to_vec())
}

#[derive(Debug, Serialize)]
struct PrecompileSummary<'a> {
  engine: &'a EngineDescriptor,
  bundles: &'a [AssembledModule],
  templates_compiled: usize,
  dry_run: bool,
  elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
struct FailureSummary<'a> {
  failures: &'a [CompileFailure],
}

/// Execute the precompile command.
pub fn cmd_precompile(args: PrecompileArgs) -> Result<()> {
  let config = layered_config(args.config.as_ref(), args.to_config())?;
  let options = config.resolve().context("Invalid configuration")?;

  let report = match precompile(&options) {
    Ok(report) => report,
    Err(PrecompileError::CompileFailures(failures)) => {
      if args.output.is_json() {
        print_json(&FailureSummary { failures: &failures })?;
      } else {
        for failure in &failures {
          eprintln!(
            "  {} {}: {}",
            symbols::ERROR.red(),
            failure.template.display(),
            failure.message.dimmed()
          );
        }
      }
      bail!("{} template(s) failed to compile", failures.len());
    }
    Err(e) => return Err(e).context("Precompilation failed"),
  };

  if args.output.is_json() {
    return print_json(&PrecompileSummary {
      engine: &report.engine,
      bundles: &report.bundles,
      templates_compiled: report.templates_compiled,
      dry_run: report.dry_run,
      elapsed_ms: report.elapsed.as_millis() as u64,
    });
  }

  for module in &report.bundles {
    println!(
      "  {} {} {}",
      symbols::ADD.green(),
      module.path.display(),
      format!("({} templates)", module.templates.len()).dimmed()
    );
  }
  println!();
  if report.dry_run {
    print_info("Dry run - no files written");
  } else {
    print_success("Precompilation complete!");
  }
  print_stat("Engine", &format!("{} [{}]", report.engine.name, report.engine.location.as_str()));
  print_stat("Modules", &report.bundles.len().to_string());
  print_stat("Templates", &report.templates_compiled.to_string());
  print_stat("Duration", &format_duration(report.elapsed));

  Ok(())
}
