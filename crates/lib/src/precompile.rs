//! The precompilation pipeline.
//!
//! Resolves the engine once, loads it into a single sandbox, then walks the
//! source tree and writes one module per bundle:
//!
//! 1. Validate the source directory and create the output directory
//! 2. Provision the engine (bundled, cached, or fetched)
//! 3. Load the engine into a sandbox
//! 4. For each bundle: read, normalize, compile, assemble
//!
//! Everything runs on the calling thread.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use encoding_rs::Encoding;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assemble::{self, AssembleError, AssembledModule, CompiledTemplate};
use crate::consts::{DEFAULT_ENGINE, DEFAULT_OUTPUT_EXTENSION, DEFAULT_TEMPLATE_EXTENSIONS};
use crate::engine::{EngineDescriptor, ProvisionError, ProvisionOptions, Provisioner};
use crate::sandbox::{CompileError, HelperGate, Sandbox, SandboxError, load_sandbox};
use crate::walk::{Bundle, HierarchyPolicy, OutputLayout, TemplateWalker, WalkError};

/// Whether template text is stripped of newlines, carriage returns and tabs
/// before compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhitespacePolicy {
  pub purge: bool,
}

impl WhitespacePolicy {
  pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
    if self.purge && text.contains(['\n', '\r', '\t']) {
      Cow::Owned(text.chars().filter(|c| !matches!(c, '\n' | '\r' | '\t')).collect())
    } else {
      Cow::Borrowed(text)
    }
  }
}

/// Helper names declared ahead of compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownHelpersConfig {
  pub names: Vec<String>,
  /// Unknown helpers fail compilation when set.
  pub strict_only: bool,
}

impl KnownHelpersConfig {
  pub fn gate(&self) -> HelperGate {
    HelperGate::new(self.names.iter().cloned(), self.strict_only)
  }
}

/// What happens when the engine rejects a template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
  /// Abort the run at the first rejected template.
  #[default]
  FailFast,
  /// Skip rejected templates, finish every bundle, then fail with all
  /// collected diagnostics.
  CollectAll,
}

/// Fully resolved pipeline configuration.
#[derive(Debug, Clone)]
pub struct PrecompileOptions {
  pub source_dir: PathBuf,
  pub output_dir: PathBuf,
  pub template_extensions: Vec<String>,
  pub output_extension: String,
  pub hierarchy: HierarchyPolicy,
  pub whitespace: WhitespacePolicy,
  pub known_helpers: KnownHelpersConfig,
  pub encoding: &'static Encoding,
  pub engine: String,
  pub provision: ProvisionOptions,
  pub failure_policy: FailurePolicy,
  /// Compile everything but write nothing.
  pub dry_run: bool,
}

impl PrecompileOptions {
  /// Defaults for precompiling `source_dir` in place.
  pub fn new(source_dir: impl Into<PathBuf>) -> Self {
    let source_dir = source_dir.into();
    Self {
      output_dir: source_dir.clone(),
      source_dir,
      template_extensions: DEFAULT_TEMPLATE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
      output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
      hierarchy: HierarchyPolicy::default(),
      whitespace: WhitespacePolicy::default(),
      known_helpers: KnownHelpersConfig::default(),
      encoding: encoding_rs::UTF_8,
      engine: DEFAULT_ENGINE.to_string(),
      provision: ProvisionOptions::default(),
      failure_policy: FailurePolicy::default(),
      dry_run: false,
    }
  }
}

/// A template the engine rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileFailure {
  pub template: PathBuf,
  pub bundle: PathBuf,
  pub message: String,
}

/// Errors that abort a precompilation run.
#[derive(Debug, Error)]
pub enum PrecompileError {
  #[error("source directory {} is not accessible: {source}", path.display())]
  SourceDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("source path {} is not a directory", path.display())]
  NotADirectory { path: PathBuf },

  #[error("failed to create output directory {}: {source}", path.display())]
  OutputDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to provision engine '{engine}': {source}")]
  Provision {
    engine: String,
    #[source]
    source: ProvisionError,
  },

  #[error(transparent)]
  Sandbox(#[from] SandboxError),

  #[error(transparent)]
  Walk(#[from] WalkError),

  #[error("engine '{engine}' failed to compile {}: {source}", template.display())]
  Compile {
    engine: String,
    template: PathBuf,
    bundle: PathBuf,
    #[source]
    source: CompileError,
  },

  #[error("{} template(s) failed to compile", .0.len())]
  CompileFailures(Vec<CompileFailure>),

  #[error(transparent)]
  Assemble(#[from] AssembleError),

  #[error("precompilation cancelled")]
  Cancelled,
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct PrecompileReport {
  pub engine: EngineDescriptor,
  /// Modules written, or that would have been written in a dry run.
  pub bundles: Vec<AssembledModule>,
  pub templates_compiled: usize,
  pub dry_run: bool,
  pub elapsed: Duration,
}

/// Run the pipeline to completion.
pub fn precompile(options: &PrecompileOptions) -> Result<PrecompileReport, PrecompileError> {
  precompile_with_cancel(options, &AtomicBool::new(false))
}

/// Run the pipeline, aborting between templates once `cancel` is set.
///
/// Modules are written atomically, so cancellation never leaves a partial
/// output file behind.
pub fn precompile_with_cancel(
  options: &PrecompileOptions,
  cancel: &AtomicBool,
) -> Result<PrecompileReport, PrecompileError> {
  let start = Instant::now();

  let source_root = dunce::canonicalize(&options.source_dir).map_err(|source| PrecompileError::SourceDir {
    path: options.source_dir.clone(),
    source,
  })?;
  if !source_root.is_dir() {
    return Err(PrecompileError::NotADirectory { path: source_root });
  }

  if !options.dry_run {
    std::fs::create_dir_all(&options.output_dir).map_err(|source| PrecompileError::OutputDir {
      path: options.output_dir.clone(),
      source,
    })?;
  }

  let engine = Provisioner::new(options.provision.clone())
    .resolve(&options.engine)
    .map_err(|source| PrecompileError::Provision {
      engine: options.engine.clone(),
      source,
    })?;
  info!(engine = %engine.name, location = %engine.location, "engine resolved");

  let mut sandbox = load_sandbox(&engine)?;
  let gate = options.known_helpers.gate();
  let layout = OutputLayout::new(&options.output_dir, options.hierarchy, &options.output_extension);

  let mut run = Run {
    options,
    engine: &engine,
    gate: &gate,
    cancel,
    bundles: Vec::new(),
    failures: Vec::new(),
    templates_compiled: 0,
  };

  for bundle in TemplateWalker::new(&source_root, &options.template_extensions, layout) {
    run.check_cancelled()?;
    run.process_bundle(sandbox.as_mut(), &bundle?)?;
  }

  if !run.failures.is_empty() {
    return Err(PrecompileError::CompileFailures(run.failures));
  }

  let report = PrecompileReport {
    engine: engine.clone(),
    bundles: run.bundles,
    templates_compiled: run.templates_compiled,
    dry_run: options.dry_run,
    elapsed: start.elapsed(),
  };
  info!(
    bundles = report.bundles.len(),
    templates = report.templates_compiled,
    elapsed_ms = report.elapsed.as_millis() as u64,
    "precompilation complete"
  );
  Ok(report)
}

/// Per-run state threaded through bundle processing.
struct Run<'a> {
  options: &'a PrecompileOptions,
  engine: &'a EngineDescriptor,
  gate: &'a HelperGate,
  cancel: &'a AtomicBool,
  bundles: Vec<AssembledModule>,
  failures: Vec<CompileFailure>,
  templates_compiled: usize,
}

impl Run<'_> {
  fn check_cancelled(&self) -> Result<(), PrecompileError> {
    if self.cancel.load(Ordering::Relaxed) {
      return Err(PrecompileError::Cancelled);
    }
    Ok(())
  }

  fn process_bundle(&mut self, sandbox: &mut dyn Sandbox, bundle: &Bundle) -> Result<(), PrecompileError> {
    info!(
      bundle = %bundle.source_dir.display(),
      output = %bundle.output_file.display(),
      templates = bundle.templates.len(),
      "precompiling bundle"
    );

    let mut compiled = Vec::with_capacity(bundle.templates.len());
    for template in &bundle.templates {
      self.check_cancelled()?;

      let text = template.read_text(self.options.encoding)?;
      let text = self.options.whitespace.apply(&text);

      match sandbox.compile(&text, self.gate) {
        Ok(fragment) => {
          debug!(template = %template.path.display(), bytes = fragment.len(), "compiled");
          compiled.push(CompiledTemplate {
            logical_name: template.logical_name.clone(),
            fragment,
          });
        }
        Err(source) if self.options.failure_policy == FailurePolicy::CollectAll => {
          warn!(template = %template.path.display(), error = %source, "template rejected, skipping");
          self.failures.push(CompileFailure {
            template: template.path.clone(),
            bundle: bundle.source_dir.clone(),
            message: source.message,
          });
        }
        Err(source) => {
          return Err(PrecompileError::Compile {
            engine: self.engine.name.clone(),
            template: template.path.clone(),
            bundle: bundle.source_dir.clone(),
            source,
          });
        }
      }
    }

    if compiled.is_empty() {
      debug!(bundle = %bundle.source_dir.display(), "every template rejected, no module written");
      return Ok(());
    }

    self.templates_compiled += compiled.len();
    let module = if self.options.dry_run {
      AssembledModule {
        path: bundle.output_file.clone(),
        templates: compiled.iter().map(|t| t.logical_name.clone()).collect(),
      }
    } else {
      assemble::assemble(bundle, &compiled, self.options.encoding)?
    };
    self.bundles.push(module);
    Ok(())
  }
}
