//! Isolated script execution for the engine compiler.
//!
//! A sandbox evaluates the engine source once and then serves one
//! `Handlebars.precompile(data, options)` call per template. Engine globals
//! persist between calls, so a sandbox must not be shared between threads;
//! concurrent callers each load their own.
//!
//! The runtime is chosen from the engine identifier: `.lua` engines run in
//! an embedded Lua 5.4 state, everything else in an embedded JavaScript
//! context.

pub mod gate;
pub mod js;
pub mod lua;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::engine::EngineDescriptor;

pub use gate::HelperGate;
pub use js::JsSandbox;
pub use lua::LuaSandbox;

/// Global object every engine must define.
pub const ENGINE_GLOBAL: &str = "Handlebars";

/// Compile entrypoint on [`ENGINE_GLOBAL`].
pub const COMPILE_ENTRYPOINT: &str = "precompile";

/// Errors raised while loading an engine into a sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
  #[error("failed to read engine script {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Evaluating the engine source raised an error.
  #[error("failed to load engine '{engine}': {message}")]
  Load { engine: String, message: String },

  /// The engine evaluated cleanly but exposes no compile entrypoint.
  #[error("engine '{engine}' does not define {}.{}", ENGINE_GLOBAL, COMPILE_ENTRYPOINT)]
  MissingEntrypoint { engine: String },
}

/// The engine rejected a template.
///
/// Carries the engine's own diagnostic, including helper-gate rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
  pub message: String,
}

impl CompileError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Script runtime hosting an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptRuntime {
  JavaScript,
  Lua,
}

impl ScriptRuntime {
  /// Pick the runtime for an engine identifier by its extension.
  pub fn for_engine(name: &str) -> Self {
    if name.ends_with(".lua") {
      ScriptRuntime::Lua
    } else {
      ScriptRuntime::JavaScript
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      ScriptRuntime::JavaScript => "javascript",
      ScriptRuntime::Lua => "lua",
    }
  }
}

impl fmt::Display for ScriptRuntime {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// An execution context with an engine loaded into it.
pub trait Sandbox {
  fn runtime(&self) -> ScriptRuntime;

  /// Compile one template to a fragment of module source.
  fn compile(&mut self, template: &str, gate: &HelperGate) -> Result<String, CompileError>;
}

/// Read the engine script and evaluate it into a fresh sandbox.
pub fn load_sandbox(engine: &EngineDescriptor) -> Result<Box<dyn Sandbox>, SandboxError> {
  let source = engine.read_source().map_err(|source| SandboxError::Read {
    path: engine.location.path().to_path_buf(),
    source,
  })?;

  let runtime = ScriptRuntime::for_engine(&engine.name);
  debug!(engine = %engine.name, %runtime, bytes = source.len(), "loading engine");

  let sandbox: Box<dyn Sandbox> = match runtime {
    ScriptRuntime::JavaScript => Box::new(JsSandbox::load(&engine.name, &source)?),
    ScriptRuntime::Lua => Box::new(LuaSandbox::load(&engine.name, &source)?),
  };
  Ok(sandbox)
}
