//! Layered configuration for a precompilation run.
//!
//! Values come from built-in defaults, then an optional Lua config file, then
//! command-line flags, each layer overriding the one before it. Every layer is
//! a [`PrecompileConfig`] with optional fields; [`PrecompileConfig::resolve`]
//! turns the merged result into [`PrecompileOptions`].

pub mod lua;

use std::path::{Path, PathBuf};
use std::time::Duration;

use encoding_rs::Encoding;
use thiserror::Error;

use crate::consts::{CONFIG_FILE_NAME, DEFAULT_ENCODING, DEFAULT_ENGINE};
use crate::engine::{EngineRemote, ProvisionOptions};
use crate::precompile::{FailurePolicy, KnownHelpersConfig, PrecompileOptions, WhitespacePolicy};
use crate::walk::HierarchyPolicy;

pub use lua::load_config_file;

/// Keys recognized in a config file.
pub const CONFIG_KEYS: &[&str] = &[
  "sourceDirectory",
  "outputDirectory",
  "templateExtensions",
  "preserveHierarchy",
  "purgeWhitespace",
  "knownHelpers",
  "knownHelpersOnly",
  "encoding",
  "engineIdentifier",
  "handlebarsName",
  "cacheDirectory",
  "scriptDirectories",
  "engineUrl",
  "engineUrlTemplate",
  "offline",
  "timeoutSecs",
  "outputExtension",
  "failurePolicy",
  "dryRun",
];

/// Errors raised while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {}", path.display())]
  NotFound { path: PathBuf },

  #[error("failed to read config file {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to evaluate config file {}: {message}", path.display())]
  Lua { path: PathBuf, message: String },

  #[error("config file {} must return a table", path.display())]
  NotATable { path: PathBuf },

  #[error("unknown config key '{key}'")]
  UnknownKey { key: String },

  #[error("invalid value for '{key}': {message}")]
  InvalidValue { key: String, message: String },

  #[error("unknown encoding '{label}'")]
  UnknownEncoding { label: String },

  #[error("no source directory configured")]
  MissingSource,

  #[error("engineUrl and engineUrlTemplate are mutually exclusive")]
  ConflictingRemote,

  #[error("engine URL template '{template}' has no {{name}} placeholder")]
  InvalidUrlTemplate { template: String },
}

/// One configuration layer. `None` means "not set at this layer".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrecompileConfig {
  pub source_directory: Option<PathBuf>,
  pub output_directory: Option<PathBuf>,
  pub template_extensions: Option<Vec<String>>,
  pub preserve_hierarchy: Option<bool>,
  pub purge_whitespace: Option<bool>,
  pub known_helpers: Option<Vec<String>>,
  pub known_helpers_only: Option<bool>,
  pub encoding: Option<String>,
  pub engine_identifier: Option<String>,
  pub cache_directory: Option<PathBuf>,
  pub script_directories: Option<Vec<PathBuf>>,
  pub engine_url: Option<String>,
  pub engine_url_template: Option<String>,
  pub offline: Option<bool>,
  pub timeout: Option<Duration>,
  pub output_extension: Option<String>,
  pub failure_policy: Option<FailurePolicy>,
  pub dry_run: Option<bool>,
}

impl PrecompileConfig {
  /// Overlay `other` on top of `self`; fields set in `other` win.
  pub fn merge(self, other: PrecompileConfig) -> PrecompileConfig {
    // The two remote modes are one setting; a layer that picks either
    // replaces both.
    let remote_set = other.engine_url.is_some() || other.engine_url_template.is_some();
    PrecompileConfig {
      source_directory: other.source_directory.or(self.source_directory),
      output_directory: other.output_directory.or(self.output_directory),
      template_extensions: other.template_extensions.or(self.template_extensions),
      preserve_hierarchy: other.preserve_hierarchy.or(self.preserve_hierarchy),
      purge_whitespace: other.purge_whitespace.or(self.purge_whitespace),
      known_helpers: other.known_helpers.or(self.known_helpers),
      known_helpers_only: other.known_helpers_only.or(self.known_helpers_only),
      encoding: other.encoding.or(self.encoding),
      engine_identifier: other.engine_identifier.or(self.engine_identifier),
      cache_directory: other.cache_directory.or(self.cache_directory),
      script_directories: other.script_directories.or(self.script_directories),
      engine_url: if remote_set { other.engine_url } else { self.engine_url },
      engine_url_template: if remote_set {
        other.engine_url_template
      } else {
        self.engine_url_template
      },
      offline: other.offline.or(self.offline),
      timeout: other.timeout.or(self.timeout),
      output_extension: other.output_extension.or(self.output_extension),
      failure_policy: other.failure_policy.or(self.failure_policy),
      dry_run: other.dry_run.or(self.dry_run),
    }
  }

  /// Fill in defaults and validate.
  pub fn resolve(self) -> Result<PrecompileOptions, ConfigError> {
    let provision = self.provision_options()?;
    let engine = self.engine();
    let source_dir = self.source_directory.ok_or(ConfigError::MissingSource)?;
    let mut options = PrecompileOptions::new(source_dir);
    options.provision = provision;
    options.engine = engine;

    if let Some(output_dir) = self.output_directory {
      options.output_dir = output_dir;
    }
    if let Some(extensions) = self.template_extensions {
      options.template_extensions = extensions
        .into_iter()
        .map(|ext| ext.trim_start_matches('.').to_string())
        .collect();
    }
    if let Some(extension) = self.output_extension {
      options.output_extension = extension.trim_start_matches('.').to_string();
    }
    if let Some(preserve_hierarchy) = self.preserve_hierarchy {
      options.hierarchy = HierarchyPolicy { preserve_hierarchy };
    }
    options.whitespace = WhitespacePolicy {
      purge: self.purge_whitespace.unwrap_or(false),
    };
    options.known_helpers = KnownHelpersConfig {
      names: self.known_helpers.unwrap_or_default(),
      strict_only: self.known_helpers_only.unwrap_or(false),
    };
    options.encoding = resolve_encoding(self.encoding.as_deref().unwrap_or(DEFAULT_ENCODING))?;
    options.failure_policy = self.failure_policy.unwrap_or_default();
    options.dry_run = self.dry_run.unwrap_or(false);

    Ok(options)
  }

  /// The configured engine identifier, or the default engine.
  pub fn engine(&self) -> String {
    self
      .engine_identifier
      .clone()
      .unwrap_or_else(|| DEFAULT_ENGINE.to_string())
  }

  /// Engine lookup settings, without requiring a source directory.
  pub fn provision_options(&self) -> Result<ProvisionOptions, ConfigError> {
    let mut provision = ProvisionOptions::default();
    if let Some(cache_dir) = &self.cache_directory {
      provision.cache_dir = cache_dir.clone();
    }
    if let Some(script_dirs) = &self.script_directories {
      provision.script_dirs = script_dirs.clone();
    }
    provision.remote = match (&self.engine_url, &self.engine_url_template) {
      (Some(_), Some(_)) => return Err(ConfigError::ConflictingRemote),
      (Some(url), None) => EngineRemote::Metadata { url: url.clone() },
      (None, Some(url)) if !url.contains("{name}") => {
        return Err(ConfigError::InvalidUrlTemplate { template: url.clone() });
      }
      (None, Some(url)) => EngineRemote::Template { url: url.clone() },
      (None, None) => EngineRemote::default(),
    };
    provision.offline = self.offline.unwrap_or(false);
    if let Some(timeout) = self.timeout {
      if timeout.is_zero() {
        return Err(ConfigError::InvalidValue {
          key: "timeout".to_string(),
          message: "must be greater than zero".to_string(),
        });
      }
      provision.timeout = timeout;
    }
    Ok(provision)
  }
}

/// Look up an encoding by its WHATWG label (`UTF-8`, `latin1`, `shift_jis`...).
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, ConfigError> {
  Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| ConfigError::UnknownEncoding {
    label: label.to_string(),
  })
}

/// Find the config file to load, if any.
///
/// An explicit path must exist. Otherwise `./tmplc.lua` is used when present,
/// and no file at all is fine.
pub fn find_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
  if let Some(path) = explicit {
    if path.is_file() {
      return Ok(Some(path.to_path_buf()));
    }
    return Err(ConfigError::NotFound {
      path: path.to_path_buf(),
    });
  }

  let cwd_config = PathBuf::from(".").join(CONFIG_FILE_NAME);
  if cwd_config.is_file() {
    return Ok(Some(cwd_config));
  }
  Ok(None)
}
