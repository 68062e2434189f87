//! Engine script provisioning.
//!
//! The templating engine is an opaque, versioned script. This module resolves
//! an engine identifier (e.g. `handlebars-1.0.12.min.js`) to a readable file,
//! trying in order:
//!
//! 1. A bundled script directory shipped with the installation
//! 2. The local engine cache
//! 3. A network fetch that populates the cache
//!
//! # Submodules
//!
//! - [`fetch`] - Blocking HTTP client with single-hop redirect handling
//! - [`provision`] - Resolution order and cache management

pub mod fetch;
pub mod provision;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub use provision::{EngineRemote, ProvisionOptions, Provisioner};

/// Errors that can occur while provisioning an engine script.
#[derive(Debug, Error)]
pub enum ProvisionError {
  /// The engine identifier cannot be used as a file name.
  #[error("invalid engine identifier '{0}': must be a plain file name")]
  InvalidName(String),

  /// The engine is neither bundled nor cached and fetching is disabled.
  #[error("engine '{engine}' is not cached in {} and offline mode is enabled", cache_dir.display())]
  Offline { engine: String, cache_dir: PathBuf },

  /// The HTTP client could not be constructed.
  #[error("failed to create HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  /// The request could not be sent or the body could not be read.
  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// The server answered with a non-success status.
  #[error("request to {url} failed: HTTP {status}")]
  Status { url: String, status: u16 },

  /// A redirect response had no usable `Location` header.
  #[error("invalid redirect from {url}: {message}")]
  InvalidRedirect { url: String, message: String },

  /// The redirect target redirected again.
  #[error("too many redirects: {url} redirected again after one hop")]
  TooManyRedirects { url: String },

  /// The metadata endpoint returned something other than a download list.
  #[error("invalid engine metadata from {url}: {source}")]
  Metadata {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// No metadata entry matches the engine identifier.
  #[error("engine '{engine}' is not listed at {url}")]
  NotListed { engine: String, url: String },

  /// The download finished without any content.
  #[error("download from {url} was empty")]
  EmptyDownload { url: String },

  /// Filesystem error while creating the cache directory or writing into it.
  #[error("cache error at {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Where a resolved engine script was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum EngineLocation {
  /// Shipped in a bundled script directory.
  Bundled(PathBuf),
  /// Already present in the engine cache.
  Cached(PathBuf),
  /// Downloaded into the engine cache during this run.
  Fetched(PathBuf),
}

impl EngineLocation {
  /// Path of the engine script on disk.
  pub fn path(&self) -> &Path {
    match self {
      EngineLocation::Bundled(path) | EngineLocation::Cached(path) | EngineLocation::Fetched(path) => path,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      EngineLocation::Bundled(_) => "bundled",
      EngineLocation::Cached(_) => "cached",
      EngineLocation::Fetched(_) => "fetched",
    }
  }
}

impl fmt::Display for EngineLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.as_str(), self.path().display())
  }
}

/// An engine identifier resolved to a concrete script.
///
/// Resolved once per run and shared read-only by every bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineDescriptor {
  pub name: String,
  pub location: EngineLocation,
}

impl EngineDescriptor {
  pub fn new(name: impl Into<String>, location: EngineLocation) -> Self {
    Self {
      name: name.into(),
      location,
    }
  }

  /// Read the engine script source.
  pub fn read_source(&self) -> std::io::Result<String> {
    std::fs::read_to_string(self.location.path())
  }
}

/// A named file inside the engine cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
  pub cache_dir: PathBuf,
  pub file_name: String,
}

impl CacheEntry {
  pub fn new(cache_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
    Self {
      cache_dir: cache_dir.into(),
      file_name: file_name.into(),
    }
  }

  pub fn path(&self) -> PathBuf {
    self.cache_dir.join(&self.file_name)
  }

  /// A hit means the file already exists in the cache directory.
  pub fn is_hit(&self) -> bool {
    self.path().is_file()
  }

  /// Create the cache directory and its parents if missing.
  pub fn ensure_dir(&self) -> Result<(), ProvisionError> {
    std::fs::create_dir_all(&self.cache_dir).map_err(|source| ProvisionError::Io {
      path: self.cache_dir.clone(),
      source,
    })
  }
}

/// Reject identifiers that would escape the lookup directories.
pub(crate) fn validate_engine_name(name: &str) -> Result<(), ProvisionError> {
  let invalid = name.is_empty()
    || name == "."
    || name == ".."
    || name.contains('/')
    || name.contains('\\')
    || name.contains('\0');
  if invalid {
    return Err(ProvisionError::InvalidName(name.to_string()));
  }
  Ok(())
}
