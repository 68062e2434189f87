//! Engine resolution: bundled script, then cache, then network.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use super::fetch::HttpFetcher;
use super::{CacheEntry, EngineDescriptor, EngineLocation, ProvisionError, validate_engine_name};
use crate::consts::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_METADATA_URL};
use crate::platform::paths;

/// How a download location is derived for an engine that is not cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineRemote {
  /// Look the engine up by exact name in a JSON download listing.
  Metadata { url: String },
  /// Substitute the engine identifier for `{name}` in a URL template.
  Template { url: String },
}

impl Default for EngineRemote {
  fn default() -> Self {
    EngineRemote::Metadata {
      url: DEFAULT_METADATA_URL.to_string(),
    }
  }
}

/// Options controlling where engine scripts are looked up.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
  /// Directories holding bundled engine scripts, searched in order.
  pub script_dirs: Vec<PathBuf>,
  /// Directory where fetched scripts are cached.
  pub cache_dir: PathBuf,
  pub remote: EngineRemote,
  /// Fail instead of fetching on a cache miss.
  pub offline: bool,
  pub timeout: Duration,
}

impl Default for ProvisionOptions {
  fn default() -> Self {
    Self {
      script_dirs: vec![paths::bundled_script_dir()],
      cache_dir: paths::script_cache_dir(),
      remote: EngineRemote::default(),
      offline: false,
      timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
    }
  }
}

/// Resolves engine identifiers to readable scripts.
#[derive(Debug, Clone)]
pub struct Provisioner {
  options: ProvisionOptions,
}

impl Provisioner {
  pub fn new(options: ProvisionOptions) -> Self {
    Self { options }
  }

  /// Resolve `engine` to a script on disk.
  ///
  /// Bundled scripts win over cached ones; the network is only touched on a
  /// cache miss, and then exactly one file is written into the cache.
  pub fn resolve(&self, engine: &str) -> Result<EngineDescriptor, ProvisionError> {
    validate_engine_name(engine)?;

    if let Some(path) = self.find_bundled(engine) {
      debug!(engine, path = %path.display(), "using bundled engine");
      return Ok(EngineDescriptor::new(engine, EngineLocation::Bundled(path)));
    }

    let entry = CacheEntry::new(&self.options.cache_dir, engine);
    if entry.is_hit() {
      debug!(engine, path = %entry.path().display(), "using cached engine");
      return Ok(EngineDescriptor::new(engine, EngineLocation::Cached(entry.path())));
    }

    if self.options.offline {
      return Err(ProvisionError::Offline {
        engine: engine.to_string(),
        cache_dir: self.options.cache_dir.clone(),
      });
    }

    let path = self.fetch(engine, &entry)?;
    Ok(EngineDescriptor::new(engine, EngineLocation::Fetched(path)))
  }

  fn find_bundled(&self, engine: &str) -> Option<PathBuf> {
    self
      .options
      .script_dirs
      .iter()
      .map(|dir| dir.join(engine))
      .find(|candidate| candidate.is_file())
  }

  fn fetch(&self, engine: &str, entry: &CacheEntry) -> Result<PathBuf, ProvisionError> {
    let fetcher = HttpFetcher::new(self.options.timeout)?;

    let url = match &self.options.remote {
      EngineRemote::Metadata { url } => fetcher.lookup(url, engine)?,
      EngineRemote::Template { url } => url.replace("{name}", engine),
    };

    entry.ensure_dir()?;
    let dest = entry.path();
    fetcher.download_to(&url, &dest)?;
    info!(engine, url = %url, "engine fetched");
    Ok(dest)
  }
}
