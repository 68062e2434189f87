mod fetch;
mod precompile;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use tmplc_lib::config::{PrecompileConfig, find_config_path, load_config_file};

pub use fetch::{FetchArgs, cmd_fetch};
pub use precompile::{PrecompileArgs, cmd_precompile};

/// Merge the config file (explicit or `./tmplc.lua`) under the flag layer.
fn layered_config(explicit: Option<&PathBuf>, flags: PrecompileConfig) -> Result<PrecompileConfig> {
  let file = match find_config_path(explicit.map(PathBuf::as_path))? {
    Some(path) => {
      debug!(path = %path.display(), "using config file");
      load_config_file(&path).with_context(|| format!("Failed to load config file {}", path.display()))?
    }
    None => PrecompileConfig::default(),
  };
  Ok(file.merge(flags))
}
