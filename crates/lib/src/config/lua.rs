//! Loading a [`PrecompileConfig`] from a Lua config file.
//!
//! ```lua
//! return {
//!   sourceDirectory = "src/main/webapp/templates",
//!   outputDirectory = "target/js/templates",
//!   templateExtensions = { "hbs", "html" },
//!   preserveHierarchy = false,
//!   knownHelpers = { "link", "t" },
//!   knownHelpersOnly = true,
//!   engineIdentifier = "handlebars-1.0.12.min.js",
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use mlua::prelude::*;
use tracing::debug;

use super::{CONFIG_KEYS, ConfigError, PrecompileConfig};
use crate::precompile::FailurePolicy;

/// Evaluate the config file at `path` and read its returned table.
///
/// Relative paths in the file resolve against the file's own directory.
pub fn load_config_file(path: &Path) -> Result<PrecompileConfig, ConfigError> {
  let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  let lua = Lua::new();
  let value: LuaValue = lua
    .load(source.as_str())
    .set_name(format!("@{}", path.display()))
    .eval()
    .map_err(|e| ConfigError::Lua {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;

  let LuaValue::Table(table) = value else {
    return Err(ConfigError::NotATable {
      path: path.to_path_buf(),
    });
  };

  let base_dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  };

  debug!(path = %path.display(), "loading config file");
  parse_config_table(&table, &base_dir)
}

/// Read every recognized key out of a config table.
pub fn parse_config_table(table: &LuaTable, base_dir: &Path) -> Result<PrecompileConfig, ConfigError> {
  let reader = TableReader { table, base_dir };
  reader.reject_unknown_keys()?;

  Ok(PrecompileConfig {
    source_directory: reader.path("sourceDirectory")?,
    output_directory: reader.path("outputDirectory")?,
    template_extensions: reader.string_list("templateExtensions")?,
    preserve_hierarchy: reader.boolean("preserveHierarchy")?,
    purge_whitespace: reader.boolean("purgeWhitespace")?,
    known_helpers: reader.string_list("knownHelpers")?,
    known_helpers_only: reader.boolean("knownHelpersOnly")?,
    encoding: reader.string("encoding")?,
    engine_identifier: match reader.string("engineIdentifier")? {
      Some(engine) => Some(engine),
      None => reader.string("handlebarsName")?,
    },
    cache_directory: reader.path("cacheDirectory")?,
    script_directories: reader.path_list("scriptDirectories")?,
    engine_url: reader.string("engineUrl")?,
    engine_url_template: reader.string("engineUrlTemplate")?,
    offline: reader.boolean("offline")?,
    timeout: reader.seconds("timeoutSecs")?,
    output_extension: reader.string("outputExtension")?,
    failure_policy: reader.failure_policy("failurePolicy")?,
    dry_run: reader.boolean("dryRun")?,
  })
}

struct TableReader<'a> {
  table: &'a LuaTable,
  base_dir: &'a Path,
}

impl TableReader<'_> {
  fn reject_unknown_keys(&self) -> Result<(), ConfigError> {
    for pair in self.table.pairs::<LuaValue, LuaValue>() {
      let (key, _) = pair.map_err(|e| invalid("<table>", e.to_string()))?;
      let name = match &key {
        LuaValue::String(s) => s.to_string_lossy(),
        other => {
          return Err(ConfigError::UnknownKey {
            key: format!("<{}>", other.type_name()),
          });
        }
      };
      if !CONFIG_KEYS.contains(&name.as_str()) {
        return Err(ConfigError::UnknownKey { key: name });
      }
    }
    Ok(())
  }

  fn raw(&self, key: &str) -> Result<LuaValue, ConfigError> {
    self.table.get(key).map_err(|e| invalid(key, e.to_string()))
  }

  fn string(&self, key: &str) -> Result<Option<String>, ConfigError> {
    match self.raw(key)? {
      LuaValue::Nil => Ok(None),
      value => as_string(key, &value).map(Some),
    }
  }

  fn boolean(&self, key: &str) -> Result<Option<bool>, ConfigError> {
    match self.raw(key)? {
      LuaValue::Nil => Ok(None),
      LuaValue::Boolean(b) => Ok(Some(b)),
      other => Err(invalid(key, format!("expected a boolean, got {}", other.type_name()))),
    }
  }

  /// A positive number of seconds; fractions are allowed.
  fn seconds(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
    match self.raw(key)? {
      LuaValue::Nil => Ok(None),
      LuaValue::Integer(n) if n > 0 => Ok(Some(Duration::from_secs(n as u64))),
      LuaValue::Number(n) if n > 0.0 && n.is_finite() => Ok(Some(Duration::from_secs_f64(n))),
      other => Err(invalid(key, format!("expected a positive number of seconds, got {other:?}"))),
    }
  }

  /// A single string or an array of strings.
  fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
    match self.raw(key)? {
      LuaValue::Nil => Ok(None),
      LuaValue::Table(list) => {
        let entries = list.pairs::<LuaValue, LuaValue>().count();
        if entries != list.raw_len() {
          return Err(invalid(key, "expected an array of strings, got a table with named keys".to_string()));
        }
        let mut items = Vec::new();
        for value in list.sequence_values::<LuaValue>() {
          let value = value.map_err(|e| invalid(key, e.to_string()))?;
          items.push(as_string(key, &value)?);
        }
        Ok(Some(items))
      }
      value => as_string(key, &value).map(|s| Some(vec![s])),
    }
  }

  fn path(&self, key: &str) -> Result<Option<PathBuf>, ConfigError> {
    Ok(self.string(key)?.map(|p| self.resolve_path(&p)))
  }

  fn path_list(&self, key: &str) -> Result<Option<Vec<PathBuf>>, ConfigError> {
    Ok(
      self
        .string_list(key)?
        .map(|paths| paths.iter().map(|p| self.resolve_path(p)).collect()),
    )
  }

  fn failure_policy(&self, key: &str) -> Result<Option<FailurePolicy>, ConfigError> {
    let Some(value) = self.string(key)? else {
      return Ok(None);
    };
    match value.as_str() {
      "fail-fast" => Ok(Some(FailurePolicy::FailFast)),
      "collect-all" => Ok(Some(FailurePolicy::CollectAll)),
      other => Err(invalid(
        key,
        format!("expected 'fail-fast' or 'collect-all', got '{other}'"),
      )),
    }
  }

  fn resolve_path(&self, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.base_dir.join(path)
    }
  }
}

fn as_string(key: &str, value: &LuaValue) -> Result<String, ConfigError> {
  match value {
    LuaValue::String(s) => s
      .to_str()
      .map(|s| String::from(&*s))
      .map_err(|e| invalid(key, e.to_string())),
    other => Err(invalid(key, format!("expected a string, got {}", other.type_name()))),
  }
}

fn invalid(key: &str, message: String) -> ConfigError {
  ConfigError::InvalidValue {
    key: key.to_string(),
    message,
  }
}
