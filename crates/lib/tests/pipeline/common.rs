//! Shared helpers for pipeline tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tmplc_lib::PrecompileOptions;

pub const JS_ENGINE: &str = "fake-handlebars.js";
pub const LUA_ENGINE: &str = "fake-handlebars.lua";

/// Path to a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// A scratch template tree with its own output, cache and script directories.
pub struct TestTree {
  pub temp: TempDir,
}

impl TestTree {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("root")).unwrap();
    Self { temp }
  }

  /// Source root. Named `root` so preserve mode writes `root.js` for it.
  pub fn source(&self) -> PathBuf {
    self.temp.path().join("root")
  }

  pub fn output(&self) -> PathBuf {
    self.temp.path().join("out")
  }

  pub fn cache(&self) -> PathBuf {
    self.temp.path().join("cache")
  }

  /// Write a file relative to the source root.
  pub fn write(&self, relative_path: &str, content: &str) {
    let path = self.source().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn read_output(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.output().join(relative_path))
      .unwrap_or_else(|e| panic!("missing output {}: {}", relative_path, e))
  }

  /// Every file under the output directory, relative and sorted.
  pub fn output_files(&self) -> Vec<String> {
    let mut files = Vec::new();
    collect_files(&self.output(), &self.output(), &mut files);
    files.sort();
    files
  }

  /// Options that load `engine` from the fixtures directory, never the network.
  pub fn options(&self, engine: &str) -> PrecompileOptions {
    let mut options = PrecompileOptions::new(self.source());
    options.output_dir = self.output();
    options.engine = engine.to_string();
    options.provision.script_dirs = vec![fixture_path("")];
    options.provision.cache_dir = self.cache();
    options.provision.offline = true;
    options
  }
}

fn collect_files(base: &Path, dir: &Path, files: &mut Vec<String>) {
  let Ok(entries) = std::fs::read_dir(dir) else {
    return;
  };
  for entry in entries {
    let path = entry.unwrap().path();
    if path.is_dir() {
      collect_files(base, &path, files);
    } else {
      let relative = path.strip_prefix(base).unwrap();
      files.push(relative.to_string_lossy().replace('\\', "/"));
    }
  }
}
