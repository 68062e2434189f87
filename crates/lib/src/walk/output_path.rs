//! Output file placement for bundles.

use std::path::{Component, Path, PathBuf};

use crate::consts::{FLATTEN_SEPARATOR, ROOT_BUNDLE_NAME};

/// Whether output paths mirror the source tree or flatten it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyPolicy {
  pub preserve_hierarchy: bool,
}

impl HierarchyPolicy {
  pub const PRESERVE: Self = Self {
    preserve_hierarchy: true,
  };
  pub const FLATTEN: Self = Self {
    preserve_hierarchy: false,
  };
}

impl Default for HierarchyPolicy {
  fn default() -> Self {
    Self::PRESERVE
  }
}

/// Maps a bundle's source directory to its output module path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
  pub output_root: PathBuf,
  pub policy: HierarchyPolicy,
  /// Extension of generated modules, without the leading dot.
  pub extension: String,
}

impl OutputLayout {
  pub fn new(output_root: impl Into<PathBuf>, policy: HierarchyPolicy, extension: impl Into<String>) -> Self {
    Self {
      output_root: output_root.into(),
      policy,
      extension: extension.into(),
    }
  }

  /// Output path for the directory at `relative_dir` under the source root.
  ///
  /// `dir_name` is the directory's own base name, used in preserve mode
  /// (the source root has an empty `relative_dir` but still has a name).
  ///
  /// - Preserve: `<output>/<relative_dir>/<dir_name>.<ext>`
  /// - Flatten: `<output>/<relative parts joined by '-'>.<ext>`, or
  ///   `<output>/index.<ext>` for the source root
  ///
  /// Only computes the path; the writer creates missing directories.
  pub fn output_path_for(&self, relative_dir: &Path, dir_name: &str) -> PathBuf {
    if self.policy.preserve_hierarchy {
      let name = if dir_name.is_empty() { ROOT_BUNDLE_NAME } else { dir_name };
      self.output_root.join(relative_dir).join(self.file_name(name))
    } else {
      let name = flatten(relative_dir);
      let name = if name.is_empty() { ROOT_BUNDLE_NAME.to_string() } else { name };
      self.output_root.join(self.file_name(&name))
    }
  }

  fn file_name(&self, stem: &str) -> String {
    if self.extension.is_empty() {
      stem.to_string()
    } else {
      format!("{}.{}", stem, self.extension)
    }
  }
}

/// Join the normal components of `relative_dir` with the flatten separator.
fn flatten(relative_dir: &Path) -> String {
  relative_dir
    .components()
    .filter_map(|component| match component {
      Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
      _ => None,
    })
    .collect::<Vec<_>>()
    .join(FLATTEN_SEPARATOR)
}
