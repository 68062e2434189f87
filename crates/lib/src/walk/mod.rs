//! Template discovery.
//!
//! [`TemplateWalker`] visits the source tree depth-first, pre-order, and
//! yields one [`Bundle`] per directory that directly contains template
//! files. Directories without templates yield nothing but are still
//! descended into. Siblings and templates are visited in file-name order so
//! output is reproducible.

pub mod output_path;

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub use output_path::{HierarchyPolicy, OutputLayout};

/// Errors that can occur while walking the source tree.
#[derive(Debug, Error)]
pub enum WalkError {
  #[error("failed to traverse {}: {source}", path.display())]
  Traverse {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to list directory {}: {source}", path.display())]
  ListDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read template {}: {source}", path.display())]
  ReadTemplate {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("template {} is not valid {encoding}", path.display())]
  Decode { path: PathBuf, encoding: &'static str },
}

/// A template file discovered in a bundle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
  pub path: PathBuf,
  /// File name without its final extension.
  pub logical_name: String,
}

impl TemplateSource {
  pub fn new(path: PathBuf) -> Self {
    let logical_name = path
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_default();
    Self { path, logical_name }
  }

  /// Read and decode the template text.
  ///
  /// Malformed input is an error rather than being replaced.
  pub fn read_text(&self, encoding: &'static Encoding) -> Result<String, WalkError> {
    let bytes = fs::read(&self.path).map_err(|source| WalkError::ReadTemplate {
      path: self.path.clone(),
      source,
    })?;

    let (text, had_errors) = encoding.decode_with_bom_removal(&bytes);
    if had_errors {
      return Err(WalkError::Decode {
        path: self.path.clone(),
        encoding: encoding.name(),
      });
    }
    Ok(text.into_owned())
  }
}

/// The templates found directly within one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
  pub source_dir: PathBuf,
  /// `source_dir` relative to the walk root (empty for the root itself).
  pub relative_dir: PathBuf,
  pub output_file: PathBuf,
  /// Never empty; sorted by file name.
  pub templates: Vec<TemplateSource>,
}

/// Lazily yields bundles from a source tree.
pub struct TemplateWalker {
  root: PathBuf,
  extensions: Vec<String>,
  layout: OutputLayout,
  entries: walkdir::IntoIter,
}

impl TemplateWalker {
  /// Walk `root`, treating files whose final extension is in `extensions`
  /// as templates. Extensions match case-sensitively, with or without a
  /// leading dot.
  pub fn new<S: AsRef<str>>(root: impl Into<PathBuf>, extensions: &[S], layout: OutputLayout) -> Self {
    let root = root.into();
    let extensions = extensions
      .iter()
      .map(|ext| ext.as_ref().trim_start_matches('.').to_string())
      .filter(|ext| !ext.is_empty())
      .collect();
    let entries = WalkDir::new(&root)
      .follow_links(false)
      .sort_by_file_name()
      .into_iter();

    Self {
      root,
      extensions,
      layout,
      entries,
    }
  }

  fn is_template(&self, path: &Path) -> bool {
    path
      .extension()
      .and_then(OsStr::to_str)
      .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
  }

  /// Form the bundle for `dir`, or `None` when it holds no templates.
  fn bundle_for(&self, dir: &Path) -> Result<Option<Bundle>, WalkError> {
    let list_error = |source: std::io::Error| WalkError::ListDir {
      path: dir.to_path_buf(),
      source,
    };

    let mut templates = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_error)? {
      let path = entry.map_err(list_error)?.path();
      if path.is_file() && self.is_template(&path) {
        templates.push(TemplateSource::new(path));
      }
    }

    if templates.is_empty() {
      debug!(dir = %dir.display(), "no templates");
      return Ok(None);
    }
    templates.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    warn_on_collisions(dir, &templates);

    let relative_dir = dir.strip_prefix(&self.root).unwrap_or(Path::new("")).to_path_buf();
    let dir_name = dir
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();
    let output_file = self.layout.output_path_for(&relative_dir, &dir_name);

    Ok(Some(Bundle {
      source_dir: dir.to_path_buf(),
      relative_dir,
      output_file,
      templates,
    }))
  }
}

impl Iterator for TemplateWalker {
  type Item = Result<Bundle, WalkError>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let entry = match self.entries.next()? {
        Ok(entry) => entry,
        Err(source) => {
          let path = source.path().unwrap_or(&self.root).to_path_buf();
          return Some(Err(WalkError::Traverse { path, source }));
        }
      };

      if !entry.file_type().is_dir() {
        continue;
      }

      match self.bundle_for(entry.path()) {
        Ok(Some(bundle)) => return Some(Ok(bundle)),
        Ok(None) => continue,
        Err(e) => return Some(Err(e)),
      }
    }
  }
}

/// Later templates overwrite earlier ones with the same logical name.
fn warn_on_collisions(dir: &Path, templates: &[TemplateSource]) {
  let mut seen = HashSet::new();
  for template in templates {
    if !seen.insert(template.logical_name.as_str()) {
      warn!(
        dir = %dir.display(),
        name = %template.logical_name,
        path = %template.path.display(),
        "duplicate template name, the later file wins"
      );
    }
  }
}
