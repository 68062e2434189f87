//! Output module assembly.
//!
//! Each bundle becomes one self-registering module:
//!
//! ```js
//! (function() {
//!   var template = Handlebars.template, templates = Handlebars.templates = Handlebars.templates || {};
//! templates['name']=template(<compiled fragment>);
//! })();
//! ```
//!
//! Loading the module next to the engine registers every template under
//! `Handlebars.templates[name]`, reusing the registry if another module
//! created it first.

use std::io::Write;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::walk::Bundle;

const MODULE_PROLOGUE: &str = "(function() {\n  var template = Handlebars.template, templates = Handlebars.templates = Handlebars.templates || {};\n";

const MODULE_EPILOGUE: &str = "})();\n";

#[derive(Debug, Error)]
pub enum AssembleError {
  #[error("failed to create output directory {}: {source}", path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write output file {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("output file {} contains characters not representable in {encoding}", path.display())]
  Unencodable { path: PathBuf, encoding: &'static str },
}

/// A template compiled by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
  pub logical_name: String,
  pub fragment: String,
}

/// A module written for one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledModule {
  pub path: PathBuf,
  /// Logical names in registration order.
  pub templates: Vec<String>,
}

/// Render the module source for `templates`, in order.
pub fn render_module(templates: &[CompiledTemplate]) -> String {
  let body_len: usize = templates
    .iter()
    .map(|t| t.fragment.len() + t.logical_name.len() + 32)
    .sum();
  let mut out = String::with_capacity(MODULE_PROLOGUE.len() + body_len + MODULE_EPILOGUE.len());

  out.push_str(MODULE_PROLOGUE);
  for template in templates {
    out.push_str("templates[");
    out.push_str(&js_quote(&template.logical_name));
    out.push_str("]=template(");
    out.push_str(&template.fragment);
    out.push_str(");\n");
  }
  out.push_str(MODULE_EPILOGUE);
  out
}

/// Render and write the module for `bundle`.
pub fn assemble(
  bundle: &Bundle,
  templates: &[CompiledTemplate],
  encoding: &'static Encoding,
) -> Result<AssembledModule, AssembleError> {
  let contents = render_module(templates);
  write_module(&bundle.output_file, &contents, encoding)?;

  debug!(
    bundle = %bundle.source_dir.display(),
    path = %bundle.output_file.display(),
    templates = templates.len(),
    "module written"
  );

  Ok(AssembledModule {
    path: bundle.output_file.clone(),
    templates: templates.iter().map(|t| t.logical_name.clone()).collect(),
  })
}

/// Encode `contents` and atomically replace the file at `path`.
///
/// Missing parent directories are created. The text goes to a temporary
/// file in the destination directory first, so a failure leaves any
/// previous file untouched.
pub fn write_module(path: &Path, contents: &str, encoding: &'static Encoding) -> Result<(), AssembleError> {
  let (bytes, _, unmappable) = encoding.encode(contents);
  if unmappable {
    return Err(AssembleError::Unencodable {
      path: path.to_path_buf(),
      encoding: encoding.name(),
    });
  }

  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  std::fs::create_dir_all(dir).map_err(|source| AssembleError::CreateDir {
    path: dir.to_path_buf(),
    source,
  })?;

  let write_error = |source: std::io::Error| AssembleError::Write {
    path: path.to_path_buf(),
    source,
  };
  let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
  tmp.write_all(&bytes).map_err(write_error)?;
  tmp.flush().map_err(write_error)?;
  tmp.persist(path).map_err(|e| write_error(e.error))?;
  Ok(())
}

/// Quote `value` as a single-quoted JavaScript string literal.
fn js_quote(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 2);
  out.push('\'');
  for c in value.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '\'' => out.push_str("\\'"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\u{2028}' => out.push_str("\\u2028"),
      '\u{2029}' => out.push_str("\\u2029"),
      c => out.push(c),
    }
  }
  out.push('\'');
  out
}
