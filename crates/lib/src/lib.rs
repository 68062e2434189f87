//! tmplc-lib: build-time template precompilation.
//!
//! Walks a tree of template files, compiles every template with an embedded
//! templating engine, and writes one self-registering JavaScript module per
//! directory:
//! - `engine`: locating the engine script (bundled, cached or downloaded)
//! - `sandbox`: evaluating the engine and calling its compiler
//! - `walk`: turning the source tree into bundles and output paths
//! - `assemble`: writing compiled bundles as modules
//! - `precompile`: the pipeline tying them together
//! - `config`: layered configuration, including Lua config files

pub mod assemble;
pub mod config;
pub mod consts;
pub mod engine;
pub mod platform;
pub mod precompile;
pub mod sandbox;
pub mod walk;

pub use precompile::{PrecompileError, PrecompileOptions, PrecompileReport, precompile, precompile_with_cancel};
