//! Application-wide constants and defaults.

/// Application name used for platform directories and the user agent.
pub const APP_NAME: &str = "tmplc";

/// Engine script used when no identifier is configured.
pub const DEFAULT_ENGINE: &str = "handlebars-1.0.12.min.js";

/// Metadata endpoint listing downloadable engine builds.
pub const DEFAULT_METADATA_URL: &str = "https://api.github.com/repos/wycats/handlebars.js/downloads";

/// File extensions treated as templates when none are configured.
pub const DEFAULT_TEMPLATE_EXTENSIONS: &[&str] = &["html", "hbs"];

/// Extension of the generated modules.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "js";

/// Encoding label for template input and module output.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Replaces path separators when the hierarchy is flattened.
pub const FLATTEN_SEPARATOR: &str = "-";

/// Output name for the source root itself in flatten mode.
pub const ROOT_BUNDLE_NAME: &str = "index";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "tmplc.lua";

/// Overrides the engine cache directory.
pub const CACHE_DIR_ENV: &str = "TMPLC_CACHE_DIR";

/// Network timeout for engine downloads.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
