//! Configuration module.
//!
//! Handles loading, validating, and merging `htmlimg.toml`. Stock defaults are
//! the base layer; a user file at the source root (or passed with `--config`)
//! is merged on top of them, and CLI flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! temp_dir = ".img"          # Artifact directory, relative to the source root
//! pattern = '''img/…'''      # Regex; the whole match is one image reference
//! mode = "transform"         # transform | skip | format-only (dev runs only)
//!
//! [formats.jpeg]
//! quality = 81
//! # background = "#ffffff"   # Flatten transparency when converting to JPEG
//!
//! [formats.png]
//! compression_level = 9      # 0 (fastest) to 9 (smallest)
//!
//! [formats.avif]
//! quality = 80
//! speed = 6                  # 1 (slowest) to 10 (fastest)
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! `[formats.webp]`, `[formats.gif]` and `[formats.tiff]` accept only a
//! `background`.
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [formats.jpeg]
//! quality = 70
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::FormatDefaults;
use crate::plan::OperatingMode;
use crate::scan::DEFAULT_PATTERN;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

/// Config file looked up in the source root.
pub const CONFIG_FILENAME: &str = "htmlimg.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `htmlimg.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory artifacts are written to, relative to the source root. Also
    /// the prefix of every rewritten reference.
    pub temp_dir: String,
    /// Regular expression that finds image references. The whole match is
    /// the reference.
    pub pattern: String,
    /// Operating mode for interactive runs.
    pub mode: OperatingMode,
    /// Per-format encoder defaults.
    pub formats: FormatDefaults,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

fn default_temp_dir() -> String {
    ".img".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            pattern: DEFAULT_PATTERN.to_string(),
            mode: OperatingMode::default(),
            formats: FormatDefaults::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let temp_dir = Path::new(&self.temp_dir);
        if self.temp_dir.trim().is_empty() {
            return Err(ConfigError::Validation("temp_dir must not be empty".into()));
        }
        if temp_dir.has_root()
            || temp_dir
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ConfigError::Validation(format!(
                "temp_dir must be a relative path inside the source root, got `{}`",
                self.temp_dir
            )));
        }
        if let Err(e) = regex::Regex::new(&self.pattern) {
            return Err(ConfigError::Validation(format!("pattern is invalid: {e}")));
        }
        let formats = &self.formats;
        if !(1..=100).contains(&formats.jpeg.quality) {
            return Err(ConfigError::Validation(
                "formats.jpeg.quality must be 1-100".into(),
            ));
        }
        if formats.png.compression_level > 9 {
            return Err(ConfigError::Validation(
                "formats.png.compression_level must be 0-9".into(),
            ));
        }
        if !(1..=100).contains(&formats.avif.quality) {
            return Err(ConfigError::Validation(
                "formats.avif.quality must be 1-100".into(),
            ));
        }
        if !(1..=10).contains(&formats.avif.speed) {
            return Err(ConfigError::Validation(
                "formats.avif.speed must be 1-10".into(),
            ));
        }
        Ok(())
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `htmlimg.toml` from the source root, falling back to stock defaults.
pub fn load_config(root: &Path) -> Result<Config, ConfigError> {
    let overlay = load_raw_config(&root.join(CONFIG_FILENAME))?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Load an explicitly named config file. Unlike [`load_config`], a missing
/// file is an error.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(stock_defaults_value(), Some(overlay))
}

/// Returns a fully-commented stock `htmlimg.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# htmlimg configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at the source root as htmlimg.toml, or pass --config.
# Unknown keys will cause an error.

# Directory generated images are written to, relative to the source root.
# Rewritten references point at <temp_dir>/<output name>.
temp_dir = ".img"

# Regular expression that finds image references in HTML. The whole match is
# treated as one reference; capture groups are ignored.
pattern = '''img/[^\s"'()?]+\.(?i:jpe?g|png|gif|webp)(?:\?[^\s"'()]*)?'''

# What dev runs (--dev) do with references:
#   transform   - resize, convert and encode
#   skip        - point references at the original files
#   format-only - rename extensions only, no pixel work
# One-shot builds always transform.
mode = "transform"

# ---------------------------------------------------------------------------
# Per-format encoder defaults
# ---------------------------------------------------------------------------
# Every format accepts an optional background color (#rgb or #rrggbb) used to
# flatten transparency. A ?background= parameter overrides it.

[formats.jpeg]
# JPEG quality (1 = worst, 100 = best). Overridden by ?quality=.
quality = 81
# background = "#ffffff"

[formats.png]
# zlib compression effort (0 = fastest, 9 = smallest).
compression_level = 9

# WebP is written lossless.
[formats.webp]

[formats.avif]
# AVIF quality (1 = worst, 100 = best). Overridden by ?quality=.
quality = 80
# Encoder speed (1 = slowest/smallest, 10 = fastest).
speed = 6

[formats.gif]

[formats.tiff]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit for auto (= number of CPU cores).
# Values above the core count are clamped down.
# max_processes = 4
"##
}
