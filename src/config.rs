//! Process configuration for the copier.
//!
//! Configuration is read from a small `key = value` file (a TOML subset:
//! `#` comments, double-quoted strings, bare integers and booleans). The same
//! line parser is reused by the directory-backed provider for per-namespace
//! configuration files.
//!
//! Resolution order used by the binary: CLI flag > config file > default.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Default number of items copied in parallel.
pub const DEFAULT_THREAD_POOL_SIZE: usize = 10;

/// Minimum allowed worker pool size.
pub const MIN_THREAD_POOL_SIZE: usize = 1;

/// Maximum allowed worker pool size.
pub const MAX_THREAD_POOL_SIZE: usize = 100;

/// Default directory holding per-namespace configuration files.
pub const DEFAULT_CONF_BASEDIR: &str = "/etc/copier/conf";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the file that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A line is not of the form `key = value`.
    #[error("invalid config syntax on line {line}: expected key = value")]
    Syntax {
        /// 1-based line number.
        line: usize,
    },

    /// A value could not be parsed for its key.
    #[error("invalid `{key}` value on line {line}: {reason}")]
    InvalidValue {
        /// The configuration key.
        key: String,
        /// 1-based line number.
        line: usize,
        /// What was expected.
        reason: &'static str,
    },

    /// The key is not recognized.
    #[error("unknown configuration key '{key}' on line {line}")]
    UnknownKey {
        /// The unrecognized key.
        key: String,
        /// 1-based line number.
        line: usize,
    },

    /// A required key is absent.
    #[error("missing required configuration key `{key}`")]
    MissingKey {
        /// The missing key.
        key: &'static str,
    },

    /// A value parsed but lies outside its accepted range.
    #[error("invalid config value for `{key}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// The configuration key.
        key: &'static str,
        /// The rejected value.
        value: String,
        /// Human-readable accepted range.
        expected: &'static str,
    },
}

/// Resolved process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopierConfig {
    /// Number of items copied in parallel (worker pool capacity).
    pub thread_pool_size: usize,
    /// Whether copied files are re-read and verified against the source digest.
    pub checksum_enabled: bool,
    /// Directory holding `<namespace>.conf` files for the local provider.
    pub conf_basedir: PathBuf,
}

impl Default for CopierConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: DEFAULT_THREAD_POOL_SIZE,
            checksum_enabled: true,
            conf_basedir: PathBuf::from(DEFAULT_CONF_BASEDIR),
        }
    }
}

impl CopierConfig {
    /// Validates config values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] when the pool size is outside
    /// `1..=100`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_THREAD_POOL_SIZE..=MAX_THREAD_POOL_SIZE).contains(&self.thread_pool_size) {
            return Err(ConfigError::OutOfRange {
                key: "thread_pool_size",
                value: self.thread_pool_size.to_string(),
                expected: "1..=100",
            });
        }
        Ok(())
    }

    /// Loads configuration from `path`, starting from defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, contains unknown
    /// keys or malformed values, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&raw)?;
        debug!(path = %path.display(), ?config, "loaded config file");
        Ok(config)
    }

    /// Loads the config file at the default location, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an existing file is invalid.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        let Some(path) = resolve_default_config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Parses configuration text, starting from defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for syntax errors, unknown keys, malformed
    /// values, or values that fail validation.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        for entry in parse_lines(raw)? {
            match entry.key {
                "thread_pool_size" => {
                    cfg.thread_pool_size = parse_integer(&entry)?;
                }
                "checksum_enabled" => {
                    cfg.checksum_enabled = parse_boolean(&entry)?;
                }
                "conf_basedir" => {
                    cfg.conf_basedir = PathBuf::from(parse_string_literal(&entry)?);
                }
                unknown => {
                    return Err(ConfigError::UnknownKey {
                        key: unknown.to_string(),
                        line: entry.line,
                    });
                }
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/copier/config.toml`
/// 2. `$HOME/.config/copier/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("copier").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("copier")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// One `key = value` line of a configuration file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConfigLine<'a> {
    pub(crate) line: usize,
    pub(crate) key: &'a str,
    pub(crate) value: &'a str,
}

/// Splits configuration text into non-empty `key = value` entries.
pub(crate) fn parse_lines(raw: &str) -> Result<Vec<ConfigLine<'_>>, ConfigError> {
    let mut entries = Vec::new();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            return Err(ConfigError::Syntax {
                line: line_index + 1,
            });
        };

        entries.push(ConfigLine {
            line: line_index + 1,
            key: raw_key.trim(),
            value: raw_value.trim(),
        });
    }
    Ok(entries)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn invalid(entry: &ConfigLine<'_>, reason: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: entry.key.to_string(),
        line: entry.line,
        reason,
    }
}

pub(crate) fn parse_string_literal(entry: &ConfigLine<'_>) -> Result<String, ConfigError> {
    let value = entry.value;
    if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
        return Err(invalid(entry, "expected double-quoted string"));
    }
    Ok(value[1..value.len() - 1].to_string())
}

pub(crate) fn parse_boolean(entry: &ConfigLine<'_>) -> Result<bool, ConfigError> {
    match entry.value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(entry, "expected 'true' or 'false'")),
    }
}

pub(crate) fn parse_integer(entry: &ConfigLine<'_>) -> Result<usize, ConfigError> {
    if entry.value.is_empty() {
        return Err(invalid(entry, "expected integer value"));
    }
    entry
        .value
        .parse::<usize>()
        .map_err(|_| invalid(entry, "expected non-negative integer"))
}
