//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! for applications embedding shared memory record views.
//!
//! # Usage
//!
//! ```rust,no_run
//! use shm_records_common::config::{ConfigError, ConfigLoader, ShmConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct MyAppConfig {
//!     shm: ShmConfig,
//!     workers: usize,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = MyAppConfig::load(Path::new("config.toml"))?;
//!     config.shm.validate()?;
//!     println!("Segments live in {}", config.shm.shm_dir.display());
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_FILE_MODE, DEFAULT_NAME_PREFIX, GENERATED_NAME_LENGTH, SHM_DEFAULT_DIR, SHM_DIR_ENV,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Where and how named shared memory segments are created.
///
/// # TOML Example
///
/// ```toml
/// shm_dir = "/dev/shm"
/// name_prefix = "render_"
/// file_mode = 0o600
/// populate = true
/// log_level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShmConfig {
    /// Directory holding the named segments.
    #[serde(default = "default_shm_dir")]
    pub shm_dir: PathBuf,

    /// Prefix for generated segment names.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Permission bits for created segments.
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,

    /// Pre-fault pages when mapping (`MAP_POPULATE`).
    #[serde(default)]
    pub populate: bool,

    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_shm_dir() -> PathBuf {
    PathBuf::from(SHM_DEFAULT_DIR)
}

fn default_name_prefix() -> String {
    DEFAULT_NAME_PREFIX.to_string()
}

fn default_file_mode() -> u32 {
    DEFAULT_FILE_MODE
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            shm_dir: default_shm_dir(),
            name_prefix: default_name_prefix(),
            file_mode: default_file_mode(),
            populate: false,
            log_level: LogLevel::default(),
        }
    }
}

impl ShmConfig {
    /// Default configuration with `SHM_RECORDS_DIR` applied when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(SHM_DIR_ENV).filter(|dir| !dir.is_empty()) {
            config.shm_dir = PathBuf::from(dir);
        }
        config
    }

    /// Configuration rooted at `dir`, everything else default.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            shm_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Path of the backing object for segment `name`.
    pub fn segment_path(&self, name: &str) -> PathBuf {
        self.shm_dir.join(name)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `shm_dir` is empty
    /// - `name_prefix` contains `/` or leaves no room for the random part
    /// - `file_mode` has bits outside `0o777` or denies the owner read/write
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shm_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "shm_dir cannot be empty".to_string(),
            ));
        }
        if self.name_prefix.contains('/') || self.name_prefix.contains('\0') {
            return Err(ConfigError::ValidationError(format!(
                "name_prefix '{}' contains a path separator",
                self.name_prefix
            )));
        }
        if self.name_prefix.len() >= GENERATED_NAME_LENGTH {
            return Err(ConfigError::ValidationError(format!(
                "name_prefix must be shorter than {GENERATED_NAME_LENGTH} bytes"
            )));
        }
        if self.file_mode & !0o777 != 0 || self.file_mode & 0o600 != 0o600 {
            return Err(ConfigError::ValidationError(format!(
                "file_mode {:#o} must grant owner read/write and stay within 0o777",
                self.file_mode
            )));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Blanket-implemented for every `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        let parsed: TestWrapper = toml::from_str("level = \"warn\"").unwrap();
        assert_eq!(parsed.level, LogLevel::Warn);
        assert_eq!(tracing::Level::from(parsed.level), tracing::Level::WARN);
    }

    #[test]
    fn test_shm_config_defaults() {
        let config = ShmConfig::default();
        assert_eq!(config.shm_dir, PathBuf::from(SHM_DEFAULT_DIR));
        assert_eq!(config.name_prefix, DEFAULT_NAME_PREFIX);
        assert_eq!(config.file_mode, DEFAULT_FILE_MODE);
        assert!(!config.populate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_segment_path_joins_dir() {
        let config = ShmConfig::with_dir("/tmp/segments");
        assert_eq!(
            config.segment_path("frame"),
            PathBuf::from("/tmp/segments/frame")
        );
    }

    #[test]
    fn test_validation_rejects_bad_prefix() {
        let config = ShmConfig {
            name_prefix: "a/b".to_string(),
            ..ShmConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let config = ShmConfig {
            name_prefix: "x".repeat(GENERATED_NAME_LENGTH),
            ..ShmConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_mode() {
        let config = ShmConfig {
            file_mode: 0o400,
            ..ShmConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ShmConfig {
            file_mode: 0o4600,
            ..ShmConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = ShmConfig::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = ShmConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_loader_success() {
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            shm: ShmConfig,
            workers: usize,
        }

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"workers = 4

[shm]
shm_dir = "/run/records"
name_prefix = "frame_"
file_mode = 0o640
populate = true
log_level = "debug"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.shm.shm_dir, PathBuf::from("/run/records"));
        assert_eq!(config.shm.name_prefix, "frame_");
        assert_eq!(config.shm.file_mode, 0o640);
        assert!(config.shm.populate);
        assert_eq!(config.shm.log_level, LogLevel::Debug);
        assert!(config.shm.validate().is_ok());
    }

    #[test]
    fn test_config_loader_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "populate = true").unwrap();
        file.flush().unwrap();

        let config = ShmConfig::load(file.path()).unwrap();
        assert!(config.populate);
        assert_eq!(config.shm_dir, PathBuf::from(SHM_DEFAULT_DIR));
        assert_eq!(config.log_level, LogLevel::Info);
    }
}
