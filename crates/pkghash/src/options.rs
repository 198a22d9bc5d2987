//! Options that control how package fingerprints are computed.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The default bound on a single version control query.
fn default_vcs_timeout_ms() -> u64 {
    30_000
}

fn default_ignore_file_name() -> String {
    String::from(".gitignore")
}

/// Files that are part of every input-pattern fingerprint: the package manifest and the task
/// runner configuration next to it.
fn default_manifest_files() -> Vec<String> {
    vec![String::from("package.json"), String::from("turbo.json")]
}

/// Errors that can occur when loading [`HashingOptions`].
#[derive(Debug, Error)]
pub enum OptionsError {
    /// IO error while reading the options file.
    #[error("IO error while reading options file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing the options file.
    #[error("Error parsing options file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid value for a field.
    #[error("Invalid value for field {0}: {1}")]
    InvalidValue(String, String),
}

/// Options that control how package fingerprints are computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HashingOptions {
    /// Path to the `git` executable. When absent `git` is looked up on the `PATH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_executable: Option<PathBuf>,

    /// The maximum time a single version control query may take before version control is
    /// considered unavailable.
    #[serde(default = "default_vcs_timeout_ms")]
    pub vcs_timeout_ms: u64,

    /// The name of the ignore files that are consulted when walking a package manually.
    #[serde(default = "default_ignore_file_name")]
    pub ignore_file_name: String,

    /// Files, relative to the package directory, that are always hashed when input patterns are
    /// given.
    #[serde(default = "default_manifest_files")]
    pub manifest_files: Vec<String>,

    /// The number of threads used to hash files. Uses the global thread pool when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashing_threads: Option<usize>,
}

impl Default for HashingOptions {
    fn default() -> Self {
        Self {
            git_executable: None,
            vcs_timeout_ms: default_vcs_timeout_ms(),
            ignore_file_name: default_ignore_file_name(),
            manifest_files: default_manifest_files(),
            hashing_threads: None,
        }
    }
}

impl HashingOptions {
    /// Parses options from a TOML document and validates them.
    pub fn from_toml_str(source: &str) -> Result<Self, OptionsError> {
        let options: Self = toml::from_str(source)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from a TOML file and validates them.
    pub fn from_path(path: &Path) -> Result<Self, OptionsError> {
        let source = fs_err::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Returns the bound on a single version control query.
    pub fn vcs_timeout(&self) -> Duration {
        Duration::from_millis(self.vcs_timeout_ms)
    }

    /// Checks that all values are in range.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.vcs_timeout_ms == 0 {
            return Err(OptionsError::InvalidValue(
                "vcs-timeout-ms".to_string(),
                "The version control timeout must be greater than 0".to_string(),
            ));
        }

        if self.hashing_threads == Some(0) {
            return Err(OptionsError::InvalidValue(
                "hashing-threads".to_string(),
                "The number of hashing threads must be greater than 0".to_string(),
            ));
        }

        let ignore_file_name = self.ignore_file_name.as_str();
        if ignore_file_name.is_empty()
            || ignore_file_name.contains(std::path::is_separator)
            || ignore_file_name == "."
            || ignore_file_name == ".."
        {
            return Err(OptionsError::InvalidValue(
                "ignore-file-name".to_string(),
                format!("'{ignore_file_name}' is not a plain file name"),
            ));
        }

        Ok(())
    }
}
