//! YAML configuration for the command-line runner.
//!
//! The config file is found through `MELODEX_CONFIG`, the first
//! command-line argument, or `melodex.yaml` in the working directory,
//! in that order. A missing file is created with defaults so the user
//! has something to edit.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// SQLite database file, relative paths are resolved against the
    /// config file's directory.
    pub database_path: String,
    /// Directory for extracted cover art files.
    pub media_art_directory: String,
    pub library_directories: Vec<String>,
    pub blacklisted_directories: Vec<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database_path: "melodex.db".to_string(),
            media_art_directory: "media-art".to_string(),
            library_directories: Vec::new(),
            blacklisted_directories: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("MELODEX_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => match env::args().nth(1) {
            Some(arg) if !arg.trim().is_empty() => PathBuf::from(arg),
            _ => PathBuf::from("melodex.yaml"),
        },
    }
}

/// Loads the config, writing a default file first if none exists. The
/// boolean reports whether the file was just created.
pub fn load_or_create_config(path: &Path) -> Result<(CliConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let config: CliConfig = serde_yaml::from_str(&contents)?;
        return Ok((config, false));
    }

    let config = CliConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &CliConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Resolves `value` against the config file's directory unless it is
/// already absolute.
pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

pub fn resolve_directories(config_path: &Path, directories: &[String]) -> Vec<String> {
    directories
        .iter()
        .filter(|dir| !dir.trim().is_empty())
        .map(|dir| {
            resolve_path(config_path, dir.trim())
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}
