//! Configuration loading and discovery for `sitepipe.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::ProjectConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILENAME: &str = "sitepipe.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse sitepipe.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the production output directory (bundle and clean target)
    pub dist: Option<PathBuf>,
    /// Override the dev server host
    pub host: Option<String>,
    /// Override the dev server port
    pub port: Option<u16>,
}

/// Find sitepipe.toml by walking up from the current working directory.
///
/// # Returns
/// - `Some(path)` if a sitepipe.toml file is found
/// - `None` if no config file is found
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find sitepipe.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a sitepipe.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the default
/// configuration.
pub fn load_config(path: Option<&Path>) -> Result<ProjectConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: ProjectConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Default configuration used when no sitepipe.toml is found.
pub fn default_config() -> ProjectConfig {
    ProjectConfig::default()
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values. Overriding the
/// production directory moves everything that lives under it.
pub fn merge_cli_overrides(config: &mut ProjectConfig, overrides: &CliOverrides) {
    if let Some(ref dist) = overrides.dist {
        let old = config.bundle.out.clone();
        config.images.out = rebase(&config.images.out, &old, dist);
        config.fonts.out = rebase(&config.fonts.out, &old, dist);
        config.clean.target = rebase(&config.clean.target, &old, dist);
        config.bundle.out = dist.clone();
    }

    if let Some(ref host) = overrides.host {
        config.server.host = host.clone();
    }

    if let Some(port) = overrides.port {
        config.server.port = port;
    }
}

/// Move `path` from under `old` to under `new`, leaving unrelated paths alone.
fn rebase(path: &Path, old: &Path, new: &Path) -> PathBuf {
    match path.strip_prefix(old) {
        Ok(rest) if rest.as_os_str().is_empty() => new.to_path_buf(),
        Ok(rest) => new.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
