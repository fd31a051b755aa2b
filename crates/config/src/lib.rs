//! Configuration file helpers for the mailstep tools
//!
//! Resolves config files either from an explicit path or from the shared
//! config directory (~/.config/mailstep/), and reads environment overrides.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the application config directory
const APP_DIR: &str = "mailstep";

/// Get the mailstep config directory (~/.config/mailstep/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a config file within the mailstep config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Pick the config file to load: the explicit path if given, otherwise
/// `filename` inside the config directory.
pub fn resolve_path(explicit: Option<&Path>, filename: &str) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => config_path(filename).context("Could not determine config directory"),
    }
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Read an environment variable, treating unset and blank values alike
pub fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
