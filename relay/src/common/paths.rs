//! Path Utilities

use std::path::PathBuf;

/// Get the blockrelay base directory (`~/.blockrelay/`)
pub fn blockrelay_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".blockrelay"))
}

/// Default config file location (`~/.blockrelay/config.json`)
pub fn default_config_path() -> Option<PathBuf> {
    blockrelay_dir().map(|dir| dir.join("config.json"))
}
