//! Platform path resolution for SLOP's on-disk state.

use slop_core::error::{Result, SlopError};
use std::path::PathBuf;

/// Unified path management for slop.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/slop/          # Config directory (platform default)
/// └── store.toml           # Key-value store: settings, templates, sessions
/// ```
pub struct SlopPaths;

impl SlopPaths {
    /// Returns the slop configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/slop/`)
    /// - `Err(SlopError::Config)`: The platform config directory is unknown
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("slop"))
            .ok_or_else(|| SlopError::config("Cannot determine the user config directory"))
    }

    /// Returns the path to the key-value store file.
    pub fn store_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("store.toml"))
    }
}
