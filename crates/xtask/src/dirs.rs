//! Platform-specific directory utilities
//!
//! Provides consistent directory paths across different operating systems,
//! following platform conventions for data directories.

use std::path::PathBuf;

const APPLICATION: &str = "tabletop";

/// Get the platform-specific data directory
///
/// Follows platform conventions:
/// - macOS: `~/Library/Application Support/tabletop`
/// - Linux: `~/.local/share/tabletop` (or `$XDG_DATA_HOME/tabletop`)
/// - Windows: `%APPDATA%\tabletop`
/// - Fallback: `./save_data`
///
/// `TABLETOP_DATA_DIR` overrides the platform location.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("TABLETOP_DATA_DIR") {
        return PathBuf::from(dir);
    }
    directories::ProjectDirs::from("", "", APPLICATION)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./save_data"))
}

/// Directory new goldens are recorded into.
pub fn goldens_dir() -> PathBuf {
    data_dir().join("goldens")
}
