use crate::utils::hash64;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "sidx";

/// Application data directory where index files live.
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);
    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Path of the config file in the app data directory.
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_app_data_dir()?.join("config.json"))
}

/// Index file for a specific document root, named after the root for
/// readability plus a hash of the full path for uniqueness.
pub fn get_index_path(root: &Path) -> Result<PathBuf> {
    let indexes_dir = get_app_data_dir()?.join("indexes");
    fs::create_dir_all(&indexes_dir)?;
    Ok(indexes_dir.join(format!("{}.sidx", hash_path(root))))
}

/// Delete the stored index for a root, if any.
pub fn remove_index(root: &Path) -> Result<bool> {
    let path = get_index_path(root)?;
    if path.exists() {
        fs::remove_file(&path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn hash_path(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = canonical.to_string_lossy();

    let dir_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    let sanitized: String = dir_name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(16)
        .collect();

    format!("{}-{:016x}", sanitized, hash64(path_str.as_ref()) as u64)
}
