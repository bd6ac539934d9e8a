//! Locating and loading build templates.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::types::BuildConfig;

const APP_NAME: &str = "kiln";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "KILN_CONFIG_DIR";

/// Template file name looked up when no path is given.
pub const DEFAULT_TEMPLATE: &str = "kiln.toml";

/// Load a build template from a file.
pub fn load_config_file(path: &Path) -> Result<BuildConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let config = BuildConfig::from_toml(&contents)?;
    tracing::debug!(path = %path.display(), "Loaded build template");
    Ok(config)
}

/// Kiln's config directory.
///
/// `$KILN_CONFIG_DIR` when set and non-empty, otherwise `<config_dir>/kiln`.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Resolve the template to use: the explicit path if given, else
/// `./kiln.toml`, else `<config dir>/kiln.toml`.
pub fn find_template(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = cwd.join(DEFAULT_TEMPLATE);
    if local.is_file() {
        return Some(local);
    }
    xdg_config_dir()
        .map(|d| d.join(DEFAULT_TEMPLATE))
        .filter(|p| p.is_file())
}
