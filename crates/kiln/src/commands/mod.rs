//! CLI command handlers.

pub mod build;
pub mod plan;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use kiln_config::BuildConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Resolve and parse the build template.
///
/// Without an explicit path, `./kiln.toml` and then the config directory
/// are tried.
pub fn load_template(explicit: Option<&Path>) -> Result<(PathBuf, BuildConfig)> {
    let cwd = std::env::current_dir().context("failed to read the working directory")?;
    let path = kiln_config::find_template(explicit, &cwd).context(
        "no build template given and no kiln.toml found in the working or config directory",
    )?;
    let config = kiln_config::load_config_file(&path)
        .with_context(|| format!("failed to load template {}", path.display()))?;
    Ok((path, config))
}
