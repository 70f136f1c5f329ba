//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_harness;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, FanoutBlueprint};
use tracing::info;

use crate::error::CliError;

/// Load a blueprint from `path`, or fall back to built-in defaults
fn resolve_blueprint(path: Option<&Path>) -> Result<FanoutBlueprint> {
    let Some(path) = path else {
        info!("No configuration file given, using defaults");
        return Ok(FanoutBlueprint::default());
    };

    info!(config = %path.display(), "Loading configuration");
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    ConfigLoader::load_from_path(path)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
