//! `info` command implementation.

use anyhow::Result;
use config_loader::{ConfigLoader, FanoutBlueprint};
use tracing::info;

use super::resolve_blueprint;
use crate::cli::InfoArgs;
use crate::error::CliError;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let blueprint = resolve_blueprint(args.config.as_deref())?;
    info!(strategy = %blueprint.dispatcher.strategy, "Resolved configuration");

    println!("{}", render(&blueprint, args.json)?);
    Ok(())
}

/// Resolved configuration, with every default filled in
fn render(blueprint: &FanoutBlueprint, json: bool) -> Result<String, CliError> {
    let rendered = if json {
        ConfigLoader::to_json(blueprint)?
    } else {
        ConfigLoader::to_toml(blueprint)?
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::ConfigFormat;

    #[test]
    fn test_render_round_trips_defaults() {
        let blueprint = FanoutBlueprint::default();

        let toml = render(&blueprint, false).unwrap();
        assert!(toml.contains("strategy = \"all\""));
        let back = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(back.workload, blueprint.workload);

        let json = render(&blueprint, true).unwrap();
        assert!(json.contains("\"consumer_capacity\": 256"));
    }

    #[test]
    fn test_info_without_file_uses_defaults() {
        let args = InfoArgs {
            config: None,
            json: true,
        };
        assert!(run_info(&args).is_ok());
    }
}
