//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, FanoutBlueprint};
use contracts::FanoutStrategy;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    strategy: FanoutStrategy,
    input_capacity: usize,
    consumer_capacity: usize,
    producers: usize,
    consumers: usize,
    total_items: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    strategy: blueprint.dispatcher.strategy,
                    input_capacity: blueprint.dispatcher.input_capacity,
                    consumer_capacity: blueprint.dispatcher.consumer_capacity,
                    producers: blueprint.workload.producers,
                    consumers: blueprint.workload.consumers,
                    total_items: blueprint.workload.total_items(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &FanoutBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let dispatcher = &blueprint.dispatcher;
    let workload = &blueprint.workload;
    let total = workload.total_items();

    // Each consumer sees every item under broadcast
    let per_consumer = match dispatcher.strategy {
        FanoutStrategy::All => total,
        FanoutStrategy::Single | FanoutStrategy::Lru => {
            total.div_ceil(workload.consumers.max(1) as u64)
        }
    };
    if (dispatcher.consumer_capacity as u64) < per_consumer {
        warnings.push(format!(
            "consumer_capacity {} is below the ~{} items each consumer receives - slow readers will drop items",
            dispatcher.consumer_capacity, per_consumer
        ));
    }

    if dispatcher.input_capacity < workload.producers {
        warnings.push(format!(
            "input_capacity {} is smaller than the producer count {} - writes will often be rejected",
            dispatcher.input_capacity, workload.producers
        ));
    }

    if workload.items_per_producer == 0 {
        warnings.push("workload.items_per_producer is 0 - runs write nothing".to_string());
    }

    if workload.consumer_lifetime_ms > 0 && workload.consumer_lifetime_ms < workload.timeout_ms {
        warnings.push(
            "workload.consumer_lifetime_ms is shorter than the timeout - late items will be dropped"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Strategy: {}", summary.strategy);
            println!(
                "  Capacities: input {}, consumer {}",
                summary.input_capacity, summary.consumer_capacity
            );
            println!(
                "  Workload: {} producers, {} consumers, {} items",
                summary.producers, summary.consumers, summary.total_items
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
