//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, FanoutBlueprint};
use tracing::{info, warn};

use super::resolve_blueprint;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::harness::Harness;

/// Execute the `run` command
pub async fn run_harness(args: &RunArgs) -> Result<()> {
    let mut blueprint = resolve_blueprint(args.config.as_deref())?;

    // CLI values win over the file
    args.apply_overrides(&mut blueprint);
    ConfigLoader::validate(&blueprint).map_err(CliError::from)?;

    info!(
        strategy = %blueprint.dispatcher.strategy,
        input_capacity = blueprint.dispatcher.input_capacity,
        consumer_capacity = blueprint.dispatcher.consumer_capacity,
        producers = blueprint.workload.producers,
        consumers = blueprint.workload.consumers,
        items = blueprint.workload.total_items(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)
            .context("Failed to start metrics exporter")?;
        info!(port = args.metrics_port, "Prometheus exporter listening");
    }

    let harness = Harness::new(blueprint);
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting run...");

    tokio::select! {
        result = harness.run() => {
            let stats = result.context("Run failed")?;
            info!(
                written = stats.items_written,
                received = stats.total_received(),
                dropped = stats.metrics.dropped(),
                duration_secs = stats.duration.as_secs_f64(),
                throughput = format!("{:.0}", stats.throughput()),
                "Run completed"
            );

            stats.print_summary();

            let failures = stats.failures();
            if !failures.is_empty() {
                return Err(CliError::verification(failures.join("; ")).into());
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping run...");
        }
    }

    info!("Fanout finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &FanoutBlueprint) {
    let dispatcher = &blueprint.dispatcher;
    let workload = &blueprint.workload;

    println!("\n=== Configuration Summary ===\n");
    println!("Dispatcher:");
    println!(
        "  Name: {}",
        dispatcher.name.as_deref().unwrap_or("(item type)")
    );
    println!("  Strategy: {}", dispatcher.strategy);
    println!("  Input capacity: {}", dispatcher.input_capacity);
    println!("  Consumer capacity: {}", dispatcher.consumer_capacity);

    println!("\nWorkload:");
    println!("  Producers: {}", workload.producers);
    println!("  Consumers: {}", workload.consumers);
    println!(
        "  Items: {} x {} = {}",
        workload.producers,
        workload.items_per_producer,
        workload.total_items()
    );
    match workload.consumer_lifetime_ms {
        0 => println!("  Consumer lifetime: whole run"),
        ms => println!("  Consumer lifetime: {ms} ms"),
    }
    println!("  Timeout: {} ms", workload.timeout_ms);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_dry_run_accepts_defaults() {
        let args = RunArgs {
            dry_run: true,
            ..Default::default()
        };
        assert!(run_harness(&args).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_config_is_reported() {
        let args = RunArgs {
            config: Some("does/not/exist.toml".into()),
            dry_run: true,
            ..Default::default()
        };

        let err = run_harness(&args).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::ConfigNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_overrides_are_validated() {
        let args = RunArgs {
            consumers: Some(0),
            dry_run: true,
            ..Default::default()
        };

        let err = run_harness(&args).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Config(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_small_run_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[dispatcher]
name = "small"
strategy = "lru"
consumer_capacity = 1024

[workload]
producers = 2
consumers = 2
items_per_producer = 100
"#
        )
        .unwrap();

        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        run_harness(&args).await.unwrap();
    }
}
