//! Strategies Demo
//!
//! Pushes the same small batch through one dispatcher per strategy and shows
//! what each consumer received.
//!
//! Run with: cargo run -p fanout_demos --bin strategies [config.toml]

use std::time::Duration;

use config_loader::ConfigLoader;
use contracts::{DispatcherConfig, FanoutStrategy};
use dispatcher::{CancellationToken, Dispatcher};

const CONSUMERS: usize = 3;
const ITEMS: u32 = 9;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Capacities come from a config file when one is given
    let base = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(path = %path, "Loading dispatcher config");
            ConfigLoader::load_from_path(std::path::Path::new(&path))?.dispatcher
        }
        None => DispatcherConfig::new(FanoutStrategy::All, 64, 64),
    };

    for strategy in FanoutStrategy::ALL {
        let config = DispatcherConfig {
            strategy,
            ..base.clone()
        }
        .with_name(strategy.as_str());

        let dispatcher = Dispatcher::<u32>::from_config(&config);
        let scope = CancellationToken::new();
        let mut consumers = (0..CONSUMERS)
            .map(|_| dispatcher.create_consumer(&scope))
            .collect::<Result<Vec<_>, _>>()?;

        for item in 0..ITEMS {
            dispatcher.write(item)?;
        }

        // Let the loop drain the input queue
        while dispatcher.metrics().dispatched < u64::from(ITEMS) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        println!("\n== {strategy} ==");
        for (idx, consumer) in consumers.iter_mut().enumerate() {
            let mut got = Vec::new();
            while let Some(item) = consumer.try_recv() {
                got.push(item);
            }
            println!("  consumer {idx}: {got:?}");
        }

        scope.cancel();
        dispatcher.shutdown().await;
    }

    Ok(())
}
