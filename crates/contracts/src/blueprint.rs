//! FanoutBlueprint - Config Loader output
//!
//! Describes one dispatcher and, optionally, the synthetic workload the CLI
//! harness drives through it.

use serde::{Deserialize, Serialize};

use crate::FanoutStrategy;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanoutBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Dispatcher settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Harness workload
    #[serde(default)]
    pub workload: WorkloadConfig,
}

/// Dispatcher construction parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Name used in logs and metric labels (defaults to the item type name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Delivery strategy
    #[serde(default)]
    pub strategy: FanoutStrategy,

    /// Input queue capacity
    #[serde(default = "default_input_capacity")]
    pub input_capacity: usize,

    /// Output queue capacity of every consumer
    #[serde(default = "default_consumer_capacity")]
    pub consumer_capacity: usize,
}

fn default_input_capacity() -> usize {
    1024
}

fn default_consumer_capacity() -> usize {
    256
}

impl DispatcherConfig {
    /// Create an unnamed configuration
    pub fn new(strategy: FanoutStrategy, input_capacity: usize, consumer_capacity: usize) -> Self {
        Self {
            name: None,
            strategy,
            input_capacity,
            consumer_capacity,
        }
    }

    /// Set the dispatcher name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new(
            FanoutStrategy::default(),
            default_input_capacity(),
            default_consumer_capacity(),
        )
    }
}

/// Synthetic load driven by the CLI harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Number of concurrent writers
    pub producers: usize,

    /// Number of consumers registered before writing starts
    pub consumers: usize,

    /// Items written by each producer
    pub items_per_producer: u64,

    /// Consumer scope deadline in milliseconds (0 = lives until the run ends)
    pub consumer_lifetime_ms: u64,

    /// Upper bound on the whole run in milliseconds
    pub timeout_ms: u64,
}

impl WorkloadConfig {
    /// Total number of items the producers attempt to write
    pub fn total_items(&self) -> u64 {
        self.producers as u64 * self.items_per_producer
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            producers: 3,
            consumers: 5,
            items_per_producer: 10_000,
            consumer_lifetime_ms: 0,
            timeout_ms: 5_000,
        }
    }
}
