//! Load harness: producers, one dispatcher and consumers for a single run.

mod orchestrator;
mod stats;

pub use orchestrator::Harness;
pub use stats::RunStats;
