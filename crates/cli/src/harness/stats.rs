//! Run statistics and delivery checks.

use std::collections::HashSet;
use std::time::Duration;

use contracts::FanoutStrategy;
use dispatcher::MetricsSnapshot;
use observability::{RunningStats, StatsSummary};

/// Statistics from a harness run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub dispatcher_name: String,
    pub strategy: FanoutStrategy,

    /// Items producers tried to write
    pub items_attempted: u64,

    /// Items the dispatcher accepted
    pub items_written: u64,

    /// Writes retried after a full input queue
    pub write_retries: u64,

    /// Items each consumer read, in arrival order
    pub received: Vec<Vec<u64>>,

    /// Consumers were given a deadline shorter than the run
    pub lifetime_limited: bool,

    /// Dispatcher counters at the end of the run
    pub metrics: MetricsSnapshot,

    /// Total duration of the run
    pub duration: Duration,

    /// The run hit its timeout before settling
    pub timed_out: bool,
}

impl RunStats {
    pub fn total_received(&self) -> u64 {
        self.received.iter().map(|items| items.len() as u64).sum()
    }

    pub fn per_consumer_counts(&self) -> Vec<u64> {
        self.received.iter().map(|items| items.len() as u64).collect()
    }

    /// Spread of per-consumer counts
    pub fn distribution(&self) -> StatsSummary {
        self.received
            .iter()
            .map(|items| items.len() as f64)
            .collect::<RunningStats>()
            .summary()
    }

    /// Accepted items per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.items_written as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Items read by more than one consumer
    pub fn duplicates(&self) -> u64 {
        let mut seen = HashSet::with_capacity(self.total_received() as usize);
        self.received
            .iter()
            .flatten()
            .filter(|item| !seen.insert(**item))
            .count() as u64
    }

    /// Every consumer read the same items in the same order
    pub fn identical_sequences(&self) -> bool {
        match self.received.split_first() {
            Some((first, rest)) => rest.iter().all(|items| items == first),
            None => true,
        }
    }

    /// Delivery checks that must hold for a lossless run.
    ///
    /// Returns one message per failed check. Runs that dropped items or
    /// limited consumer lifetimes only get the checks that still apply.
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();

        if self.timed_out {
            failures.push("run timed out before all items were delivered".to_string());
            return failures;
        }

        if self.metrics.accepted != self.items_written {
            failures.push(format!(
                "dispatcher accepted {} items, producers wrote {}",
                self.metrics.accepted, self.items_written
            ));
        }

        if !self.strategy.is_broadcast() && self.duplicates() > 0 {
            failures.push(format!(
                "{} items were delivered more than once",
                self.duplicates()
            ));
        }

        let lossless = self.metrics.dropped() == 0 && !self.lifetime_limited;
        if !lossless {
            return failures;
        }

        if self.strategy.is_broadcast() {
            for (idx, count) in self.per_consumer_counts().into_iter().enumerate() {
                if count != self.items_written {
                    failures.push(format!(
                        "consumer {idx} read {count} of {} items",
                        self.items_written
                    ));
                }
            }
            if !self.identical_sequences() {
                failures.push("consumers saw items in different orders".to_string());
            }
        } else if self.total_received() != self.items_written {
            failures.push(format!(
                "consumers read {} of {} items",
                self.total_received(),
                self.items_written
            ));
        }

        failures
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Run Statistics                          ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Dispatcher: {} ({})", self.dispatcher_name, self.strategy);
        println!("   ├─ Duration: {:.3}s", self.duration.as_secs_f64());
        println!("   ├─ Items attempted: {}", self.items_attempted);
        println!("   ├─ Items written: {}", self.items_written);
        println!("   ├─ Write retries: {}", self.write_retries);
        println!("   ├─ Throughput: {:.0} items/s", self.throughput());
        println!("   └─ Timed out: {}", self.timed_out);

        let m = &self.metrics;
        println!("\n📈 Dispatcher Metrics");
        println!("   ├─ Accepted: {}", m.accepted);
        println!(
            "   ├─ Rejected: {} (full: {}, closed: {})",
            m.rejected(),
            m.rejected_full,
            m.rejected_closed
        );
        println!("   ├─ Dispatched: {}", m.dispatched);
        println!("   ├─ Delivered: {}", m.delivered);
        println!(
            "   ├─ Dropped: {} (consumer: {}, no consumers: {})",
            m.dropped(),
            m.dropped_full,
            m.dropped_no_consumer
        );
        println!(
            "   └─ Consumers: {} created, {} removed",
            m.consumers_created, m.consumers_removed
        );

        println!("\n📥 Consumers ({})", self.received.len());
        let counts = self.per_consumer_counts();
        for (idx, count) in counts.iter().enumerate() {
            let prefix = if idx == counts.len() - 1 { "└─" } else { "├─" };
            println!("   {prefix} #{idx}: {count} items");
        }
        println!("   Distribution: {}", self.distribution());

        if self.strategy.is_broadcast() {
            println!("   Identical sequences: {}", self.identical_sequences());
        } else {
            println!("   Duplicates: {}", self.duplicates());
        }

        let failures = self.failures();
        if !failures.is_empty() {
            println!("\n⚠️  Failed Checks");
            for failure in &failures {
                println!("   ├─ {failure}");
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(strategy: FanoutStrategy, received: Vec<Vec<u64>>, written: u64) -> RunStats {
        let delivered = received.iter().map(|items| items.len() as u64).sum();
        RunStats {
            dispatcher_name: "u64".to_string(),
            strategy,
            items_attempted: written,
            items_written: written,
            write_retries: 0,
            received,
            lifetime_limited: false,
            metrics: MetricsSnapshot {
                accepted: written,
                dispatched: written,
                delivered,
                ..Default::default()
            },
            duration: Duration::from_millis(500),
            timed_out: false,
        }
    }

    #[test]
    fn test_broadcast_run_passes() {
        let run = stats(
            FanoutStrategy::All,
            vec![vec![1, 2, 3], vec![1, 2, 3]],
            3,
        );
        assert!(run.identical_sequences());
        assert!(run.failures().is_empty());
        assert_eq!(run.throughput(), 6.0);
    }

    #[test]
    fn test_broadcast_detects_reordering() {
        let run = stats(
            FanoutStrategy::All,
            vec![vec![1, 2, 3], vec![1, 3, 2]],
            3,
        );
        assert_eq!(run.failures(), vec!["consumers saw items in different orders"]);
    }

    #[test]
    fn test_single_detects_duplicates_and_loss() {
        let run = stats(FanoutStrategy::Single, vec![vec![1, 2], vec![2]], 4);
        assert_eq!(run.duplicates(), 1);

        let failures = run.failures();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].contains("more than once"));
        assert!(failures[1].contains("read 3 of 4"));
    }

    #[test]
    fn test_drops_relax_totals() {
        let mut run = stats(FanoutStrategy::Lru, vec![vec![1], vec![2]], 3);
        run.metrics.dropped_full = 1;
        assert!(run.failures().is_empty());
    }

    #[test]
    fn test_timeout_is_reported_alone() {
        let mut run = stats(FanoutStrategy::All, vec![vec![1], vec![]], 1);
        run.timed_out = true;
        assert_eq!(run.failures().len(), 1);
    }

    #[test]
    fn test_distribution() {
        let run = stats(
            FanoutStrategy::Lru,
            vec![vec![1, 2], vec![3, 4], vec![5, 6]],
            6,
        );
        let summary = run.distribution();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean, 2.0);
        assert_eq!(summary.max_relative_deviation(), 0.0);
        assert_eq!(run.per_consumer_counts(), vec![2, 2, 2]);
    }
}
