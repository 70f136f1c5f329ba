//! Dispatcher metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Writes accepted into the input queue
    accepted: AtomicU64,
    /// Writes refused because the input queue was full
    rejected_full: AtomicU64,
    /// Writes refused after shutdown began
    rejected_closed: AtomicU64,
    /// Items taken off the input queue by the dispatch loop
    dispatched: AtomicU64,
    /// Successful pushes into consumer queues
    delivered: AtomicU64,
    /// Per-consumer drops (queue full or reader gone)
    dropped_full: AtomicU64,
    /// Items dropped because nothing was registered
    dropped_no_consumer: AtomicU64,
    consumers_created: AtomicU64,
    consumers_removed: AtomicU64,
}

macro_rules! counter_accessors {
    ($($field:ident => $inc:ident),* $(,)?) => {
        $(
            pub fn $field(&self) -> u64 {
                self.$field.load(Ordering::Relaxed)
            }

            pub(crate) fn $inc(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    counter_accessors! {
        accepted => inc_accepted,
        rejected_full => inc_rejected_full,
        rejected_closed => inc_rejected_closed,
        dispatched => inc_dispatched,
        delivered => inc_delivered,
        dropped_full => inc_dropped_full,
        dropped_no_consumer => inc_dropped_no_consumer,
        consumers_created => inc_consumers_created,
        consumers_removed => inc_consumers_removed,
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: self.accepted(),
            rejected_full: self.rejected_full(),
            rejected_closed: self.rejected_closed(),
            dispatched: self.dispatched(),
            delivered: self.delivered(),
            dropped_full: self.dropped_full(),
            dropped_no_consumer: self.dropped_no_consumer(),
            consumers_created: self.consumers_created(),
            consumers_removed: self.consumers_removed(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub accepted: u64,
    pub rejected_full: u64,
    pub rejected_closed: u64,
    pub dispatched: u64,
    pub delivered: u64,
    pub dropped_full: u64,
    pub dropped_no_consumer: u64,
    pub consumers_created: u64,
    pub consumers_removed: u64,
}

impl MetricsSnapshot {
    /// Total writes refused at the input queue
    pub fn rejected(&self) -> u64 {
        self.rejected_full + self.rejected_closed
    }

    /// Total silent drops after acceptance
    pub fn dropped(&self) -> u64 {
        self.dropped_full + self.dropped_no_consumer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_increments() {
        let metrics = DispatchMetrics::new();
        metrics.inc_accepted();
        metrics.inc_accepted();
        metrics.inc_rejected_full();
        metrics.inc_rejected_closed();
        metrics.inc_dropped_full();
        metrics.inc_dropped_no_consumer();
        metrics.inc_dropped_no_consumer();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.accepted, 2);
        assert_eq!(snapshot.rejected(), 2);
        assert_eq!(snapshot.dropped(), 3);
        assert_eq!(snapshot.delivered, 0);
    }
}
