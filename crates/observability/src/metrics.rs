//! Fan-out metrics
//!
//! Global `metrics` recorders for dispatcher events, plus in-memory
//! statistics used to summarize how evenly items were spread.

use metrics::{counter, gauge};

/// Why an item accepted by the dispatcher never reached a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Target consumer queue had no free slot
    ConsumerFull,
    /// Target consumer's reader is gone
    ConsumerGone,
    /// Nothing registered at dispatch time
    NoConsumers,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsumerFull => "consumer_full",
            Self::ConsumerGone => "consumer_gone",
            Self::NoConsumers => "no_consumers",
        }
    }
}

/// Why a write was refused at the input queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BufferFull,
    Closed,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BufferFull => "buffer_full",
            Self::Closed => "closed",
        }
    }
}

/// Record an item accepted into a dispatcher's input queue
pub fn record_item_accepted(dispatcher: &str) {
    counter!(
        "fanout_items_accepted_total",
        "dispatcher" => dispatcher.to_string()
    )
    .increment(1);
}

/// Record a write refused by the dispatcher
pub fn record_item_rejected(dispatcher: &str, reason: RejectReason) {
    counter!(
        "fanout_items_rejected_total",
        "dispatcher" => dispatcher.to_string(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record one successful push into a consumer queue
pub fn record_item_delivered(dispatcher: &str) {
    counter!(
        "fanout_items_delivered_total",
        "dispatcher" => dispatcher.to_string()
    )
    .increment(1);
}

/// Record a silent per-consumer drop
pub fn record_item_dropped(dispatcher: &str, reason: DropReason) {
    counter!(
        "fanout_items_dropped_total",
        "dispatcher" => dispatcher.to_string(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record the current registry size
pub fn record_consumers_live(dispatcher: &str, live: usize) {
    gauge!(
        "fanout_consumers_live",
        "dispatcher" => dispatcher.to_string()
    )
    .set(live as f64);
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl StatsSummary {
    /// Largest absolute distance of min/max from the mean, as a fraction of the mean
    pub fn max_relative_deviation(&self) -> f64 {
        if self.count == 0 || self.mean == 0.0 {
            0.0
        } else {
            (self.max - self.mean)
                .abs()
                .max((self.mean - self.min).abs())
                / self.mean
        }
    }
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Snapshot as a summary
    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}

impl FromIterator<f64> for RunningStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Self::default();
        for value in iter {
            stats.push(value);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let stats: RunningStats = [1.0, 2.0, 3.0, 4.0, 5.0].into_iter().collect();

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_relative_deviation() {
        let even: RunningStats = [6000.0; 5].into_iter().collect();
        assert_eq!(even.summary().max_relative_deviation(), 0.0);

        let skewed: RunningStats = [50.0, 100.0, 150.0].into_iter().collect();
        assert!((skewed.summary().max_relative_deviation() - 0.5).abs() < 1e-10);

        assert_eq!(RunningStats::default().summary().max_relative_deviation(), 0.0);
    }

    #[test]
    fn test_summary_display() {
        let summary = StatsSummary {
            count: 5,
            min: 5990.0,
            max: 6010.0,
            mean: 6000.0,
            std_dev: 7.5,
        };

        let output = format!("{}", summary);
        assert!(output.contains("mean=6000.000"));
        assert!(output.contains("(n=5)"));
        assert_eq!(format!("{}", StatsSummary::default()), "N/A");
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(DropReason::NoConsumers.as_str(), "no_consumers");
        assert_eq!(RejectReason::BufferFull.as_str(), "buffer_full");
    }

    #[test]
    fn test_recorders_without_installed_recorder() {
        // With no global recorder installed these are no-ops.
        record_item_accepted("test");
        record_item_rejected("test", RejectReason::Closed);
        record_item_delivered("test");
        record_item_dropped("test", DropReason::ConsumerFull);
        record_consumers_live("test", 3);
    }
}
