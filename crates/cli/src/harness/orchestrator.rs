//! Harness orchestrator - wires producers, a dispatcher and consumers for one run.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{FanoutBlueprint, WorkloadConfig};
use dispatcher::{CancellationToken, Consumer, DispatchError, Dispatcher};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

use super::RunStats;

/// Per-producer outcome
#[derive(Debug, Default)]
struct ProducerReport {
    written: u64,
    retries: u64,
    timed_out: bool,
}

/// Shared by reader tasks and the settle loop
#[derive(Debug, Default)]
struct ReadProgress {
    received: AtomicU64,
    finished: AtomicUsize,
}

/// Drives one dispatcher with synthetic producers and consumers
pub struct Harness {
    blueprint: FanoutBlueprint,
}

impl Harness {
    pub fn new(blueprint: FanoutBlueprint) -> Self {
        Self { blueprint }
    }

    /// Run the workload to completion.
    ///
    /// Consumers are registered before any producer starts. Once producers
    /// finish, the harness waits until every accepted item has been
    /// dispatched and read, then closes the dispatcher.
    #[instrument(name = "harness_run", skip(self), fields(strategy = %self.blueprint.dispatcher.strategy))]
    pub async fn run(self) -> Result<RunStats> {
        let workload = self.blueprint.workload.clone();
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + Duration::from_millis(workload.timeout_ms);

        let dispatcher = Arc::new(Dispatcher::<u64>::from_config(&self.blueprint.dispatcher));
        let scope = CancellationToken::new();
        let progress = Arc::new(ReadProgress::default());

        info!(
            dispatcher = dispatcher.name(),
            producers = workload.producers,
            consumers = workload.consumers,
            items = workload.total_items(),
            "Starting run"
        );

        let mut readers = Vec::with_capacity(workload.consumers);
        for _ in 0..workload.consumers {
            let consumer = create_consumer(&dispatcher, &scope, &workload)
                .context("Failed to register consumer")?;
            readers.push(spawn_reader(consumer, Arc::clone(&progress)));
        }

        let mut producers = JoinSet::new();
        for producer_id in 0..workload.producers {
            producers.spawn(produce(
                Arc::clone(&dispatcher),
                producer_id as u64,
                workload.items_per_producer,
                deadline,
            ));
        }

        let mut written = 0;
        let mut retries = 0;
        let mut timed_out = false;
        while let Some(joined) = producers.join_next().await {
            let report = joined.context("Producer task failed")?;
            written += report.written;
            retries += report.retries;
            timed_out |= report.timed_out;
        }
        debug!(written, retries, "Producers finished");

        if !timed_out {
            timed_out = !settle(&dispatcher, &progress, workload.consumers, deadline).await;
        }
        if timed_out {
            warn!(timeout_ms = workload.timeout_ms, "Run timed out before settling");
        }

        scope.cancel();
        let mut per_consumer = Vec::with_capacity(readers.len());
        for reader in readers {
            per_consumer.push(reader.await.context("Consumer task failed")?);
        }

        dispatcher.shutdown().await;

        Ok(RunStats {
            dispatcher_name: dispatcher.name().to_string(),
            strategy: dispatcher.strategy(),
            items_attempted: workload.total_items(),
            items_written: written,
            write_retries: retries,
            received: per_consumer,
            lifetime_limited: workload.consumer_lifetime_ms > 0,
            metrics: dispatcher.metrics(),
            duration: start.elapsed(),
            timed_out,
        })
    }
}

fn create_consumer(
    dispatcher: &Dispatcher<u64>,
    scope: &CancellationToken,
    workload: &WorkloadConfig,
) -> Result<Consumer<u64>, DispatchError> {
    match workload.consumer_lifetime_ms {
        0 => dispatcher.create_consumer(scope),
        ms => dispatcher.create_consumer_with_timeout(scope, Duration::from_millis(ms)),
    }
}

/// Read until the consumer is cancelled, then take whatever is still buffered
fn spawn_reader(mut consumer: Consumer<u64>, progress: Arc<ReadProgress>) -> JoinHandle<Vec<u64>> {
    tokio::spawn(async move {
        let mut items = Vec::new();
        while let Some(item) = consumer.recv().await {
            items.push(item);
            progress.received.fetch_add(1, Ordering::Relaxed);
        }
        let rest = consumer.drain();
        progress
            .received
            .fetch_add(rest.len() as u64, Ordering::Relaxed);
        items.extend(rest);
        progress.finished.fetch_add(1, Ordering::Relaxed);
        debug!(consumer = %consumer.id(), read = items.len(), "Consumer finished");
        items
    })
}

/// Write `items` values tagged with the producer id, retrying on a full buffer
async fn produce(
    dispatcher: Arc<Dispatcher<u64>>,
    producer_id: u64,
    items: u64,
    deadline: tokio::time::Instant,
) -> ProducerReport {
    let mut report = ProducerReport::default();

    for seq in 0..items {
        let item = producer_id * items + seq;
        loop {
            match dispatcher.write(item) {
                Ok(()) => {
                    report.written += 1;
                    break;
                }
                Err(DispatchError::BufferFull) => {
                    report.retries += 1;
                    if tokio::time::Instant::now() >= deadline {
                        report.timed_out = true;
                        return report;
                    }
                    tokio::task::yield_now().await;
                }
                Err(DispatchError::Closed) => return report,
            }
        }
    }

    report
}

/// Wait until everything accepted was dispatched and read.
///
/// Once every reader has ended (expired consumers) nothing more can be read,
/// so that also counts as settled. Returns `false` if `deadline` passes first.
async fn settle(
    dispatcher: &Dispatcher<u64>,
    progress: &ReadProgress,
    readers: usize,
    deadline: tokio::time::Instant,
) -> bool {
    loop {
        let metrics = dispatcher.metrics();
        let drained = progress.received.load(Ordering::Relaxed) >= metrics.delivered
            || progress.finished.load(Ordering::Relaxed) >= readers;
        if metrics.dispatched >= metrics.accepted && drained {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
