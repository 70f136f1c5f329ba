//! # Integration Tests
//!
//! End-to-end tests across crates.
//!
//! Covers:
//! - Configuration to dispatcher wiring
//! - Delivery guarantees of each strategy under concurrent writers
//! - Consumer lifecycle and shutdown

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ConfigVersion, FanoutStrategy};
    use dispatcher::Dispatcher;

    #[test]
    fn test_contracts_compile() {
        let _ = ConfigVersion::V1;
        assert_eq!(FanoutStrategy::ALL.len(), 3);
    }

    #[tokio::test]
    async fn test_dispatcher_from_loaded_config() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[dispatcher]
name = "orders"
strategy = "lru"
input_capacity = 32
consumer_capacity = 4
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let dispatcher = Dispatcher::<String>::from_config(&blueprint.dispatcher);
        assert_eq!(dispatcher.name(), "orders");
        assert_eq!(dispatcher.strategy(), FanoutStrategy::Lru);
        assert_eq!(dispatcher.input_capacity(), 32);
        assert_eq!(dispatcher.consumer_capacity(), 4);
    }

    #[test]
    fn test_zero_capacity_never_reaches_dispatcher() {
        let result = ConfigLoader::load_from_str(
            "[dispatcher]\nconsumer_capacity = 0\n",
            ConfigFormat::Toml,
        );
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use dispatcher::{CancellationToken, Consumer, DispatchError, Dispatcher, FanoutStrategy};
    use tokio::task::JoinHandle;

    const WRITERS: u64 = 3;
    const ITEMS_PER_WRITER: u64 = 10_000;
    const CONSUMERS: usize = 5;
    const CAPACITY: usize = 65_535;

    fn spawn_reader(mut consumer: Consumer<u64>, received: Arc<AtomicU64>) -> JoinHandle<Vec<u64>> {
        tokio::spawn(async move {
            let mut items = Vec::new();
            while let Some(item) = consumer.recv().await {
                items.push(item);
                received.fetch_add(1, Ordering::Relaxed);
            }
            items.extend(consumer.drain());
            items
        })
    }

    fn spawn_writers(dispatcher: &Arc<Dispatcher<u64>>) -> Vec<JoinHandle<()>> {
        (0..WRITERS)
            .map(|writer| {
                let dispatcher = Arc::clone(dispatcher);
                tokio::spawn(async move {
                    for seq in 0..ITEMS_PER_WRITER {
                        let item = writer * ITEMS_PER_WRITER + seq;
                        while dispatcher.write(item) == Err(DispatchError::BufferFull) {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect()
    }

    /// Run writers against `CONSUMERS` readers and collect what each read
    async fn run_workload(strategy: FanoutStrategy) -> (Arc<Dispatcher<u64>>, Vec<Vec<u64>>) {
        let dispatcher = Arc::new(Dispatcher::<u64>::new(strategy, CAPACITY, CAPACITY));
        let scope = CancellationToken::new();
        let received = Arc::new(AtomicU64::new(0));

        let readers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let consumer = dispatcher.create_consumer(&scope).unwrap();
                spawn_reader(consumer, Arc::clone(&received))
            })
            .collect();

        for writer in spawn_writers(&dispatcher) {
            writer.await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let metrics = dispatcher.metrics();
                if metrics.dispatched == WRITERS * ITEMS_PER_WRITER
                    && received.load(Ordering::Relaxed) >= metrics.delivered
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("workload did not settle");

        scope.cancel();
        let mut per_consumer = Vec::with_capacity(CONSUMERS);
        for reader in readers {
            per_consumer.push(reader.await.unwrap());
        }
        (dispatcher, per_consumer)
    }

    /// Each writer's items must appear in the order it wrote them
    fn assert_writer_order(items: &[u64]) {
        let mut last = [None::<u64>; WRITERS as usize];
        for &item in items {
            let writer = (item / ITEMS_PER_WRITER) as usize;
            if let Some(prev) = last[writer] {
                assert!(item > prev, "writer {writer} reordered: {prev} then {item}");
            }
            last[writer] = Some(item);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_broadcast_conserves_every_item() {
        let total = WRITERS * ITEMS_PER_WRITER;
        let (dispatcher, per_consumer) = run_workload(FanoutStrategy::All).await;

        let first = &per_consumer[0];
        assert_eq!(first.len() as u64, total);
        for items in &per_consumer {
            assert_eq!(items, first, "consumers saw different sequences");
        }
        assert_writer_order(first);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.accepted, total);
        assert_eq!(metrics.delivered, total * CONSUMERS as u64);
        assert_eq!(metrics.dropped(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_delivers_each_item_exactly_once() {
        let total = WRITERS * ITEMS_PER_WRITER;
        let (dispatcher, per_consumer) = run_workload(FanoutStrategy::Single).await;

        let mut seen = HashSet::new();
        for items in &per_consumer {
            assert_writer_order(items);
            for &item in items {
                assert!(seen.insert(item), "item {item} delivered twice");
            }
        }
        assert_eq!(seen.len() as u64, total);
        assert_eq!(dispatcher.metrics().delivered, total);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lru_spreads_load_evenly() {
        let total = WRITERS * ITEMS_PER_WRITER;
        let (_dispatcher, per_consumer) = run_workload(FanoutStrategy::Lru).await;

        let counts: Vec<u64> = per_consumer.iter().map(|items| items.len() as u64).collect();
        assert_eq!(counts.iter().sum::<u64>(), total);

        let fair = total / CONSUMERS as u64;
        let tolerance = fair / 100;
        for count in &counts {
            assert!(
                count.abs_diff(fair) <= tolerance,
                "uneven LRU distribution: {counts:?}"
            );
        }

        let unique: HashSet<_> = per_consumer.iter().flatten().collect();
        assert_eq!(unique.len() as u64, total);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let dispatcher = Dispatcher::<u64>::new(FanoutStrategy::All, 8, 8);
        let scope = CancellationToken::new();
        let mut consumer = dispatcher.create_consumer(&scope).unwrap();

        dispatcher.close();
        dispatcher.close();
        dispatcher.shutdown().await;
        dispatcher.shutdown().await;

        assert_eq!(consumer.recv().await, None);
        assert_eq!(dispatcher.write(1), Err(DispatchError::Closed));
        assert_eq!(dispatcher.write(2), Err(DispatchError::Closed));
        assert!(dispatcher.create_consumer(&scope).is_err());

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.accepted, 0);
        assert_eq!(metrics.rejected_closed, 2);
        // The caller's scope is never cancelled by the dispatcher
        assert!(!scope.is_cancelled());
    }

    #[tokio::test]
    async fn test_deregistration_removes_exactly_one() {
        let dispatcher = Dispatcher::<u64>::new(FanoutStrategy::All, 8, 8);
        let shared_scope = CancellationToken::new();
        let own_scope = CancellationToken::new();

        let mut a = dispatcher.create_consumer(&shared_scope).unwrap();
        let mut leaving = dispatcher.create_consumer(&own_scope).unwrap();
        let mut c = dispatcher.create_consumer(&shared_scope).unwrap();
        assert_eq!(dispatcher.consumer_count(), 3);

        own_scope.cancel();
        leaving.cancel();
        tokio::time::timeout(Duration::from_secs(2), async {
            while dispatcher.consumer_count() != 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // Give a duplicate deregistration a chance to run
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(dispatcher.consumer_count(), 2);
        assert!(!dispatcher.consumer_ids().contains(leaving.id()));
        assert_eq!(dispatcher.metrics().consumers_removed, 1);

        // Items written afterwards reach only the two remaining consumers
        const AFTER: u64 = 5;
        for item in 0..AFTER {
            dispatcher.write(item).unwrap();
        }
        tokio::time::timeout(Duration::from_secs(2), async {
            while dispatcher.metrics().dispatched < AFTER {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(a.drain(), (0..AFTER).collect::<Vec<_>>());
        assert_eq!(c.drain(), (0..AFTER).collect::<Vec<_>>());
        assert_eq!(leaving.len(), 0);
        assert!(leaving.drain().is_empty());

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.delivered, 2 * AFTER);
        assert_eq!(metrics.dropped(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_consumer_churn_during_writes() {
        let dispatcher = Arc::new(Dispatcher::<u64>::new(FanoutStrategy::Lru, 1024, 64));
        let scope = CancellationToken::new();

        let churn = {
            let dispatcher = Arc::clone(&dispatcher);
            let scope = scope.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let consumer = dispatcher.create_consumer(&scope).unwrap();
                    tokio::task::yield_now().await;
                    drop(consumer);
                }
            })
        };

        let stable = dispatcher.create_consumer(&scope).unwrap();
        for writer in spawn_writers(&dispatcher) {
            writer.await.unwrap();
        }
        churn.await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while dispatcher.consumer_count() != 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.consumers_created, 201);
        assert_eq!(metrics.consumers_removed, 200);
        assert_eq!(metrics.accepted, WRITERS * ITEMS_PER_WRITER);

        dispatcher.shutdown().await;
        assert!(stable.is_cancelled());
        tokio::time::timeout(Duration::from_secs(2), async {
            while dispatcher.consumer_count() != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
