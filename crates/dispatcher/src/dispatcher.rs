//! Dispatcher - input queue plus the background fan-out loop

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use contracts::{ConsumerId, DispatcherConfig, FanoutStrategy};
use observability::metrics::{self as recorder, DropReason, RejectReason};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::consumer::{self, Consumer, ConsumerEntry, Delivery};
use crate::error::DispatchError;
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::registry::ConsumerRegistry;
use crate::strategy::{self, Selection};

/// State shared between the dispatcher handle, its loop and consumer watchers
struct Shared<T> {
    name: Arc<str>,
    registry: ConsumerRegistry<T>,
    /// Fired once by `close`
    shutdown: CancellationToken,
    /// Fired once the loop has exited and consumers were cancelled
    terminated: CancellationToken,
    metrics: DispatchMetrics,
}

/// Fans items written to one input queue out to registered consumers.
///
/// Writers call [`Dispatcher::write`] and never wait on consumers. A single
/// background task drains the input queue and pushes each item to the
/// consumer(s) chosen by the configured [`FanoutStrategy`]. Pushes that find a
/// full consumer queue are dropped.
///
/// Share it between tasks with an `Arc`. Dropping the dispatcher closes it.
pub struct Dispatcher<T> {
    strategy: FanoutStrategy,
    consumer_capacity: usize,
    input_tx: mpsc::Sender<T>,
    shared: Arc<Shared<T>>,
}

impl<T> Dispatcher<T>
where
    T: Clone + Send + 'static,
{
    /// Create a dispatcher and spawn its loop on the current Tokio runtime.
    ///
    /// # Panics
    /// - Either capacity is zero
    /// - Called outside a Tokio runtime
    pub fn new(strategy: FanoutStrategy, input_capacity: usize, consumer_capacity: usize) -> Self {
        Self::from_config(&DispatcherConfig::new(
            strategy,
            input_capacity,
            consumer_capacity,
        ))
    }

    /// Create a dispatcher from configuration.
    ///
    /// Unnamed configurations are named after the item type.
    ///
    /// # Panics
    /// Same conditions as [`Dispatcher::new`].
    pub fn from_config(config: &DispatcherConfig) -> Self {
        assert!(config.input_capacity > 0, "input_capacity must be >= 1");
        assert!(config.consumer_capacity > 0, "consumer_capacity must be >= 1");

        let name: Arc<str> = match &config.name {
            Some(name) => Arc::from(name.as_str()),
            None => Arc::from(short_type_name::<T>()),
        };

        let (input_tx, input_rx) = mpsc::channel(config.input_capacity);
        let shared = Arc::new(Shared {
            name,
            registry: ConsumerRegistry::new(),
            shutdown: CancellationToken::new(),
            terminated: CancellationToken::new(),
            metrics: DispatchMetrics::new(),
        });

        debug!(
            dispatcher = %shared.name,
            strategy = %config.strategy,
            input_capacity = config.input_capacity,
            consumer_capacity = config.consumer_capacity,
            "Dispatcher created"
        );

        tokio::spawn(dispatch_loop(
            Arc::clone(&shared),
            input_rx,
            config.strategy,
        ));

        Self {
            strategy: config.strategy,
            consumer_capacity: config.consumer_capacity,
            input_tx,
            shared,
        }
    }

    /// Offer an item without waiting.
    ///
    /// `Ok` only means the item was accepted; delivery happens later and may
    /// still be dropped per consumer.
    pub fn write(&self, item: T) -> Result<(), DispatchError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(self.reject(RejectReason::Closed));
        }

        match self.input_tx.try_send(item) {
            Ok(()) => {
                self.shared.metrics.inc_accepted();
                recorder::record_item_accepted(&self.shared.name);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                warn!(dispatcher = %self.shared.name, "Dispatcher buffer is full, dropping item");
                Err(self.reject(RejectReason::BufferFull))
            }
            Err(TrySendError::Closed(_)) => Err(self.reject(RejectReason::Closed)),
        }
    }

    /// Register a consumer that lives until `scope` is cancelled.
    ///
    /// The consumer also ends when the dispatcher closes or its handle is
    /// dropped. Fails with [`DispatchError::Closed`] once shutdown has begun.
    pub fn create_consumer(&self, scope: &CancellationToken) -> Result<Consumer<T>, DispatchError> {
        self.register(scope, None)
    }

    /// Like [`Dispatcher::create_consumer`], with a deadline after which the
    /// consumer cancels itself.
    pub fn create_consumer_with_deadline(
        &self,
        scope: &CancellationToken,
        deadline: Instant,
    ) -> Result<Consumer<T>, DispatchError> {
        self.register(scope, Some(deadline))
    }

    /// Like [`Dispatcher::create_consumer`], cancelled after `timeout`.
    pub fn create_consumer_with_timeout(
        &self,
        scope: &CancellationToken,
        timeout: Duration,
    ) -> Result<Consumer<T>, DispatchError> {
        self.register(scope, Some(Instant::now() + timeout))
    }

    #[instrument(
        name = "dispatcher_register_consumer",
        skip(self, scope),
        fields(dispatcher = %self.shared.name)
    )]
    fn register(
        &self,
        scope: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Consumer<T>, DispatchError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(DispatchError::Closed);
        }

        let (entry, consumer) = consumer::pair(self.consumer_capacity, scope);
        let id = entry.id().clone();
        let token = entry.cancellation_token().clone();

        // The registry is the authority: it refuses appends once torn down
        let live = self
            .shared
            .registry
            .append(entry)
            .map_err(|_| DispatchError::Closed)?;

        self.shared.metrics.inc_consumers_created();
        recorder::record_consumers_live(&self.shared.name, live);
        debug!(consumer = %id, live, "Consumer created, added to dispatcher");

        tokio::spawn(watch_consumer(
            Arc::downgrade(&self.shared),
            id,
            token,
            deadline,
        ));

        Ok(consumer)
    }
}

impl<T> Dispatcher<T> {
    /// Begin shutdown. Idempotent and non-blocking.
    ///
    /// The loop stops taking items, then cancels every registered consumer.
    /// Items still in the input queue are discarded.
    pub fn close(&self) {
        if self.shared.shutdown.is_cancelled() {
            return;
        }
        debug!(dispatcher = %self.shared.name, "Dispatcher closing");
        self.shared.shutdown.cancel();
    }

    /// Resolves once the loop has exited and all consumers were cancelled.
    pub async fn closed(&self) {
        self.shared.terminated.cancelled().await;
    }

    /// [`close`](Dispatcher::close) and wait for [`closed`](Dispatcher::closed).
    pub async fn shutdown(&self) {
        self.close();
        self.closed().await;
    }

    /// Whether shutdown has begun
    pub fn is_closed(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn strategy(&self) -> FanoutStrategy {
        self.strategy
    }

    pub fn input_capacity(&self) -> usize {
        self.input_tx.max_capacity()
    }

    pub fn consumer_capacity(&self) -> usize {
        self.consumer_capacity
    }

    /// Items accepted but not yet taken by the loop
    pub fn pending(&self) -> usize {
        self.input_tx.max_capacity() - self.input_tx.capacity()
    }

    /// Consumers currently in the registry
    pub fn consumer_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Registered consumer ids, in registry order
    pub fn consumer_ids(&self) -> Vec<ConsumerId> {
        self.shared.registry.ids()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    fn reject(&self, reason: RejectReason) -> DispatchError {
        recorder::record_item_rejected(&self.shared.name, reason);
        match reason {
            RejectReason::BufferFull => {
                self.shared.metrics.inc_rejected_full();
                DispatchError::BufferFull
            }
            RejectReason::Closed => {
                self.shared.metrics.inc_rejected_closed();
                DispatchError::Closed
            }
        }
    }
}

impl<T> Drop for Dispatcher<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.shared.name)
            .field("strategy", &self.strategy)
            .field("consumers", &self.shared.registry.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T: Clone> Shared<T> {
    /// Select targets and push `item` to each, under the registry lock.
    ///
    /// Drops are only collected under the lock and logged after it is
    /// released. `dispatched` is bumped once every push attempt has finished.
    fn dispatch(&self, strategy: FanoutStrategy, item: T) {
        let mut drops = Vec::new();

        let selection = self.registry.with_entries(|entries| {
            let selection = strategy::select(strategy, entries, &mut rand::rng());
            match selection {
                Selection::Empty => {}
                Selection::One(idx) => self.deliver(&mut entries[idx], item, &mut drops),
                Selection::All => {
                    if let Some((last, rest)) = entries.split_last_mut() {
                        for entry in rest {
                            self.deliver(entry, item.clone(), &mut drops);
                        }
                        self.deliver(last, item, &mut drops);
                    }
                }
            }
            selection
        });

        if selection == Selection::Empty {
            self.metrics.inc_dropped_no_consumer();
            recorder::record_item_dropped(&self.name, DropReason::NoConsumers);
            warn!("No consumers available, dropping item");
        }

        for (consumer, delivery) in drops {
            match delivery {
                Delivery::Full => {
                    warn!(consumer = %consumer, "Consumer buffer is full, dropping item")
                }
                _ => debug!(consumer = %consumer, "Consumer cancelled, dropping item"),
            }
        }

        self.metrics.inc_dispatched();
    }

    /// Push to one entry; counters are updated here, drops are handed back for logging
    fn deliver(
        &self,
        entry: &mut ConsumerEntry<T>,
        item: T,
        drops: &mut Vec<(ConsumerId, Delivery)>,
    ) {
        let delivery = entry.try_deliver(item);
        match delivery {
            Delivery::Delivered => {
                self.metrics.inc_delivered();
                recorder::record_item_delivered(&self.name);
                return;
            }
            Delivery::Full => {
                self.metrics.inc_dropped_full();
                recorder::record_item_dropped(&self.name, DropReason::ConsumerFull);
            }
            Delivery::Gone => {
                self.metrics.inc_dropped_full();
                recorder::record_item_dropped(&self.name, DropReason::ConsumerGone);
            }
        }
        drops.push((entry.id().clone(), delivery));
    }
}

impl<T> Shared<T> {
    fn deregister(&self, id: &ConsumerId) {
        if let Some(live) = self.registry.remove(id) {
            self.metrics.inc_consumers_removed();
            recorder::record_consumers_live(&self.name, live);
            debug!(
                dispatcher = %self.name,
                consumer = %id,
                live,
                "Consumer closed, removed from dispatcher"
            );
        }
    }
}

/// The single task that moves items from the input queue to consumers.
#[instrument(
    name = "dispatcher_loop",
    skip_all,
    fields(dispatcher = %shared.name, strategy = %strategy)
)]
async fn dispatch_loop<T: Clone>(
    shared: Arc<Shared<T>>,
    mut input_rx: mpsc::Receiver<T>,
    strategy: FanoutStrategy,
) {
    debug!("Dispatch loop started");

    loop {
        tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            item = input_rx.recv() => match item {
                Some(item) => shared.dispatch(strategy, item),
                // All senders gone: the dispatcher handle was dropped
                None => break,
            },
        }
    }

    input_rx.close();
    let discarded = input_rx.len();
    let cancelled = shared.registry.close();
    shared.terminated.cancel();

    debug!(cancelled, discarded, "Dispatch loop stopped, consumers cancelled");
}

/// Removes a consumer from the registry once its scope fires.
///
/// Holds only a weak reference so it never keeps a finished dispatcher alive.
async fn watch_consumer<T>(
    shared: Weak<Shared<T>>,
    id: ConsumerId,
    token: CancellationToken,
    deadline: Option<Instant>,
) {
    match deadline {
        Some(deadline) => {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    debug!(consumer = %id, "Consumer deadline exceeded");
                    token.cancel();
                }
            }
        }
        None => token.cancelled().await,
    }

    if let Some(shared) = shared.upgrade() {
        shared.deregister(&id);
    }
}

/// `alloc::vec::Vec<u8>` -> `Vec`
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
