//! Consumer - a registered recipient with its own bounded output queue
//!
//! Every consumer is split in two halves created together by [`pair`]:
//! - [`Consumer`]: the caller's handle, used for reading and cancelling
//! - [`ConsumerEntry`]: the registry's half, used by the dispatch loop to push

use std::fmt;
use std::time::Instant;

use contracts::ConsumerId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Create both halves of a consumer.
///
/// The consumer's scope is a child of `parent`: cancelling `parent` cancels the
/// consumer, never the other way round.
pub(crate) fn pair<T>(
    capacity: usize,
    parent: &CancellationToken,
) -> (ConsumerEntry<T>, Consumer<T>) {
    let id = ConsumerId::generate();
    let (tx, rx) = mpsc::channel(capacity);
    let cancel = parent.child_token();

    let entry = ConsumerEntry {
        id: id.clone(),
        tx,
        last_used: Instant::now(),
        cancel: cancel.clone(),
    };
    let consumer = Consumer { id, rx, cancel };

    (entry, consumer)
}

/// Caller-side consumer handle.
///
/// Reading stops as soon as the consumer is cancelled, whatever triggered it:
/// the caller's scope, a deadline, dispatcher shutdown, or [`Consumer::cancel`].
/// Dropping the handle cancels the consumer as well.
pub struct Consumer<T> {
    id: ConsumerId,
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
}

impl<T> Consumer<T> {
    /// Opaque identifier, unique per consumer
    pub fn id(&self) -> &ConsumerId {
        &self.id
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the consumer is cancelled or the dispatcher has
    /// released the queue. Items still buffered at that point stay readable
    /// through [`Consumer::try_recv`] and [`Consumer::drain`].
    pub async fn recv(&mut self) -> Option<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    /// Take an already-buffered item without waiting.
    ///
    /// Keeps working after cancellation until the buffer is empty.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Take everything currently buffered, in delivery order
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.rx.len());
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }

    /// Number of items waiting in the output queue
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Output queue capacity
    pub fn capacity(&self) -> usize {
        self.rx.max_capacity()
    }

    /// Cancel this consumer. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the consumer is cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// The consumer's own scope, e.g. for deriving child work
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.id)
            .field("queued", &self.rx.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Outcome of a single non-blocking push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// Queue had no free slot
    Full,
    /// Consumer cancelled or its reader dropped
    Gone,
}

/// Registry-side half of a consumer
pub(crate) struct ConsumerEntry<T> {
    id: ConsumerId,
    tx: mpsc::Sender<T>,
    last_used: Instant,
    cancel: CancellationToken,
}

impl<T> ConsumerEntry<T> {
    pub(crate) fn id(&self) -> &ConsumerId {
        &self.id
    }

    pub(crate) fn last_used(&self) -> Instant {
        self.last_used
    }

    pub(crate) fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Push without waiting; `last_used` only moves on success.
    pub(crate) fn try_deliver(&mut self, item: T) -> Delivery {
        if self.cancel.is_cancelled() {
            return Delivery::Gone;
        }

        match self.tx.try_send(item) {
            Ok(()) => {
                self.last_used = Instant::now();
                Delivery::Delivered
            }
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Gone,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_last_used(&mut self, at: Instant) {
        self.last_used = at;
    }
}
