//! Consumer registry - the single contended structure
//!
//! One mutex serializes membership changes and every dispatch. Nothing done
//! under the lock waits: deliveries are `try_send` and cancellation only
//! flips tokens.

use std::sync::{Mutex, MutexGuard, PoisonError};
#[cfg(test)]
use std::sync::TryLockError;

use contracts::ConsumerId;

use crate::consumer::ConsumerEntry;

struct Inner<T> {
    entries: Vec<ConsumerEntry<T>>,
    /// Set once by [`ConsumerRegistry::close`]; later appends are refused
    closed: bool,
}

/// Ordered collection of live consumers
pub(crate) struct ConsumerRegistry<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> ConsumerRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // Nothing under the lock leaves the registry half-updated
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append at the end of the registry, returning the new live count.
    ///
    /// Hands the entry back if the registry was already closed.
    pub(crate) fn append(&self, entry: ConsumerEntry<T>) -> Result<usize, ConsumerEntry<T>> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(entry);
        }
        inner.entries.push(entry);
        Ok(inner.entries.len())
    }

    /// Remove by identity, returning the new live count.
    ///
    /// `None` when the entry was already gone.
    pub(crate) fn remove(&self, id: &ConsumerId) -> Option<usize> {
        let mut inner = self.lock();
        let pos = inner.entries.iter().position(|entry| entry.id() == id)?;
        // Preserve order, LRU ties depend on it
        inner.entries.remove(pos);
        Some(inner.entries.len())
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub(crate) fn ids(&self) -> Vec<ConsumerId> {
        self.lock()
            .entries
            .iter()
            .map(|entry| entry.id().clone())
            .collect()
    }

    /// Run `f` over the entries while holding the lock.
    pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&mut [ConsumerEntry<T>]) -> R) -> R {
        let mut inner = self.lock();
        f(&mut inner.entries)
    }

    /// Whether some caller currently holds the lock
    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        matches!(self.inner.try_lock(), Err(TryLockError::WouldBlock))
    }

    /// Refuse further appends and cancel every registered consumer.
    ///
    /// Entries stay until their own deregistration runs. Returns how many were
    /// cancelled; a second call cancels nothing new.
    pub(crate) fn close(&self) -> usize {
        let mut inner = self.lock();
        inner.closed = true;

        let mut cancelled = 0;
        for entry in &inner.entries {
            let token = entry.cancellation_token();
            if !token.is_cancelled() {
                token.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }
}
