//! Dispatcher error types

use thiserror::Error;

/// Errors visible to writers and consumer creators.
///
/// Per-consumer drops never show up here: a write only reports whether the
/// item was accepted into the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Shutdown has begun, nothing is accepted anymore
    #[error("dispatcher is closed")]
    Closed,

    /// Input queue saturated at write time
    #[error("dispatcher input buffer is full")]
    BufferFull,
}

impl DispatchError {
    /// Whether the same call may succeed later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BufferFull)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient() {
        assert!(DispatchError::BufferFull.is_transient());
        assert!(!DispatchError::Closed.is_transient());
    }

    #[test]
    fn test_display() {
        assert_eq!(DispatchError::Closed.to_string(), "dispatcher is closed");
        assert_eq!(
            DispatchError::BufferFull.to_string(),
            "dispatcher input buffer is full"
        );
    }
}
