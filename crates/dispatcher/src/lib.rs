//! # Dispatcher
//!
//! Fan-out engine: one input queue, many bounded consumer queues.
//!
//! Responsibilities:
//! - Accept items without blocking writers (`write`)
//! - Deliver each item per strategy: all consumers, one random, or least recently used
//! - Keep the consumer registry consistent while consumers come and go
//! - Never block on a slow consumer; a full consumer queue drops the item
//!
//! # Example
//!
//! ```no_run
//! use dispatcher::{Dispatcher, FanoutStrategy};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let dispatcher = Dispatcher::<u64>::new(FanoutStrategy::All, 1024, 256);
//! let scope = CancellationToken::new();
//! let mut consumer = dispatcher.create_consumer(&scope).unwrap();
//!
//! dispatcher.write(42).unwrap();
//! assert_eq!(consumer.recv().await, Some(42));
//!
//! dispatcher.shutdown().await;
//! # }
//! ```

mod consumer;
pub mod dispatcher;
pub mod error;
pub mod metrics;
mod registry;
mod strategy;

pub use consumer::Consumer;
pub use contracts::{ConsumerId, DispatcherConfig, FanoutStrategy};
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use tokio_util::sync::CancellationToken;
