//! # Contracts
//!
//! Shared interface contracts for the fan-out workspace: strategy and
//! configuration types, consumer identifiers, and the error taxonomy used by
//! configuration loading.
//! All business crates depend on this crate, reverse dependencies are prohibited.

mod blueprint;
mod consumer_id;
mod error;
mod strategy;

pub use blueprint::*;
pub use consumer_id::ConsumerId;
pub use error::*;
pub use strategy::FanoutStrategy;
