//! FanoutStrategy - delivery rule applied per dispatched item

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ContractError;

/// Selection rule deciding which consumers receive a dispatched item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutStrategy {
    /// Every registered consumer receives its own copy
    #[default]
    All,
    /// One consumer, picked uniformly at random
    Single,
    /// The consumer whose last successful delivery is oldest
    Lru,
}

impl FanoutStrategy {
    /// All supported strategies, in declaration order
    pub const ALL: [FanoutStrategy; 3] = [Self::All, Self::Single, Self::Lru];

    /// Stable lowercase name, matches the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Single => "single",
            Self::Lru => "lru",
        }
    }

    /// Whether a single item may be delivered to more than one consumer
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for FanoutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FanoutStrategy {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "broadcast" => Ok(Self::All),
            "single" | "random" => Ok(Self::Single),
            "lru" => Ok(Self::Lru),
            other => Err(ContractError::config_validation(
                "strategy",
                format!("unknown strategy '{other}', expected one of: all, single, lru"),
            )),
        }
    }
}
