//! Engine tuning knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_unindexed_delay_ms() -> u64 {
    3
}

fn default_hedge_delay_ms() -> u64 {
    10
}

/// Tuning knobs for the sort engine.
///
/// Fields are serde-defaulted so a partial config deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Head start granted to the indexed strategy before the direct
    /// strategy joins the race, in milliseconds
    #[serde(default = "default_unindexed_delay_ms")]
    pub unindexed_delay_ms: u64,
    /// Delay before a remote call is hedged with a backup request to a
    /// replica, in milliseconds
    #[serde(default = "default_hedge_delay_ms")]
    pub hedge_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            unindexed_delay_ms: default_unindexed_delay_ms(),
            hedge_delay_ms: default_hedge_delay_ms(),
        }
    }
}

impl EngineConfig {
    /// Head start for the indexed strategy.
    pub fn unindexed_delay(&self) -> Duration {
        Duration::from_millis(self.unindexed_delay_ms)
    }

    /// Backup-request hedge delay.
    pub fn hedge_delay(&self) -> Duration {
        Duration::from_millis(self.hedge_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.unindexed_delay(), Duration::from_millis(3));
        assert_eq!(config.hedge_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_partial_deserialization() {
        let config: EngineConfig = serde_json::from_str(r#"{"hedge_delay_ms": 25}"#).unwrap();
        assert_eq!(config.unindexed_delay_ms, 3);
        assert_eq!(config.hedge_delay_ms, 25);
    }
}
