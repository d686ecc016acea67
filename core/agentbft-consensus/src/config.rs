//! Configuration for AgentBFT apps

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// App configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deadline declared for the round timeout event, in seconds
    pub round_timeout_secs: u64,

    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Keys carried over when the app starts a new period
    pub cross_period_persisted_keys: BTreeSet<String>,
}

impl AppConfig {
    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let round_timeout_secs = std::env::var("AGENTBFT_ROUND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let enable_metrics = std::env::var("AGENTBFT_ENABLE_METRICS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);

        Self {
            round_timeout_secs,
            enable_metrics,
            cross_period_persisted_keys: BTreeSet::new(),
        }
    }
}
