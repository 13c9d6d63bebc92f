//! Orchestrator settings

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::services::RetryPolicy;

fn default_parallelism() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    5000
}

fn default_lookahead() -> usize {
    32
}

fn default_version_horizon() -> usize {
    65_536
}

/// Tuning knobs of an import run
///
/// Every field has a default, so a partial JSON settings file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Maximum number of item writes in flight
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Total write attempts per item, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds), doubled on each further retry
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single retry delay (milliseconds)
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Items buffered to put versions of one identity back in order
    #[serde(default = "default_lookahead")]
    pub lookahead: usize,

    /// Identities whose latest released version is remembered to reject late versions
    #[serde(default = "default_version_horizon")]
    pub version_horizon: usize,

    /// Enumerate and order items without calling the repository writer
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            lookahead: default_lookahead(),
            version_horizon: default_version_horizon(),
            dry_run: false,
        }
    }
}

impl OrchestratorSettings {
    /// Clamp values into their usable ranges and keep the delay cap above the base delay
    pub fn normalize(mut self) -> Self {
        self.parallelism = self.parallelism.clamp(1, Semaphore::MAX_PERMITS);
        self.max_attempts = self.max_attempts.max(1);
        self.retry_base_delay_ms = self.retry_base_delay_ms.max(1);
        self.retry_max_delay_ms = self.retry_max_delay_ms.max(self.retry_base_delay_ms);
        self.lookahead = self.lookahead.max(1);
        self.version_horizon = self.version_horizon.max(self.lookahead);
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }
}
