//! Retry configuration for analyzer execution.
//!
//! Analyzer calls can fail transiently (rate-limited model backends, busy
//! document services, network blips), so each analyzer carries its own retry
//! budget. Delays follow the configured strategy:
//!
//! - **Constant**: same delay between each retry
//! - **Linear**: delay grows linearly (base * attempt)
//! - **Exponential**: delay doubles each attempt (base * 2^attempt)
//!
//! # Configuration Example
//!
//! ```toml
//! [retry]
//! max_retries = 2
//! base_delay_ms = 250
//! strategy = "exponential"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration for a single analyzer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial call (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries in milliseconds (default: 250)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Retry strategy (default: exponential)
    #[serde(default)]
    pub strategy: RetryStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            strategy: RetryStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before the given retry attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms;
        let millis = match self.strategy {
            RetryStrategy::Constant => base,
            RetryStrategy::Linear => base.saturating_mul(attempt as u64),
            RetryStrategy::Exponential => {
                base.saturating_mul(1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX))
            }
        };
        Duration::from_millis(millis)
    }
}

/// Strategy for spacing retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    Constant,
    Linear,
    #[default]
    Exponential,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    250
}
