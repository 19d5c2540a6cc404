use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ErrorClass, FieldSyncError};

/// Backoff for replaying outbox entries after reconnect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Drain attempts per reconnect, the first one included
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    /// Random jitter (0.0-1.0) applied around the computed delay
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempt` failed with `error`
    pub fn should_retry(&self, attempt: u32, error: &FieldSyncError) -> bool {
        attempt + 1 < self.max_retries && error.is_retryable()
    }

    /// Delay before attempt number `attempt + 1`
    pub fn delay_for(&self, attempt: u32, error: &FieldSyncError) -> Duration {
        let base = self.base_delay_ms as f64 * self.backoff_factor.powf(attempt as f64);
        let adjusted = base * delay_multiplier(error);
        let capped = adjusted.min(self.max_delay_ms as f64);
        let jitter = capped * self.jitter_factor * (rand::random::<f64>() - 0.5);
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

fn delay_multiplier(error: &FieldSyncError) -> f64 {
    match error {
        FieldSyncError::Offline | FieldSyncError::Network(_) => 2.0,
        FieldSyncError::Server { .. } => 1.5,
        // fresh credentials are usually available right away
        _ if error.class() == ErrorClass::Auth => 0.5,
        _ => 1.0,
    }
}
