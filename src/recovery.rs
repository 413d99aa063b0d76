use crate::config::CameraConfig;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bounded retry with a fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay between attempts
    pub delay: Duration,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Retry after the policy delay
    RetryAfterDelay(Duration),
    /// Attempts exhausted
    GiveUp,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy used while waiting for the capture surface to be mounted
    pub fn surface_mount(config: &CameraConfig) -> Self {
        Self::new(
            config.surface_retry_attempts,
            Duration::from_millis(config.surface_retry_delay_ms),
        )
    }

    /// Decide the next step after `attempt` (1-based) has failed
    pub fn after_failure(&self, attempt: u32) -> RecoveryAction {
        if attempt >= self.max_attempts {
            RecoveryAction::GiveUp
        } else {
            RecoveryAction::RetryAfterDelay(self.delay)
        }
    }

    /// Sleep for the policy delay. Returns false if cancelled first.
    pub async fn backoff(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Retry backoff cancelled");
                false
            }
            _ = sleep(self.delay) => true,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(100))
    }
}
