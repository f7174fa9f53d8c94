use crate::config::PairingConfig;
use std::time::Duration;

/// Timing of the status poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub backoff_max: Duration,
    /// Give up after this long without a scan. `None` polls until stopped.
    pub deadline: Option<Duration>,
}

impl PollSchedule {
    pub fn from_config(config: &PairingConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            backoff_max: config.backoff_max(),
            deadline: config.poll_deadline(),
        }
    }

    /// Delay before the next tick after `failures` consecutive failed checks.
    /// Doubles per failure, capped at `backoff_max`; zero failures is the base
    /// interval.
    pub fn next_delay(&self, failures: u32) -> Duration {
        let base = self.interval.as_millis() as u64;
        let cap = (self.backoff_max.as_millis() as u64).max(base);
        let delay = base.saturating_mul(1u64 << failures.min(20));
        Duration::from_millis(delay.min(cap))
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::from_config(&PairingConfig::default())
    }
}
