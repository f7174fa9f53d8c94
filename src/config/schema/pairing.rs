use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_qr_ttl_secs() -> u32 {
    45
}

fn default_max_poll_failures() -> u32 {
    5
}

fn default_backoff_max_secs() -> u64 {
    30
}

fn default_poll_deadline_secs() -> u64 {
    120
}

/// What happens to polling once the QR countdown reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Expiry only changes what is displayed; the status poll keeps running.
    #[default]
    KeepPolling,
    /// Expiry ends the pairing attempt.
    StopPolling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    #[serde(default = "default_poll_interval_secs", rename = "pollIntervalSecs")]
    pub poll_interval_secs: u64,
    /// Starting value of the cosmetic QR countdown.
    #[serde(default = "default_qr_ttl_secs", rename = "qrTtlSecs")]
    pub qr_ttl_secs: u32,
    /// Consecutive failed status polls before giving up.
    #[serde(default = "default_max_poll_failures", rename = "maxPollFailures")]
    pub max_poll_failures: u32,
    #[serde(default = "default_backoff_max_secs", rename = "backoffMaxSecs")]
    pub backoff_max_secs: u64,
    /// Total time a single pairing attempt may poll. `0` disables the deadline.
    #[serde(default = "default_poll_deadline_secs", rename = "pollDeadlineSecs")]
    pub poll_deadline_secs: u64,
    #[serde(default, rename = "expiryPolicy")]
    pub expiry_policy: ExpiryPolicy,
    /// Instance name sent on creation. The backend picks one when absent.
    #[serde(default, rename = "instanceName", skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            qr_ttl_secs: default_qr_ttl_secs(),
            max_poll_failures: default_max_poll_failures(),
            backoff_max_secs: default_backoff_max_secs(),
            poll_deadline_secs: default_poll_deadline_secs(),
            expiry_policy: ExpiryPolicy::default(),
            instance_name: None,
        }
    }
}

impl PairingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub fn poll_deadline(&self) -> Option<Duration> {
        (self.poll_deadline_secs > 0).then(|| Duration::from_secs(self.poll_deadline_secs))
    }
}
