use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Remote analysis service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BhaConfig {
    /// Base URL of the service, `/scan` and `/stop/{id}` are resolved against it.
    pub api_url: String,
    /// Bucket the service reads inputs from and writes outputs to.
    pub bucket: String,
    pub poll_interval_ms: u64,
    pub insecure_skip_verify: bool,
    pub request_timeout_ms: u64,
}

impl Default for BhaConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            bucket: "bin-vul-inspector".to_string(),
            poll_interval_ms: 2_000,
            insecure_skip_verify: true,
            request_timeout_ms: 30_000,
        }
    }
}

impl BhaConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
