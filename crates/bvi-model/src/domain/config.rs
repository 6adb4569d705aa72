use serde::{Deserialize, Serialize};

/// Persisted/broadcast task configuration.
///
/// Timeouts are in seconds; an absent timeout leaves the current value unchanged when applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskConfig {
    #[serde(rename = "concurrent")]
    pub concurrency: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sca_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sast_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bha_timeout: Option<u64>,
}
