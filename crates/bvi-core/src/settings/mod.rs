//! Static scheduler configuration and the hot-reloadable task settings.

use std::{collections::HashMap, sync::Arc, time::Duration};

use bvi_model::{TaskConfig, TaskType};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Timeout applied when a type's timeout is unset or zero.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Scheduler configuration; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Name used in logs.
    pub name: String,
    /// Initial global capacity, replaced by the latest persisted config on start.
    pub concurrency: usize,
    pub sca_timeout_secs: u64,
    pub sast_timeout_secs: u64,
    pub bha_timeout_secs: u64,
    /// Pause when the global limiter is full or an admission was rejected.
    pub backpressure_ms: u64,
    /// Pause when a queue had nothing to fetch.
    pub idle_fetch_ms: u64,
    pub reaper_interval_ms: u64,
    pub heartbeat_ms: u64,
    /// How long a termination request blocks late cohort members from starting.
    pub tombstone_ttl_ms: u64,
    /// Per-category (source language) capacities.
    pub category_limits: HashMap<String, usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "tasks@job".to_string(),
            concurrency: 1,
            sca_timeout_secs: 0,
            sast_timeout_secs: 0,
            bha_timeout_secs: 0,
            backpressure_ms: 500,
            idle_fetch_ms: 500,
            reaper_interval_ms: 10_000,
            heartbeat_ms: 300_000,
            tombstone_ttl_ms: 600_000,
            category_limits: HashMap::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let intervals = [
            ("backpressure_ms", self.backpressure_ms),
            ("idle_fetch_ms", self.idle_fetch_ms),
            ("reaper_interval_ms", self.reaper_interval_ms),
            ("heartbeat_ms", self.heartbeat_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(CoreError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn backpressure(&self) -> Duration {
        Duration::from_millis(self.backpressure_ms)
    }

    #[inline]
    pub fn idle_fetch(&self) -> Duration {
        Duration::from_millis(self.idle_fetch_ms)
    }

    #[inline]
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }

    #[inline]
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    #[inline]
    pub fn tombstone_ttl(&self) -> Duration {
        Duration::from_millis(self.tombstone_ttl_ms)
    }
}

/// The live values read at job start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSettings {
    pub concurrency: usize,
    pub sca_timeout: Duration,
    pub sast_timeout: Duration,
    pub bha_timeout: Duration,
}

impl TaskSettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            sca_timeout: Duration::from_secs(config.sca_timeout_secs),
            sast_timeout: Duration::from_secs(config.sast_timeout_secs),
            bha_timeout: Duration::from_secs(config.bha_timeout_secs),
        }
    }

    /// Take the concurrency and every timeout present in `config`.
    pub fn apply(&mut self, config: &TaskConfig) {
        self.concurrency = config.concurrency;
        if let Some(secs) = config.sca_timeout {
            self.sca_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = config.sast_timeout {
            self.sast_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = config.bha_timeout {
            self.bha_timeout = Duration::from_secs(secs);
        }
    }

    pub fn timeout_for(&self, task_type: TaskType) -> Duration {
        let timeout = match task_type {
            TaskType::Sca => self.sca_timeout,
            TaskType::Sast => self.sast_timeout,
            TaskType::Bha => self.bha_timeout,
        };
        if timeout.is_zero() {
            DEFAULT_TASK_TIMEOUT
        } else {
            timeout
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// Shared handle to the live [`TaskSettings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<TaskSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: TaskSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn get(&self) -> TaskSettings {
        *self.inner.read()
    }

    pub fn reset(&self, settings: TaskSettings) {
        *self.inner.write() = settings;
    }

    /// Apply `config` and return the resulting settings.
    pub fn apply(&self, config: &TaskConfig) -> TaskSettings {
        let mut settings = self.inner.write();
        settings.apply(config);
        *settings
    }

    pub fn timeout_for(&self, task_type: TaskType) -> Duration {
        self.inner.read().timeout_for(task_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = SchedulerConfig::from_json(r#"{"concurrency": 4}"#).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.backpressure(), Duration::from_millis(500));
        assert_eq!(config.reaper_interval(), Duration::from_secs(10));
        assert!(config.category_limits.is_empty());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = SchedulerConfig::from_json(r#"{"reaper_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = SchedulerConfig::from_json(r#"{"concurrency": "x"}"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
        assert!(SchedulerConfig::from_json("{").is_err());
    }

    #[test]
    fn unset_timeout_falls_back_to_default() {
        let settings = TaskSettings::default();
        assert_eq!(settings.timeout_for(TaskType::Bha), DEFAULT_TASK_TIMEOUT);
    }

    #[test]
    fn apply_keeps_absent_timeouts() {
        let handle = SettingsHandle::new(TaskSettings {
            concurrency: 1,
            sca_timeout: Duration::from_secs(60),
            sast_timeout: Duration::from_secs(120),
            bha_timeout: Duration::from_secs(180),
        });

        let applied = handle.apply(&TaskConfig {
            concurrency: 5,
            sca_timeout: None,
            sast_timeout: Some(30),
            bha_timeout: Some(0),
        });

        assert_eq!(applied.concurrency, 5);
        assert_eq!(handle.timeout_for(TaskType::Sca), Duration::from_secs(60));
        assert_eq!(handle.timeout_for(TaskType::Sast), Duration::from_secs(30));
        assert_eq!(handle.timeout_for(TaskType::Bha), DEFAULT_TASK_TIMEOUT);
    }
}
