use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{BhaParams, SastParams, ScaParams, TaskId, TaskStatus, TaskType};

/// Type-specific scan parameters; the variant is the Task's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskDetail {
    Sca(ScaParams),
    Sast(SastParams),
    Bha(BhaParams),
}

impl TaskDetail {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskDetail::Sca(_) => TaskType::Sca,
            TaskDetail::Sast(_) => TaskType::Sast,
            TaskDetail::Bha(_) => TaskType::Bha,
        }
    }
}

/// One scan of one type for one submission.
///
/// Several Tasks may share a `task_id` (one per requested type); the pair `(task_id, type)` is the
/// identity the scheduler uses for conditional updates and cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: TaskId,
    #[serde(default)]
    pub name: String,
    pub detail: TaskDetail,
    pub status: TaskStatus,
    /// Storage prefix holding the scan output.
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub err_code: i32,
    /// User-facing error text, meaningful only when `err_code != 0`.
    #[serde(default)]
    pub err_msg: String,
    /// Internal diagnostics (backend error, panic payload).
    #[serde(default)]
    pub debug_msg: String,
    /// Blob-store path of the uploaded scan target.
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_hash: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(with = "time_serde")]
    pub created_at: SystemTime,
    #[serde(with = "time_serde")]
    pub modified_at: SystemTime,
}

impl Task {
    /// Create a queued Task stamped with the current time.
    pub fn new(task_id: impl Into<TaskId>, detail: TaskDetail) -> Self {
        let now = SystemTime::now();
        Self {
            task_id: task_id.into(),
            name: String::new(),
            detail,
            status: TaskStatus::Queuing,
            result: String::new(),
            err_code: 0,
            err_msg: String::new(),
            debug_msg: String::new(),
            file_path: String::new(),
            file_hash: String::new(),
            file_size: 0,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = path.into();
        self
    }

    pub fn with_created_at(mut self, at: SystemTime) -> Self {
        self.created_at = at;
        self.modified_at = at;
        self
    }

    #[inline]
    pub fn task_type(&self) -> TaskType {
        self.detail.task_type()
    }

    /// The per-category limiter key, if this Task's type is category-limited.
    pub fn category(&self) -> Option<&str> {
        match &self.detail {
            TaskDetail::Sast(p) => Some(p.lang.as_str()),
            _ => None,
        }
    }

    pub fn bha_params(&self) -> Option<&BhaParams> {
        match &self.detail {
            TaskDetail::Bha(p) => Some(p),
            _ => None,
        }
    }

    /// Move to `Failed` with the given diagnostics.
    pub fn fail(&mut self, code: i32, message: impl Into<String>, debug: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.err_code = code;
        self.err_msg = message.into();
        self.debug_msg = debug.into();
    }

    /// Refresh `modified_at`.
    pub fn touch(&mut self) {
        self.modified_at = SystemTime::now();
    }
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        since_epoch.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}
