use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Lifecycle state of a Task document.
///
/// `Queuing -> Processing -> {Finished | Failed | Terminated}`; a queued Task may also be
/// terminated or failed directly (termination before admission, queue timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the queue for admission.
    Queuing,
    /// Claimed by a worker and executing.
    Processing,
    /// Completed and results persisted.
    Finished,
    /// Completed with an error.
    Failed,
    /// Cancelled on request.
    Terminated,
}

impl TaskStatus {
    pub const ACTIVE: [TaskStatus; 2] = [TaskStatus::Queuing, TaskStatus::Processing];

    /// Returns `true` if the Task will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Failed | TaskStatus::Terminated
        )
    }

    /// Returns `true` if the Task is queued or running.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Queuing | TaskStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queuing => "queuing",
            TaskStatus::Processing => "processing",
            TaskStatus::Finished => "finished",
            TaskStatus::Failed => "failed",
            TaskStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queuing" => Ok(TaskStatus::Queuing),
            "processing" => Ok(TaskStatus::Processing),
            "finished" => Ok(TaskStatus::Finished),
            "failed" => Ok(TaskStatus::Failed),
            "terminated" => Ok(TaskStatus::Terminated),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}
