use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Kind of scan a Task performs.
///
/// The set is closed: handlers are registered per variant and an unregistered variant is detected
/// when the scheduler is built, not when a job arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Software composition analysis.
    Sca,
    /// Static application security testing.
    Sast,
    /// Binary hash / function-similarity analysis.
    Bha,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [TaskType::Sca, TaskType::Sast, TaskType::Bha];

    /// Returns a short symbolic identifier, used in logs, metrics and storage paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Sca => "sca",
            TaskType::Sast => "sast",
            TaskType::Bha => "bha",
        }
    }

    /// Whether jobs of this type also take a slot in the per-language limiter.
    pub fn is_category_limited(&self) -> bool {
        matches!(self, TaskType::Sast)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sca" => Ok(TaskType::Sca),
            "sast" => Ok(TaskType::Sast),
            "bha" => Ok(TaskType::Bha),
            other => Err(ModelError::UnknownTaskType(other.to_string())),
        }
    }
}
