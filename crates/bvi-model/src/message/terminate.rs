use serde::{Deserialize, Serialize};

use crate::TaskId;

/// Request to terminate every Task of a cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateRequest {
    pub task_id: TaskId,
}
