use std::time::SystemTime;

use crate::{Task, TaskStatus, TaskType};

/// Selection over Task documents used by the store port.
///
/// Empty fields match everything; `statuses` matches any of the listed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub task_id: Option<String>,
    pub task_type: Option<TaskType>,
    pub statuses: Vec<TaskStatus>,
    /// Only bha Tasks whose parameters reference this model.
    pub model_id: Option<String>,
    /// Only Tasks created strictly before this instant.
    pub created_before: Option<SystemTime>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter addressing exactly one Task: `(task_id, type)`.
    pub fn key(task_id: impl Into<String>, task_type: TaskType) -> Self {
        Self::new().with_task_id(task_id).with_task_type(task_type)
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        self.statuses.extend(statuses);
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_created_before(mut self, at: SystemTime) -> Self {
        self.created_before = Some(at);
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if self.task_id.as_ref().is_some_and(|id| id != &task.task_id) {
            return false;
        }
        if self.task_type.is_some_and(|ty| ty != task.task_type()) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if let Some(model) = &self.model_id {
            let referenced = task
                .bha_params()
                .and_then(|p| p.model_id.as_deref())
                .is_some_and(|m| m == model);
            if !referenced {
                return false;
            }
        }
        if self.created_before.is_some_and(|before| task.created_at >= before) {
            return false;
        }
        true
    }
}
