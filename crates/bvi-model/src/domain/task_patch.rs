use crate::{Task, TaskStatus, err_code};

/// Partial update applied to every Task a filter matches.
///
/// Unset fields are left as they are; `modified_at` is always refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub err_code: Option<i32>,
    pub err_msg: Option<String>,
    pub debug_msg: Option<String>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Failed),
            err_code: Some(code),
            err_msg: Some(message.into()),
            debug_msg: None,
        }
    }

    pub fn terminated() -> Self {
        Self {
            status: Some(TaskStatus::Terminated),
            err_code: Some(err_code::DATA_PROCESSING),
            err_msg: Some(err_code::MSG_TERMINATED.to_string()),
            debug_msg: None,
        }
    }

    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug_msg = Some(debug.into());
        self
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(code) = self.err_code {
            task.err_code = code;
        }
        if let Some(msg) = &self.err_msg {
            task.err_msg = msg.clone();
        }
        if let Some(debug) = &self.debug_msg {
            task.debug_msg = debug.clone();
        }
        task.touch();
    }
}
