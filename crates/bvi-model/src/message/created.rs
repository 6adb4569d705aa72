use serde::{Deserialize, Serialize};

use crate::{TaskId, TaskType};

/// Work-queue message announcing a submission: one cohort of Tasks sharing `task_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub task_id: TaskId,
    pub types: Vec<TaskType>,
    /// Source language, present when the submission includes a category-limited type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl CreatedTask {
    pub fn new(task_id: impl Into<TaskId>, types: impl IntoIterator<Item = TaskType>) -> Self {
        Self {
            task_id: task_id.into(),
            types: types.into_iter().collect(),
            lang: None,
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Category key for the per-language limiter, if any member needs it.
    pub fn category(&self) -> Option<&str> {
        if self.types.iter().any(TaskType::is_category_limited) {
            self.lang.as_deref().filter(|l| !l.is_empty())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn category_requires_limited_type() {
        let sca = CreatedTask::new("t", [TaskType::Sca]).with_lang("java");
        assert_eq!(sca.category(), None);

        let sast = CreatedTask::new("t", [TaskType::Sca, TaskType::Sast]).with_lang("java");
        assert_eq!(sast.category(), Some("java"));

        let no_lang = CreatedTask::new("t", [TaskType::Sast]);
        assert_eq!(no_lang.category(), None);
    }

    #[test]
    fn wire_form_uses_snake_case_id() {
        let msg = CreatedTask::new("t-9", [TaskType::Bha]);
        let bytes = msg.payload().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["task_id"], "t-9");
        assert_eq!(json["types"][0], "bha");
        assert!(json.get("lang").is_none());

        let sast = CreatedTask::decode(br#"{"task_id":"t-3","types":["sast"],"lang":"java"}"#)
            .unwrap();
        assert_eq!(sast.category(), Some("java"));

        assert_eq!(CreatedTask::decode(&bytes).unwrap(), msg);
        assert!(CreatedTask::decode(b"not json").is_err());
    }
}
