use std::{sync::Arc, time::SystemTime};

use async_trait::async_trait;
use bvi_model::{
    BhaFunc, BhaFuncResult, BhaModel, Task, TaskConfig, TaskFilter, TaskPatch, TaskType,
};
use parking_lot::Mutex;

use crate::{error::CoreError, ports::DocumentStore};

#[derive(Default)]
struct Documents {
    tasks: Vec<Task>,
    configs: Vec<TaskConfig>,
    models: Vec<BhaModel>,
    funcs: Vec<(String, BhaFunc)>,
    func_results: Vec<BhaFuncResult>,
}

/// Document store over plain vectors; configs are kept in insertion order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<Documents>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(&self, task: Task) {
        self.docs.lock().tasks.push(task);
    }

    pub fn task(&self, task_id: &str, task_type: TaskType) -> Option<Task> {
        let key = TaskFilter::key(task_id, task_type);
        self.docs
            .lock()
            .tasks
            .iter()
            .find(|t| key.matches(t))
            .cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.docs.lock().tasks.clone()
    }

    pub fn insert_config(&self, config: TaskConfig) {
        self.docs.lock().configs.push(config);
    }

    pub fn insert_model(&self, model: BhaModel) {
        self.docs.lock().models.push(model);
    }

    /// Soft-delete a model, as the API layer does.
    pub fn mark_model_deleted(&self, id: &str) -> bool {
        let mut docs = self.docs.lock();
        match docs.models.iter_mut().find(|m| m.id == id) {
            Some(model) => {
                model.deleted_at = Some(SystemTime::now());
                true
            }
            None => false,
        }
    }

    pub fn models(&self) -> Vec<BhaModel> {
        self.docs.lock().models.clone()
    }

    pub fn funcs(&self) -> Vec<(String, BhaFunc)> {
        self.docs.lock().funcs.clone()
    }

    pub fn func_results(&self) -> Vec<BhaFuncResult> {
        self.docs.lock().func_results.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, CoreError> {
        let docs = self.docs.lock();
        Ok(docs
            .tasks
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn update_where(
        &self,
        filter: &TaskFilter,
        patch: &TaskPatch,
    ) -> Result<u64, CoreError> {
        let mut docs = self.docs.lock();
        let mut matched = 0;
        for task in docs.tasks.iter_mut().filter(|t| filter.matches(t)) {
            patch.apply(task);
            matched += 1;
        }
        Ok(matched)
    }

    async fn replace_task(&self, task: &Task) -> Result<u64, CoreError> {
        let key = TaskFilter::key(task.task_id.as_str(), task.task_type());
        let mut docs = self.docs.lock();
        match docs.tasks.iter_mut().find(|t| key.matches(t)) {
            Some(stored) => {
                *stored = task.clone();
                stored.touch();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn latest_config(&self) -> Result<Option<TaskConfig>, CoreError> {
        Ok(self.docs.lock().configs.last().cloned())
    }

    async fn find_model(&self, id: &str) -> Result<Option<BhaModel>, CoreError> {
        let docs = self.docs.lock();
        Ok(docs
            .models
            .iter()
            .find(|m| m.id == id && m.deleted_at.is_none())
            .cloned())
    }

    async fn deleted_models(&self) -> Result<Vec<BhaModel>, CoreError> {
        let docs = self.docs.lock();
        Ok(docs
            .models
            .iter()
            .filter(|m| m.deleted_at.is_some())
            .cloned()
            .collect())
    }

    async fn delete_model(&self, id: &str) -> Result<(), CoreError> {
        self.docs.lock().models.retain(|m| m.id != id);
        Ok(())
    }

    async fn insert_func(&self, func: &BhaFunc) -> Result<String, CoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.docs.lock().funcs.push((id.clone(), func.clone()));
        Ok(id)
    }

    async fn insert_func_results(&self, results: &[BhaFuncResult]) -> Result<(), CoreError> {
        self.docs
            .lock()
            .func_results
            .extend(results.iter().cloned());
        Ok(())
    }
}
