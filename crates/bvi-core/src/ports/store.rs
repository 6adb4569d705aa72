use async_trait::async_trait;
use bvi_model::{BhaFunc, BhaFuncResult, BhaModel, Task, TaskConfig, TaskFilter, TaskPatch};

use crate::error::CoreError;

/// Task, config, model and result documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, CoreError>;

    /// Apply `patch` to every Task matching `filter`; returns the matched count.
    ///
    /// This is the compare-and-swap the scheduler relies on: a claim filtered on
    /// `status = queuing` succeeds for exactly one caller.
    async fn update_where(&self, filter: &TaskFilter, patch: &TaskPatch)
    -> Result<u64, CoreError>;

    /// Overwrite the Task stored under `(task_id, type)`; returns the matched count.
    async fn replace_task(&self, task: &Task) -> Result<u64, CoreError>;

    /// The most recently inserted config document.
    async fn latest_config(&self) -> Result<Option<TaskConfig>, CoreError>;

    async fn find_model(&self, id: &str) -> Result<Option<BhaModel>, CoreError>;

    /// Soft-deleted models awaiting purge.
    async fn deleted_models(&self) -> Result<Vec<BhaModel>, CoreError>;

    async fn delete_model(&self, id: &str) -> Result<(), CoreError>;

    /// Insert a function record; returns its id.
    async fn insert_func(&self, func: &BhaFunc) -> Result<String, CoreError>;

    async fn insert_func_results(&self, results: &[BhaFuncResult]) -> Result<(), CoreError>;
}
