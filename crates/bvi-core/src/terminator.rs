use std::sync::Arc;

use bvi_model::{TaskFilter, TaskPatch, TaskStatus, TerminateRequest};
use tracing::{info, instrument};

use crate::{
    error::CoreError,
    ports::{DocumentStore, TerminationChannel},
};

/// Outcome of [`Terminator::terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminated {
    /// Whether a scheduler had the cohort in flight and cancelled it.
    pub in_flight: bool,
    /// Task documents moved to `terminated`.
    pub updated: u64,
}

/// Caller-side termination: ask the scheduler to cancel, then write the terminal state.
///
/// The store update is conditional on the Task still being queued or running, so a member that
/// finished before the request keeps its own outcome.
#[derive(Clone)]
pub struct Terminator {
    store: Arc<dyn DocumentStore>,
    channel: Arc<dyn TerminationChannel>,
}

impl Terminator {
    pub fn new(store: Arc<dyn DocumentStore>, channel: Arc<dyn TerminationChannel>) -> Self {
        Self { store, channel }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn terminate(&self, task_id: &str) -> Result<Terminated, CoreError> {
        let active = TaskFilter::new()
            .with_task_id(task_id)
            .with_statuses(TaskStatus::ACTIVE);
        if self.store.find_tasks(&active).await?.is_empty() {
            return Err(CoreError::NotTerminable(task_id.to_string()));
        }

        let in_flight = self
            .channel
            .request(&TerminateRequest {
                task_id: task_id.to_string(),
            })
            .await?;
        let updated = self
            .store
            .update_where(&active, &TaskPatch::terminated())
            .await?;

        info!(in_flight, updated, "task terminated");
        Ok(Terminated { in_flight, updated })
    }
}
