use std::{sync::Arc, time::SystemTime};

use bvi_model::{TaskFilter, TaskPatch, TaskStatus, TaskType, err_code};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, trace, warn};

use super::Inner;
use crate::events::{Event, EventKind};

impl Inner {
    pub(super) async fn run_reaper(self: Arc<Self>) {
        let mut ticker = interval(self.config.reaper_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.contained("reaper", Arc::clone(&self).reap_once()).await;
                }
            }
        }
        debug!("reaper stopped");
    }

    async fn reap_once(self: Arc<Self>) {
        self.fail_stale_queued().await;
        self.purge_deleted_models().await;

        let swept = self.registry.sweep(self.config.tombstone_ttl());
        if swept > 0 {
            trace!(swept, "expired termination tombstones removed");
        }
    }

    /// Fail Tasks that waited in the queue longer than their type's timeout.
    pub(super) async fn fail_stale_queued(&self) {
        for task_type in TaskType::ALL {
            let timeout = self.settings.timeout_for(task_type);
            let Some(cutoff) = SystemTime::now().checked_sub(timeout) else {
                continue;
            };
            let stale = TaskFilter::new()
                .with_task_type(task_type)
                .with_status(TaskStatus::Queuing)
                .with_created_before(cutoff);

            let tasks = match self.store.find_tasks(&stale).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    error!(%task_type, error = %e, "failed to query timed out tasks");
                    return;
                }
            };

            for task in tasks {
                let still_queued = TaskFilter::key(task.task_id.as_str(), task_type)
                    .with_status(TaskStatus::Queuing);
                let timed_out = TaskPatch::failed(err_code::INTERNAL, err_code::MSG_TIMEOUT);
                match self.store.update_where(&still_queued, &timed_out).await {
                    Ok(0) => {}
                    Ok(_) => {
                        warn!(task_id = %task.task_id, %task_type, ?timeout, "queued task timed out");
                        self.emit(
                            Event::new(EventKind::TaskTimedOut)
                                .with_task(task.task_id.as_str(), task_type),
                        );
                    }
                    Err(e) => {
                        error!(task_id = %task.task_id, error = %e, "failed to fail timed out task");
                        return;
                    }
                }
            }
        }
    }

    /// Hard-delete soft-deleted models that no queued or running bha Task references.
    pub(super) async fn purge_deleted_models(&self) {
        let models = match self.store.deleted_models().await {
            Ok(models) => models,
            Err(e) => {
                error!(error = %e, "failed to list deleted models");
                return;
            }
        };

        for model in models {
            let referenced = TaskFilter::new()
                .with_task_type(TaskType::Bha)
                .with_statuses(TaskStatus::ACTIVE)
                .with_model_id(model.id.as_str());
            match self.store.find_tasks(&referenced).await {
                Ok(tasks) if tasks.is_empty() => {}
                Ok(_) => continue,
                Err(e) => {
                    error!(model = %model.id, error = %e, "failed to check model references");
                    return;
                }
            }

            if let Err(e) = self.blobs.remove(&model.path).await {
                error!(model = %model.id, path = %model.path, error = %e, "failed to remove model file");
                return;
            }
            if let Err(e) = self.store.delete_model(&model.id).await {
                error!(model = %model.id, error = %e, "failed to delete model document");
                return;
            }

            info!(model = %model.id, path = %model.path, "deleted model purged");
            self.emit(Event::new(EventKind::ModelPurged).with_reason(model.id));
        }
    }
}
