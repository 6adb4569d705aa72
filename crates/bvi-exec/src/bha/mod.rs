//! Binary homology analysis.

mod client;
pub use client::{BhaClient, ScanRequest};

mod config;
pub use config::BhaConfig;

mod executor;
pub use executor::{
    ASM_FILE, Executor, ExecutorBuilder, LOG_FILE, RESULT_FILE, ScanOutcome, ScanStatus,
};

mod result;

use std::sync::Arc;

use async_trait::async_trait;
use bvi_core::{
    Handler, HandlerError, JobContext, SettingsHandle,
    ports::{BlobStore, DocumentStore},
};
use bvi_model::{BhaParams, DetectionMethod, ScanFile, Task, TaskType};
use tracing::{debug, info, instrument};

use crate::error::ExecResult;

/// Blob directory holding a Task's scan outputs.
pub fn output_dir(task_id: &str) -> String {
    format!("tasks/{task_id}/bha")
}

/// [`Handler`] for [`TaskType::Bha`] Tasks.
pub struct BhaHandler {
    client: BhaClient,
    config: BhaConfig,
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    settings: SettingsHandle,
}

impl BhaHandler {
    pub fn new(
        config: BhaConfig,
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        settings: SettingsHandle,
    ) -> ExecResult<Self> {
        Ok(Self {
            client: BhaClient::new(&config)?,
            config,
            store,
            blobs,
            settings,
        })
    }

    /// Model path and integrity hash for the intelligent detection family.
    async fn resolve_model(&self, params: &BhaParams) -> Result<(String, String), HandlerError> {
        let id = params.model_id.as_deref().unwrap_or_default();
        let model = self
            .store
            .find_model(id)
            .await
            .map_err(HandlerError::internal)?
            .ok_or_else(|| HandlerError::business(format!("model ({id}) not found")))?;

        let info = self
            .blobs
            .stat(&model.path)
            .await
            .map_err(|e| HandlerError::internal(format!("get model file stat info err: {e}")))?
            .ok_or_else(|| HandlerError::internal(format!("model file {} not found", model.path)))?;

        Ok((model.path, info.etag))
    }

    fn executor(
        &self,
        task: &Task,
        params: &BhaParams,
        model: Option<(String, String)>,
    ) -> ExecResult<Executor> {
        let mut builder = Executor::builder(self.client.clone(), Arc::clone(&self.blobs))
            .algorithm(params.algorithm)
            .bucket(self.config.bucket.as_str())
            .input_path(task.file_path.as_str())
            .output_dir(output_dir(&task.task_id))
            .minimum_sim(0.0)
            .timeout(self.settings.timeout_for(TaskType::Bha))
            .poll_interval(self.config.poll_interval());
        if let Some((path, md5)) = model {
            builder = builder.model(path, md5);
        }
        builder.build()
    }
}

#[async_trait]
impl Handler for BhaHandler {
    fn name(&self) -> &'static str {
        "bha"
    }

    fn task_type(&self) -> TaskType {
        TaskType::Bha
    }

    #[instrument(level = "debug", skip_all, fields(task_id = %task.task_id))]
    async fn start_job(&self, ctx: &JobContext, task: &mut Task) -> Result<(), HandlerError> {
        let params = task
            .bha_params()
            .cloned()
            .ok_or_else(|| HandlerError::internal("bha params is nil"))?;

        let model = if params.detection_method == DetectionMethod::Intelligent
            || params.algorithm.requires_model()
        {
            Some(self.resolve_model(&params).await?)
        } else {
            None
        };

        let executor = self.executor(task, &params, model)?;
        let outcome = executor.run(ctx).await?;
        if !outcome.is_successful() {
            let message = if outcome.message.is_empty() {
                format!("bha scan {}", outcome.status)
            } else {
                outcome.message.clone()
            };
            return Err(HandlerError::Business {
                debug: format!(
                    "scan {} ended with status {}: {}",
                    outcome.scan_id, outcome.status, outcome.message
                ),
                message,
            });
        }

        task.result = output_dir(&task.task_id);
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(task_id = %task.task_id))]
    async fn process_result(&self, ctx: &JobContext, task: &mut Task) -> Result<(), HandlerError> {
        if ctx.is_cancelled() {
            return Err(HandlerError::Terminated);
        }
        let path = format!("{}/{}", output_dir(&task.task_id), RESULT_FILE);
        let raw = self
            .blobs
            .get(&path)
            .await
            .map_err(HandlerError::internal)?
            .ok_or_else(|| HandlerError::internal(format!("bha result {path} not found")))?;

        let files: Vec<ScanFile> = serde_json::from_slice(&raw)
            .map_err(|e| HandlerError::internal(format!("failed to decode bha result: {e}")))?;
        debug!(files = files.len(), "bha result decoded");

        let stored = result::save_results(self.store.as_ref(), &task.task_id, &files)
            .await
            .map_err(HandlerError::internal)?;
        info!(task_id = %task.task_id, functions = stored, "bha result stored");
        Ok(())
    }
}
