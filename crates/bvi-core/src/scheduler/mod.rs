//! The scan scheduler and its four loops.
//!
//! - `consumer`: pulls cohort messages, admits them and spawns one job per member.
//! - `config`: applies config updates to the global limiter and the task settings.
//! - `terminate`: answers termination requests by cancelling in-flight jobs.
//! - `reaper`: fails stale queued Tasks, purges unreferenced deleted models and old tombstones.

mod builder;
pub use builder::SchedulerBuilder;

mod config;
mod consumer;
mod job;
mod reaper;
mod terminate;
mod trace;

use std::{
    any::Any,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use bvi_model::{ConfigUpdate, CreatedTask, TaskFilter, TaskPatch, TaskStatus, err_code};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info, instrument, warn};

use crate::{
    cancel::{CancelRegistry, JobContext},
    error::CoreError,
    events::{Event, EventKind, Subscribers},
    handler::HandlerRegistry,
    limiter::{AdmissionLimiter, CategoryLimiters},
    ports::{BlobStore, DocumentStore, Queue, TerminationChannel},
    settings::{SchedulerConfig, SettingsHandle},
};

/// Hook run on an admitted cohort before its jobs are spawned; an error drops the cohort.
pub type PreHandle = Arc<dyn Fn(&[bvi_model::Task]) -> Result<(), CoreError> + Send + Sync>;

pub(crate) struct Inner {
    config: SchedulerConfig,
    tasks: Arc<dyn Queue<CreatedTask>>,
    configs: Arc<dyn Queue<ConfigUpdate>>,
    terminations: Arc<dyn TerminationChannel>,
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    handlers: HandlerRegistry,
    pre_handle: Option<PreHandle>,
    pool: AdmissionLimiter,
    categories: CategoryLimiters,
    registry: CancelRegistry,
    settings: SettingsHandle,
    events: Subscribers,
    shutdown: CancellationToken,
    root: JobContext,
    tracker: TaskTracker,
    started: AtomicBool,
}

impl Inner {
    #[inline]
    fn emit(&self, event: Event) {
        self.events.emit(event);
    }

    /// Sleep for `pause` unless shutdown comes first; returns `false` on shutdown.
    async fn pause(&self, pause: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(pause) => true,
        }
    }

    /// Run `fut` on its own tracked task so a panic inside it is contained and logged.
    async fn contained<F>(&self, what: &'static str, fut: F) -> Option<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match self.tracker.spawn(fut).await {
            Ok(out) => Some(out),
            Err(e) if e.is_panic() => {
                error!(loop_name = what, panic = %panic_message(e.into_panic()), "iteration panicked");
                None
            }
            Err(e) => {
                warn!(loop_name = what, error = %e, "iteration was cancelled");
                None
            }
        }
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Handle to a running (or ready to run) scheduler. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn builder(config: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(config)
    }

    /// Initialise the queues, apply the latest persisted config and spawn the loops.
    ///
    /// Calling `start` on a started scheduler is a no-op.
    #[instrument(level = "info", skip(self), fields(name = %self.inner.config.name))]
    pub async fn start(&self) -> Result<(), CoreError> {
        let inner = &self.inner;
        if inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        trace::install_hook();
        inner.tasks.init().await?;
        inner.configs.init().await?;

        match inner.store.latest_config().await {
            Ok(Some(config)) => inner.apply_config(&config),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to load persisted config, keeping defaults"),
        }

        let calls = inner.terminations.subscribe().await?;

        inner.tracker.spawn(Arc::clone(inner).run_consumer());
        inner.tracker.spawn(Arc::clone(inner).run_config_consumer());
        inner.tracker.spawn(Arc::clone(inner).run_terminations(calls));
        inner.tracker.spawn(Arc::clone(inner).run_reaper());

        info!(capacity = inner.pool.capacity(), "scheduler started");
        Ok(())
    }

    /// Stop taking work, wait for every loop and job, then force-fail Tasks left `processing`.
    #[instrument(level = "info", skip(self), fields(name = %self.inner.config.name))]
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.emit(Event::new(EventKind::ShutdownRequested));

        inner.shutdown.cancel();
        inner.tracker.close();
        inner.tracker.wait().await;

        if let Err(e) = inner.tasks.delete_consumer().await {
            error!(error = %e, "failed to delete tasks consumer");
        }
        if let Err(e) = inner.configs.delete_consumer().await {
            error!(error = %e, "failed to delete config consumer");
        }
        if let Err(e) = inner.terminations.unsubscribe().await {
            error!(error = %e, "failed to unsubscribe from termination requests");
        }

        let processing = TaskFilter::new().with_status(TaskStatus::Processing);
        let interrupted = TaskPatch::failed(err_code::INTERNAL, err_code::MSG_INTERRUPTED);
        match inner.store.update_where(&processing, &interrupted).await {
            Ok(0) => {}
            Ok(n) => warn!(tasks = n, "processing tasks failed by shutdown"),
            Err(e) => error!(error = %e, "failed to fail processing tasks"),
        }

        inner.emit(Event::new(EventKind::ShutdownCompleted));
        info!("scheduler stopped");
    }

    pub fn pool(&self) -> &AdmissionLimiter {
        &self.inner.pool
    }

    pub fn categories(&self) -> &CategoryLimiters {
        &self.inner.categories
    }

    pub fn registry(&self) -> &CancelRegistry {
        &self.inner.registry
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.inner.settings
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}
