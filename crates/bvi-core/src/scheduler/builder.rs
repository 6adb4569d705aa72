use std::sync::{Arc, atomic::AtomicBool};

use bvi_model::{ConfigUpdate, CreatedTask, Task};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Inner, PreHandle, Scheduler};
use crate::{
    cancel::{CancelRegistry, JobContext},
    error::CoreError,
    events::{Subscribe, Subscribers},
    handler::{Handler, HandlerRegistry},
    limiter::{AdmissionLimiter, CategoryLimiters},
    ports::{BlobStore, DocumentStore, Queue, TerminationChannel},
    settings::{SchedulerConfig, SettingsHandle, TaskSettings},
};

/// Collects collaborators and handlers; [`build`](Self::build) validates them.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    tasks: Option<Arc<dyn Queue<CreatedTask>>>,
    configs: Option<Arc<dyn Queue<ConfigUpdate>>>,
    terminations: Option<Arc<dyn TerminationChannel>>,
    store: Option<Arc<dyn DocumentStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    handlers: Vec<Arc<dyn Handler>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    settings: Option<SettingsHandle>,
    pre_handle: Option<PreHandle>,
}

impl SchedulerBuilder {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            tasks: None,
            configs: None,
            terminations: None,
            store: None,
            blobs: None,
            handlers: Vec::new(),
            subscribers: Vec::new(),
            settings: None,
            pre_handle: None,
        }
    }

    pub fn with_task_queue(mut self, queue: Arc<dyn Queue<CreatedTask>>) -> Self {
        self.tasks = Some(queue);
        self
    }

    pub fn with_config_queue(mut self, queue: Arc<dyn Queue<ConfigUpdate>>) -> Self {
        self.configs = Some(queue);
        self
    }

    pub fn with_terminations(mut self, channel: Arc<dyn TerminationChannel>) -> Self {
        self.terminations = Some(channel);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Share settings with handlers that read timeouts at job start.
    ///
    /// The handle is reset to the values of the scheduler config.
    pub fn with_settings(mut self, settings: SettingsHandle) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_pre_handle<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[Task]) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.pre_handle = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Scheduler, CoreError> {
        self.config.validate()?;

        let mut handlers = HandlerRegistry::new();
        for handler in self.handlers {
            handlers.register(handler)?;
        }
        if handlers.is_empty() {
            return Err(CoreError::NoHandlers);
        }

        let initial = TaskSettings::from_config(&self.config);
        let settings = match self.settings {
            Some(handle) => {
                handle.reset(initial);
                handle
            }
            None => SettingsHandle::new(initial),
        };

        let shutdown = CancellationToken::new();
        let inner = Inner {
            tasks: self.tasks.ok_or(CoreError::MissingCollaborator("task queue"))?,
            configs: self.configs.ok_or(CoreError::MissingCollaborator("config queue"))?,
            terminations: self
                .terminations
                .ok_or(CoreError::MissingCollaborator("termination channel"))?,
            store: self.store.ok_or(CoreError::MissingCollaborator("document store"))?,
            blobs: self.blobs.ok_or(CoreError::MissingCollaborator("blob store"))?,
            handlers,
            pre_handle: self.pre_handle,
            pool: AdmissionLimiter::new(initial.concurrency),
            categories: CategoryLimiters::from_limits(&self.config.category_limits),
            registry: CancelRegistry::new(),
            settings,
            events: Subscribers::new(self.subscribers),
            root: JobContext::root(shutdown.clone()),
            shutdown,
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
            config: self.config,
        };

        Ok(Scheduler {
            inner: Arc::new(inner),
        })
    }
}
