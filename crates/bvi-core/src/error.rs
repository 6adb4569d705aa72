use bvi_model::{ModelError, TaskType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("queue error: {0}")]
    Queue(String),
    #[error("document store error: {0}")]
    Store(String),
    #[error("blob store error: {0}")]
    Blob(String),
    #[error("termination channel error: {0}")]
    Channel(String),
    #[error("handler already registered for task type {0}")]
    DuplicateHandler(TaskType),
    #[error("no handlers registered")]
    NoHandlers,
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("task {0} has no queued or running members")]
    NotTerminable(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}
