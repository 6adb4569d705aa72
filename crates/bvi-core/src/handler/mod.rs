//! Per-type scan handlers and the registry the scheduler dispatches through.

mod registry;
pub use registry::HandlerRegistry;

use async_trait::async_trait;
use bvi_model::{Task, TaskType, err_code};
use thiserror::Error;

use crate::cancel::JobContext;

/// Failure of one handler phase.
///
/// Every variant is terminal for the Task; nothing is retried.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The input or its dependencies were rejected; `message` is shown to the user.
    #[error("{message}")]
    Business { message: String, debug: String },
    #[error("scan timed out")]
    Timeout,
    #[error("scan terminated")]
    Terminated,
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn business(message: impl Into<String>) -> Self {
        let message = message.into();
        HandlerError::Business {
            debug: message.clone(),
            message,
        }
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        HandlerError::Internal(e.to_string())
    }

    /// The text persisted in `err_msg`.
    pub fn user_message(&self) -> &str {
        match self {
            HandlerError::Business { message, .. } => message,
            HandlerError::Timeout => err_code::MSG_TIMEOUT,
            HandlerError::Terminated => err_code::MSG_TERMINATED,
            HandlerError::Internal(_) => err_code::MSG_INTERNAL,
        }
    }

    /// The text persisted in `debug_msg`.
    pub fn debug_message(&self) -> String {
        match self {
            HandlerError::Business { debug, .. } => debug.clone(),
            other => other.to_string(),
        }
    }

    /// Record this failure on `task`.
    pub fn apply(&self, task: &mut Task) {
        task.fail(err_code::INTERNAL, self.user_message(), self.debug_message());
    }
}

/// A scan type's two-phase capability.
///
/// `start_job` runs the scan and may take as long as the type's timeout; `process_result` turns
/// the backend output into persisted records. Both should observe `ctx` cancellation.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    fn task_type(&self) -> TaskType;

    async fn start_job(&self, ctx: &JobContext, task: &mut Task) -> Result<(), HandlerError>;

    async fn process_result(&self, ctx: &JobContext, task: &mut Task) -> Result<(), HandlerError>;
}
