use std::{collections::HashMap, sync::Arc};

use bvi_model::TaskType;
use tracing::{debug, instrument};

use super::Handler;
use crate::error::CoreError;

/// Closed dispatch table from task type to handler.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for its type; a second handler for the same type is rejected.
    #[instrument(level = "debug", skip_all, fields(handler = handler.name(), task_type = %handler.task_type()))]
    pub fn register(&mut self, handler: Arc<dyn Handler>) -> Result<(), CoreError> {
        let task_type = handler.task_type();
        if self.handlers.contains_key(&task_type) {
            return Err(CoreError::DuplicateHandler(task_type));
        }
        self.handlers.insert(task_type, handler);
        debug!("handler registered");
        Ok(())
    }

    pub fn get(&self, task_type: TaskType) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(&task_type)
    }

    pub fn types(&self) -> impl Iterator<Item = TaskType> + '_ {
        self.handlers.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}
