use serde::{Deserialize, Serialize};

use crate::TaskConfig;

/// Config-queue message carrying a new task configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub task: TaskConfig,
}
