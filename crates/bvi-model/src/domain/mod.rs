mod task_status;
pub use task_status::TaskStatus;

mod task_type;
pub use task_type::TaskType;

mod task;
pub use task::{Task, TaskDetail};

mod task_filter;
pub use task_filter::TaskFilter;

mod task_patch;
pub use task_patch::TaskPatch;

mod bha;
pub use bha::{
    Algorithm, BhaFunc, BhaFuncResult, BhaModel, BhaParams, DetectionMethod, ScanFile, ScanFunc,
    ScanMatch,
};

mod params;
pub use params::{SastParams, ScaParams};

mod config;
pub use config::TaskConfig;

pub mod err_code;

/// Identifier shared by every Task of one submission (the cohort).
pub type TaskId = String;

/// Source-language key used by per-category admission limits.
pub type Category = String;
