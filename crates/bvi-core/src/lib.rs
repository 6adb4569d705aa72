//! Admission-controlled, cancellable scan-job scheduler.
//!
//! The [`Scheduler`] pulls cohort messages from a [`Queue`](ports::Queue), admits them under a
//! global [`AdmissionLimiter`] and per-category [`CategoryLimiters`], and runs every Task of the
//! cohort through the [`Handler`] registered for its type. In-flight jobs can be cancelled through
//! the [`TerminationChannel`](ports::TerminationChannel) and the concurrency limit retuned at
//! runtime through the config queue.

pub mod error;
pub use error::CoreError;

pub mod limiter;
pub use limiter::{AdmissionLimiter, CategoryLimiters};

pub mod cancel;
pub use cancel::{CancelCause, CancelKey, CancelRegistry, CancelToken, JobContext};

pub mod handler;
pub use handler::{Handler, HandlerError, HandlerRegistry};

pub mod events;
pub use events::{Event, EventKind, Subscribe};

pub mod settings;
pub use settings::{SchedulerConfig, SettingsHandle, TaskSettings};

pub mod ports;
pub mod memory;

mod scheduler;
pub use scheduler::{Scheduler, SchedulerBuilder};

mod terminator;
pub use terminator::{Terminated, Terminator};
