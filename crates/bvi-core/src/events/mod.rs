//! Scheduler lifecycle events and their subscribers.

mod bus;
pub use bus::{Subscribe, Subscribers};

use std::time::{Duration, SystemTime};

use bvi_model::{TaskId, TaskType};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // admission
    /// A delivery had no queued Tasks and was acknowledged without work.
    MessageSkipped,
    /// A delivery was left unacknowledged because a limiter was full.
    AdmissionRejected,
    CohortAdmitted,
    CohortCompleted,

    // job lifecycle
    /// The Task was claimed and is about to run.
    JobStarting,
    JobFinished,
    JobFailed,
    /// The job observed cancellation; the canceller persists the final state.
    JobTerminated,
    /// The job never started: claim lost, termination pending or store failure.
    JobAborted,

    // control
    CapacityTuned,
    TerminationRequested,

    // reaper
    TaskTimedOut,
    ModelPurged,

    // shutdown
    ShutdownRequested,
    ShutdownCompleted,
}

/// A scheduler event; optional fields are filled where meaningful for the kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub at: SystemTime,
    pub task_id: Option<TaskId>,
    pub task_type: Option<TaskType>,
    pub reason: Option<String>,
    pub capacity: Option<usize>,
    pub running: Option<usize>,
    pub elapsed: Option<Duration>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            at: SystemTime::now(),
            task_id: None,
            task_type: None,
            reason: None,
            capacity: None,
            running: None,
            elapsed: None,
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<TaskId>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_task(mut self, task_id: impl Into<TaskId>, task_type: TaskType) -> Self {
        self.task_id = Some(task_id.into());
        self.task_type = Some(task_type);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_slots(mut self, capacity: usize, running: usize) -> Self {
        self.capacity = Some(capacity);
        self.running = Some(running);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }
}
