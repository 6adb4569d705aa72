use std::borrow::Borrow;

use bvi_core::{Event, EventKind};
use tracing::{debug, error, info, trace, warn};

pub trait View {
    fn as_task(&self) -> &str;
    fn as_type(&self) -> &str;
    fn as_reason(&self) -> &str;
    fn capacity(&self) -> usize;
    fn running(&self) -> usize;
    fn elapsed_ms(&self) -> u128;
    fn kind(&self) -> EventKind;
}

impl<T> View for T
where
    T: Borrow<Event>,
{
    #[inline]
    fn as_task(&self) -> &str {
        self.borrow().task_id.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn as_type(&self) -> &str {
        self.borrow().task_type.map(|t| t.as_str()).unwrap_or("unknown")
    }
    #[inline]
    fn as_reason(&self) -> &str {
        self.borrow().reason.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn capacity(&self) -> usize {
        self.borrow().capacity.unwrap_or(0)
    }
    #[inline]
    fn running(&self) -> usize {
        self.borrow().running.unwrap_or(0)
    }
    #[inline]
    fn elapsed_ms(&self) -> u128 {
        self.borrow().elapsed.map(|d| d.as_millis()).unwrap_or(0)
    }
    #[inline]
    fn kind(&self) -> EventKind {
        self.borrow().kind
    }
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // admission
        EventKind::MessageSkipped => "message skipped (no queued tasks)",
        EventKind::AdmissionRejected => "admission rejected, message left for redelivery",
        EventKind::CohortAdmitted => "cohort admitted",
        EventKind::CohortCompleted => "cohort completed, slots released",

        // job lifecycle
        EventKind::JobStarting => "job is starting",
        EventKind::JobFinished => "job finished",
        EventKind::JobFailed => "job failed",
        EventKind::JobTerminated => "job cancelled before completion",
        EventKind::JobAborted => "job aborted before start",

        // control
        EventKind::CapacityTuned => "admission capacity tuned",
        EventKind::TerminationRequested => "termination requested",

        // reaper
        EventKind::TaskTimedOut => "queued task timed out",
        EventKind::ModelPurged => "deleted model purged",

        // shutdown
        EventKind::ShutdownRequested => "shutdown requested",
        EventKind::ShutdownCompleted => "shutdown completed",
    }
}

#[inline]
pub fn log_event<E: View>(e: E) {
    let msg = message_for(e.kind());

    match e.kind() {
        // admission
        EventKind::MessageSkipped => debug!(task_id = e.as_task(), "{msg}"),
        EventKind::AdmissionRejected => {
            trace!(task_id = e.as_task(), reason = e.as_reason(), "{msg}")
        }
        EventKind::CohortAdmitted => debug!(
            task_id = e.as_task(),
            capacity = e.capacity(),
            running = e.running(),
            "{msg}"
        ),
        EventKind::CohortCompleted => debug!(
            task_id = e.as_task(),
            elapsed_ms = e.elapsed_ms(),
            "{msg}"
        ),

        // job lifecycle
        EventKind::JobStarting => info!(task_id = e.as_task(), task_type = e.as_type(), "{msg}"),
        EventKind::JobFinished => info!(
            task_id = e.as_task(),
            task_type = e.as_type(),
            elapsed_ms = e.elapsed_ms(),
            "{msg}"
        ),
        EventKind::JobFailed => error!(
            task_id = e.as_task(),
            task_type = e.as_type(),
            reason = e.as_reason(),
            elapsed_ms = e.elapsed_ms(),
            "{msg}"
        ),
        EventKind::JobTerminated => info!(
            task_id = e.as_task(),
            task_type = e.as_type(),
            reason = e.as_reason(),
            "{msg}"
        ),
        EventKind::JobAborted => debug!(
            task_id = e.as_task(),
            task_type = e.as_type(),
            reason = e.as_reason(),
            "{msg}"
        ),

        // control
        EventKind::CapacityTuned => info!(
            capacity = e.capacity(),
            running = e.running(),
            "{msg}"
        ),
        EventKind::TerminationRequested => info!(task_id = e.as_task(), "{msg}"),

        // reaper
        EventKind::TaskTimedOut => {
            warn!(task_id = e.as_task(), task_type = e.as_type(), "{msg}")
        }
        EventKind::ModelPurged => info!(model_id = e.as_reason(), "{msg}"),

        // shutdown
        EventKind::ShutdownRequested => info!("{msg}"),
        EventKind::ShutdownCompleted => info!("{msg}"),
    }
}
