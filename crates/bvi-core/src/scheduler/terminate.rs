use std::sync::Arc;

use bvi_model::TaskType;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Inner;
use crate::{
    cancel::{CancelCause, CancelKey},
    events::{Event, EventKind},
    ports::TerminationCall,
};

impl Inner {
    pub(super) async fn run_terminations(self: Arc<Self>, mut calls: mpsc::Receiver<TerminationCall>) {
        loop {
            let call = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                call = calls.recv() => match call {
                    Some(call) => call,
                    None => break,
                },
            };

            let inner = Arc::clone(&self);
            self.tracker.spawn(async move { inner.answer(call).await });
        }
        debug!("termination listener stopped");
    }

    async fn answer(&self, call: TerminationCall) {
        let request = match call.request() {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "undecodable termination request");
                call.respond(false);
                return;
            }
        };

        let terminated = self.terminate_in_flight(&request.task_id).await;
        info!(task_id = %request.task_id, terminated, "termination request answered");
        call.respond(terminated);
    }

    /// Cancel every registered job of the cohort and the cohort itself, waiting for each.
    ///
    /// The tombstone goes in first so a member registering concurrently either shows up in the
    /// registry here or sees the tombstone and never starts.
    pub(super) async fn terminate_in_flight(&self, task_id: &str) -> bool {
        self.registry.tombstone(task_id);
        self.emit(Event::new(EventKind::TerminationRequested).with_task_id(task_id));

        let mut terminated = false;
        for task_type in TaskType::ALL {
            if let Some(token) = self.registry.take(&CancelKey::job(task_id, task_type)) {
                token.cancel_and_wait(CancelCause::Terminate).await;
                debug!(%task_id, %task_type, "terminated job");
                terminated = true;
            }
        }
        if let Some(token) = self.registry.take(&CancelKey::cohort(task_id)) {
            token.cancel_and_wait(CancelCause::Terminate).await;
            debug!(%task_id, "terminated cohort");
            terminated = true;
        }
        terminated
    }
}
