use std::{sync::Arc, time::Instant};

use bvi_model::{Task, TaskFilter, TaskPatch, TaskStatus, err_code};
use tracing::{error, info, warn};

use super::{Inner, panic_message, trace};
use crate::{
    cancel::{CancelCause, CancelKey, CancelToken, JobContext},
    events::{Event, EventKind},
    handler::{Handler, HandlerError},
};

/// Signals the job's token on every exit path.
struct DoneGuard(Arc<CancelToken>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.signal_done();
    }
}

impl Inner {
    /// Run one Task: claim it, dispatch both handler phases and persist the outcome.
    ///
    /// `queuing -> processing -> {finished | failed}`; a cancelled job leaves the final write to
    /// whoever cancelled it.
    pub(super) async fn handle(&self, parent: &JobContext, mut task: Task) {
        let task_type = task.task_type();
        let task_id = task.task_id.clone();
        let key = CancelKey::job(task_id.as_str(), task_type);

        let (ctx, token) = CancelToken::new(parent);
        let _done = DoneGuard(Arc::clone(&token));
        if !self.registry.try_register(key.clone(), Arc::clone(&token)) {
            warn!(%task_id, %task_type, "task is already running, skip");
            self.emit(
                Event::new(EventKind::JobAborted)
                    .with_task(task_id.as_str(), task_type)
                    .with_reason("already running"),
            );
            return;
        }
        let started = Instant::now();
        info!(%task_id, %task_type, "begin scanning task");

        if self.registry.is_tombstoned(&task_id) || ctx.cause() == Some(CancelCause::Terminate) {
            info!(%task_id, %task_type, "termination already requested, skip");
            self.abort(&key, &token, &task, "terminated before start");
            return;
        }

        let claim = TaskFilter::key(task_id.as_str(), task_type).with_status(TaskStatus::Queuing);
        match self
            .store
            .update_where(&claim, &TaskPatch::status(TaskStatus::Processing))
            .await
        {
            Ok(0) => {
                warn!(%task_id, %task_type, "task already claimed, skip");
                self.abort(&key, &token, &task, "already claimed");
                return;
            }
            Ok(_) => task.status = TaskStatus::Processing,
            Err(e) => {
                error!(%task_id, %task_type, error = %e, "failed to claim task");
                self.abort(&key, &token, &task, e.to_string());
                return;
            }
        }
        self.emit(Event::new(EventKind::JobStarting).with_task(task_id.as_str(), task_type));

        match self.handlers.get(task_type) {
            Some(handler) => {
                task = self.run_phases(Arc::clone(handler), &ctx, task).await;
            }
            None => {
                error!(%task_id, %task_type, "no handler registered for task type");
                task.fail(
                    err_code::INTERNAL,
                    err_code::MSG_INTERNAL,
                    format!("no handler for {task_type}"),
                );
            }
        }

        let elapsed = started.elapsed();
        if let Some(cause) = ctx.cause() {
            info!(%task_id, %task_type, %cause, "job cancelled, final state left to the canceller");
            self.emit(
                Event::new(EventKind::JobTerminated)
                    .with_task(task_id.as_str(), task_type)
                    .with_reason(cause.to_string())
                    .with_elapsed(elapsed),
            );
        } else {
            task.touch();
            if let Err(e) = self.store.replace_task(&task).await {
                error!(%task_id, %task_type, error = %e, "failed to persist task");
            }
            let event = match task.status {
                TaskStatus::Finished => Event::new(EventKind::JobFinished),
                _ => Event::new(EventKind::JobFailed).with_reason(task.debug_msg.clone()),
            };
            self.emit(
                event
                    .with_task(task_id.as_str(), task_type)
                    .with_elapsed(elapsed),
            );
        }

        self.registry.remove_if_same(&key, &token);
        info!(%task_id, %task_type, status = %task.status, ?elapsed, "finish scanning task");
    }

    /// Both handler phases on a separate task; a panic becomes a failed Task.
    async fn run_phases(&self, handler: Arc<dyn Handler>, ctx: &JobContext, task: Task) -> Task {
        let fallback = task.clone();
        let ctx = ctx.clone();

        let (slot, phases) = trace::traced(async move {
            let mut task = task;
            let outcome = match handler.start_job(&ctx, &mut task).await {
                Ok(()) => handler.process_result(&ctx, &mut task).await,
                Err(e) => Err(e),
            };
            (task, outcome)
        });
        let joined = self.tracker.spawn(phases).await;

        match joined {
            Ok((mut task, Ok(()))) => {
                task.status = TaskStatus::Finished;
                task
            }
            Ok((mut task, Err(e))) => {
                if !matches!(e, HandlerError::Terminated) {
                    warn!(task_id = %task.task_id, error = %e, "scan failed");
                }
                e.apply(&mut task);
                task
            }
            Err(e) => {
                let mut task = fallback;
                let detail = if e.is_panic() {
                    trace::panic_detail(panic_message(e.into_panic()), &slot)
                } else {
                    e.to_string()
                };
                error!(task_id = %task.task_id, panic = %detail, "task handle panicked");
                task.fail(err_code::INTERNAL, err_code::MSG_INTERNAL, detail);
                task
            }
        }
    }

    fn abort(
        &self,
        key: &CancelKey,
        token: &Arc<CancelToken>,
        task: &Task,
        reason: impl Into<String>,
    ) {
        self.registry.remove_if_same(key, token);
        self.emit(
            Event::new(EventKind::JobAborted)
                .with_task(task.task_id.as_str(), task.task_type())
                .with_reason(reason),
        );
    }
}
