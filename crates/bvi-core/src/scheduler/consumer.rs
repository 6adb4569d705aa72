use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use bvi_model::{Task, TaskFilter, TaskId, TaskStatus};
use tracing::{debug, error, info, trace};

use super::Inner;
use crate::{
    cancel::{CancelKey, CancelToken},
    events::{Event, EventKind},
};

/// One admitted cohort: a single global unit (plus a category unit) shared by all members.
pub(super) struct Cohort {
    task_id: TaskId,
    category: Option<String>,
    remaining: AtomicUsize,
    token: Arc<CancelToken>,
    admitted_at: Instant,
}

/// Finishes one member when dropped, so a panicking job still gives its slot back.
struct Member {
    inner: Arc<Inner>,
    cohort: Arc<Cohort>,
}

impl Drop for Member {
    fn drop(&mut self) {
        self.inner.finish_member(&self.cohort);
    }
}

/// Slots reserved for a delivery that has no cohort yet.
///
/// Dropping it (early return or a panicking pre-handle hook) gives the slots back.
struct Reservation<'a> {
    inner: &'a Inner,
    category: Option<String>,
    held: bool,
}

impl Reservation<'_> {
    /// Pass ownership of the slots to the cohort; returns the reserved category.
    fn hand_over(mut self) -> Option<String> {
        self.held = false;
        self.category.take()
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.held {
            self.inner.release_slots(self.category.as_deref());
        }
    }
}

impl Inner {
    pub(super) async fn run_consumer(self: Arc<Self>) {
        let heartbeat = self.config.heartbeat();
        let mut last_beat = Instant::now();

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            if last_beat.elapsed() >= heartbeat {
                let (capacity, running) = self.pool.snapshot();
                debug!(capacity, running, "tasks consumer has been running");
                last_beat = Instant::now();
            }

            let step = self
                .contained("tasks consumer", Arc::clone(&self).consume_once())
                .await
                .unwrap_or_else(|| Some(self.config.backpressure()));

            if let Some(pause) = step
                && !self.pause(pause).await
            {
                break;
            }
        }
        debug!("tasks consumer stopped");
    }

    /// One fetch-admit-dispatch round; returns how long to pause before the next one.
    async fn consume_once(self: Arc<Self>) -> Option<Duration> {
        if !self.pool.available() {
            return Some(self.config.backpressure());
        }

        let delivery = match self.tasks.fetch_one().await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => return Some(self.config.idle_fetch()),
            Err(e) => {
                error!(error = %e, "tasks consumer fetch failed");
                return Some(self.config.idle_fetch());
            }
        };
        let msg = &delivery.message;
        let task_id = msg.task_id.clone();

        let queued = TaskFilter::new()
            .with_task_id(task_id.as_str())
            .with_status(TaskStatus::Queuing);
        let tasks = match self.store.find_tasks(&queued).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(%task_id, error = %e, "failed to query queued tasks");
                return Some(self.config.idle_fetch());
            }
        };
        if tasks.is_empty() {
            info!(%task_id, "task is not queuing, skip");
            if let Err(e) = delivery.ack().await {
                error!(%task_id, error = %e, "failed to acknowledge skipped message");
            }
            self.emit(Event::new(EventKind::MessageSkipped).with_task_id(task_id));
            return None;
        }

        if !self.pool.reserve(1) {
            self.reject(&task_id, "capacity");
            return Some(self.config.backpressure());
        }
        let mut reservation = Reservation {
            inner: &self,
            category: None,
            held: true,
        };
        if let Some(key) = msg.category() {
            if !self.categories.reserve(key) {
                drop(reservation);
                self.reject(&task_id, "category");
                return Some(self.config.backpressure());
            }
            reservation.category = Some(key.to_string());
        }

        if let Err(e) = delivery.ack().await {
            error!(%task_id, error = %e, "failed to acknowledge message");
            return Some(self.config.idle_fetch());
        }

        if let Some(hook) = &self.pre_handle
            && let Err(e) = hook(&tasks)
        {
            error!(%task_id, error = %e, "pre-handle hook failed, cohort dropped");
            return None;
        }

        let category = reservation.hand_over();
        self.admit(task_id, category, tasks);
        None
    }

    fn reject(&self, task_id: &str, reason: &'static str) {
        trace!(%task_id, reason, "admission rejected, message left unacknowledged");
        let (capacity, running) = self.pool.snapshot();
        self.emit(
            Event::new(EventKind::AdmissionRejected)
                .with_task_id(task_id)
                .with_reason(reason)
                .with_slots(capacity, running),
        );
    }

    fn release_slots(&self, category: Option<&str>) {
        self.pool.release();
        if let Some(key) = category {
            self.categories.release(key);
        }
    }

    /// Register the cohort token and spawn one job per member.
    fn admit(self: &Arc<Self>, task_id: TaskId, category: Option<String>, tasks: Vec<Task>) {
        let (cohort_ctx, token) = CancelToken::new(&self.root);
        if !self
            .registry
            .try_register(CancelKey::cohort(task_id.as_str()), Arc::clone(&token))
        {
            debug!(%task_id, "cohort already in flight, members will be deduplicated");
        }

        let cohort = Arc::new(Cohort {
            task_id: task_id.clone(),
            category,
            remaining: AtomicUsize::new(tasks.len()),
            token,
            admitted_at: Instant::now(),
        });

        let (capacity, running) = self.pool.snapshot();
        debug!(%task_id, members = tasks.len(), capacity, running, "cohort admitted");
        self.emit(
            Event::new(EventKind::CohortAdmitted)
                .with_task_id(task_id)
                .with_slots(capacity, running),
        );

        for task in tasks {
            let member = Member {
                inner: Arc::clone(self),
                cohort: Arc::clone(&cohort),
            };
            let ctx = cohort_ctx.clone();
            self.tracker.spawn(async move {
                member.inner.handle(&ctx, task).await;
                drop(member);
            });
        }
    }

    /// Called once per member; the last one releases the cohort's slots.
    fn finish_member(&self, cohort: &Cohort) {
        if cohort.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        self.release_slots(cohort.category.as_deref());
        self.registry
            .remove_if_same(&CancelKey::cohort(cohort.task_id.as_str()), &cohort.token);
        cohort.token.signal_done();

        let (capacity, running) = self.pool.snapshot();
        debug!(task_id = %cohort.task_id, capacity, running, "cohort completed");
        self.emit(
            Event::new(EventKind::CohortCompleted)
                .with_task_id(cohort.task_id.as_str())
                .with_slots(capacity, running)
                .with_elapsed(cohort.admitted_at.elapsed()),
        );
    }
}
