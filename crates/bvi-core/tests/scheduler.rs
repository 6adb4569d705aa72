use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use bvi_core::{
    CoreError, Event, EventKind, Handler, HandlerError, JobContext, Scheduler, SchedulerBuilder,
    SchedulerConfig, Subscribe, Terminator,
    memory::{MemoryBlobStore, MemoryQueue, MemoryStore, MemoryTerminations},
    ports::{Queue, TerminationChannel},
};
use bvi_model::{
    Algorithm, BhaModel, BhaParams, ConfigUpdate, CreatedTask, DetectionMethod, ScaParams, Task,
    TaskConfig, TaskDetail, TaskStatus, TaskType, TerminateRequest, err_code,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    /// Run until released or cancelled.
    Hold,
    Timeout,
    Panic,
}

struct TestHandler {
    task_type: TaskType,
    behavior: Behavior,
    release: CancellationToken,
    runs: AtomicUsize,
    active: AtomicUsize,
}

impl TestHandler {
    fn new(task_type: TaskType, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            task_type,
            behavior,
            release: CancellationToken::new(),
            runs: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler for TestHandler {
    fn name(&self) -> &'static str {
        "test"
    }

    fn task_type(&self) -> TaskType {
        self.task_type
    }

    async fn start_job(&self, ctx: &JobContext, _task: &mut Task) -> Result<(), HandlerError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        let outcome = match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Hold => tokio::select! {
                _ = ctx.cancelled() => Err(HandlerError::Terminated),
                _ = self.release.cancelled() => Ok(()),
            },
            Behavior::Timeout => Err(HandlerError::Timeout),
            Behavior::Panic => panic!("boom"),
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn process_result(&self, _: &JobContext, task: &mut Task) -> Result<(), HandlerError> {
        task.result = format!("tasks/{}/{}", task.task_id, self.task_type);
        Ok(())
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Event>>);

impl Recorder {
    fn count(&self, kind: EventKind) -> usize {
        self.0.lock().iter().filter(|e| e.kind == kind).count()
    }
}

impl Subscribe for Recorder {
    fn on_event(&self, event: &Event) {
        self.0.lock().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

struct Harness {
    scheduler: Scheduler,
    store: MemoryStore,
    blobs: MemoryBlobStore,
    tasks: MemoryQueue<CreatedTask>,
    configs: MemoryQueue<ConfigUpdate>,
    terminations: MemoryTerminations,
    events: Arc<Recorder>,
}

impl Harness {
    fn new(concurrency: usize, handlers: Vec<Arc<TestHandler>>) -> Self {
        Self::with_store(concurrency, handlers, MemoryStore::new())
    }

    fn with_store(concurrency: usize, handlers: Vec<Arc<TestHandler>>, store: MemoryStore) -> Self {
        Self::custom(config(concurrency), handlers, store, |b| b)
    }

    fn custom(
        config: SchedulerConfig,
        handlers: Vec<Arc<TestHandler>>,
        store: MemoryStore,
        tweak: impl FnOnce(SchedulerBuilder) -> SchedulerBuilder,
    ) -> Self {
        let blobs = MemoryBlobStore::new();
        let tasks = MemoryQueue::new();
        let configs = MemoryQueue::new();
        let terminations = MemoryTerminations::new();
        let events = Arc::new(Recorder::default());

        let mut builder = Scheduler::builder(config)
            .with_task_queue(Arc::new(tasks.clone()))
            .with_config_queue(Arc::new(configs.clone()))
            .with_terminations(Arc::new(terminations.clone()))
            .with_store(Arc::new(store.clone()))
            .with_blobs(Arc::new(blobs.clone()))
            .with_subscriber(events.clone());
        for handler in handlers {
            builder = builder.with_handler(handler);
        }

        Self {
            scheduler: tweak(builder).build().unwrap(),
            store,
            blobs,
            tasks,
            configs,
            terminations,
            events,
        }
    }

    fn terminator(&self) -> Terminator {
        Terminator::new(
            Arc::new(self.store.clone()),
            Arc::new(self.terminations.clone()),
        )
    }

    fn status(&self, task_id: &str, task_type: TaskType) -> Option<TaskStatus> {
        self.store.task(task_id, task_type).map(|t| t.status)
    }

    async fn submit(&self, task_id: &str, types: &[TaskType]) {
        for &task_type in types {
            self.store.insert_task(task(task_id, task_type));
        }
        self.tasks
            .publish(&CreatedTask::new(task_id, types.iter().copied()))
            .await
            .unwrap();
    }
}

fn config(concurrency: usize) -> SchedulerConfig {
    SchedulerConfig {
        concurrency,
        backpressure_ms: 10,
        idle_fetch_ms: 10,
        reaper_interval_ms: 50,
        ..SchedulerConfig::default()
    }
}

fn task(task_id: &str, task_type: TaskType) -> Task {
    let detail = match task_type {
        TaskType::Bha => TaskDetail::Bha(BhaParams {
            detection_method: DetectionMethod::Fast,
            algorithm: Algorithm::Sfs,
            model_id: None,
        }),
        TaskType::Sast => TaskDetail::Sast(Default::default()),
        TaskType::Sca => TaskDetail::Sca(ScaParams::default()),
    };
    Task::new(task_id, detail)
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn redelivered_message_executes_once() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Succeed);
    let h = Harness::new(2, vec![sca.clone()]);

    h.submit("t-1", &[TaskType::Sca]).await;
    h.tasks
        .publish(&CreatedTask::new("t-1", [TaskType::Sca]))
        .await
        .unwrap();
    h.scheduler.start().await.unwrap();

    eventually("task finished", || {
        h.status("t-1", TaskType::Sca) == Some(TaskStatus::Finished)
    })
    .await;
    eventually("both deliveries acknowledged", || h.tasks.acked() == 2).await;
    eventually("slot released", || h.scheduler.pool().running() == 0).await;

    assert_eq!(sca.runs(), 1);
    let stored = h.store.task("t-1", TaskType::Sca).unwrap();
    assert_eq!(stored.result, "tasks/t-1/sca");

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cohort_takes_a_single_slot() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Hold);
    let bha = TestHandler::new(TaskType::Bha, Behavior::Hold);
    let h = Harness::new(1, vec![sca.clone(), bha.clone()]);
    h.scheduler.start().await.unwrap();

    h.submit("t-1", &[TaskType::Sca, TaskType::Bha]).await;
    eventually("both members running", || sca.active() == 1 && bha.active() == 1).await;
    assert_eq!(h.scheduler.pool().running(), 1);

    h.submit("t-2", &[TaskType::Sca]).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sca.runs(), 1);
    assert_eq!(h.tasks.pending(), 1);

    sca.release.cancel();
    eventually("sca member finished", || {
        h.status("t-1", TaskType::Sca) == Some(TaskStatus::Finished)
    })
    .await;
    assert_eq!(h.scheduler.pool().running(), 1);
    assert_eq!(h.events.count(EventKind::CohortCompleted), 0);

    bha.release.cancel();
    eventually("second cohort finished", || {
        h.status("t-2", TaskType::Sca) == Some(TaskStatus::Finished)
    })
    .await;
    assert_eq!(h.status("t-1", TaskType::Bha), Some(TaskStatus::Finished));
    eventually("both cohorts completed", || {
        h.events.count(EventKind::CohortCompleted) == 2
    })
    .await;
    assert_eq!(h.scheduler.pool().running(), 0);

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn terminate_without_in_flight_job_replies_false() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Succeed);
    let h = Harness::new(1, vec![sca.clone()]);
    h.scheduler.start().await.unwrap();

    h.store.insert_task(task("t-1", TaskType::Sca));
    let outcome = h.terminator().terminate("t-1").await.unwrap();

    assert!(!outcome.in_flight);
    assert_eq!(outcome.updated, 1);
    let stored = h.store.task("t-1", TaskType::Sca).unwrap();
    assert_eq!(stored.status, TaskStatus::Terminated);
    assert_eq!(stored.err_msg, err_code::MSG_TERMINATED);

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn terminate_cancels_running_job() {
    let bha = TestHandler::new(TaskType::Bha, Behavior::Hold);
    let h = Harness::new(1, vec![bha.clone()]);
    h.scheduler.start().await.unwrap();

    h.submit("t-1", &[TaskType::Bha]).await;
    eventually("job running", || bha.active() == 1).await;

    let outcome = h.terminator().terminate("t-1").await.unwrap();
    assert!(outcome.in_flight);
    assert_eq!(outcome.updated, 1);

    assert_eq!(bha.active(), 0);
    assert_eq!(h.status("t-1", TaskType::Bha), Some(TaskStatus::Terminated));
    assert_eq!(h.events.count(EventKind::JobTerminated), 1);
    eventually("slot released", || h.scheduler.pool().running() == 0).await;
    assert!(h.scheduler.registry().is_empty());

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn member_admitted_after_termination_never_runs() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Succeed);
    let h = Harness::new(1, vec![sca.clone()]);
    h.scheduler.start().await.unwrap();

    h.store.insert_task(task("t-1", TaskType::Sca));
    let in_flight = h
        .terminations
        .request(&TerminateRequest {
            task_id: "t-1".into(),
        })
        .await
        .unwrap();
    assert!(!in_flight);

    h.tasks
        .publish(&CreatedTask::new("t-1", [TaskType::Sca]))
        .await
        .unwrap();
    eventually("job aborted", || h.events.count(EventKind::JobAborted) == 1).await;

    assert_eq!(sca.runs(), 0);
    assert_eq!(h.status("t-1", TaskType::Sca), Some(TaskStatus::Queuing));
    eventually("slot released", || h.scheduler.pool().running() == 0).await;

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn config_update_retunes_capacity() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Succeed);
    let h = Harness::new(1, vec![sca]);
    h.scheduler.start().await.unwrap();

    h.configs
        .publish(&ConfigUpdate {
            task: TaskConfig {
                concurrency: 5,
                sca_timeout: Some(60),
                sast_timeout: None,
                bha_timeout: Some(120),
            },
        })
        .await
        .unwrap();

    eventually("capacity tuned", || h.scheduler.pool().capacity() == 5).await;
    let settings = h.scheduler.settings();
    assert_eq!(settings.get().concurrency, 5);
    assert_eq!(settings.timeout_for(TaskType::Sca), Duration::from_secs(60));
    assert_eq!(settings.timeout_for(TaskType::Bha), Duration::from_secs(120));
    assert_eq!(h.configs.acked(), 1);
    assert_eq!(h.events.count(EventKind::CapacityTuned), 1);

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tuning_to_zero_keeps_running_jobs_and_blocks_admission() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Hold);
    let h = Harness::new(1, vec![sca.clone()]);
    h.scheduler.start().await.unwrap();

    h.submit("t-1", &[TaskType::Sca]).await;
    eventually("first job running", || sca.active() == 1).await;

    let tune = |concurrency| ConfigUpdate {
        task: TaskConfig {
            concurrency,
            ..TaskConfig::default()
        },
    };
    h.configs.publish(&tune(0)).await.unwrap();
    eventually("capacity zero", || h.scheduler.pool().capacity() == 0).await;
    assert_eq!(sca.active(), 1);

    h.submit("t-2", &[TaskType::Sca]).await;
    sca.release.cancel();
    eventually("first job finished", || {
        h.status("t-1", TaskType::Sca) == Some(TaskStatus::Finished)
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.status("t-2", TaskType::Sca), Some(TaskStatus::Queuing));
    assert_eq!(sca.runs(), 1);

    h.configs.publish(&tune(1)).await.unwrap();
    eventually("second job finished", || {
        h.status("t-2", TaskType::Sca) == Some(TaskStatus::Finished)
    })
    .await;

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn handler_timeout_fails_task() {
    let bha = TestHandler::new(TaskType::Bha, Behavior::Timeout);
    let h = Harness::new(1, vec![bha]);
    h.scheduler.start().await.unwrap();

    h.submit("t-1", &[TaskType::Bha]).await;
    eventually("task failed", || {
        h.status("t-1", TaskType::Bha) == Some(TaskStatus::Failed)
    })
    .await;

    let stored = h.store.task("t-1", TaskType::Bha).unwrap();
    assert_eq!(stored.err_msg, err_code::MSG_TIMEOUT);
    assert_eq!(stored.err_code, err_code::INTERNAL);

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_handler_fails_task_and_releases_slot() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Panic);
    let h = Harness::new(1, vec![sca]);
    h.scheduler.start().await.unwrap();

    h.submit("t-1", &[TaskType::Sca]).await;
    eventually("task failed", || {
        h.status("t-1", TaskType::Sca) == Some(TaskStatus::Failed)
    })
    .await;

    let stored = h.store.task("t-1", TaskType::Sca).unwrap();
    assert!(stored.debug_msg.starts_with("boom\n"), "{}", stored.debug_msg);
    assert_eq!(stored.err_msg, err_code::MSG_INTERNAL);
    eventually("slot released", || h.scheduler.pool().running() == 0).await;

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_pre_handle_hook_releases_slot() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Succeed);
    let tripped = Arc::new(AtomicBool::new(false));
    let hook = tripped.clone();
    let h = Harness::custom(config(1), vec![sca.clone()], MemoryStore::new(), move |b| {
        b.with_pre_handle(move |_: &[Task]| -> Result<(), CoreError> {
            if !hook.swap(true, Ordering::SeqCst) {
                panic!("hook blew up");
            }
            Ok(())
        })
    });
    h.scheduler.start().await.unwrap();

    h.submit("t-1", &[TaskType::Sca]).await;
    eventually("hook ran", || tripped.load(Ordering::SeqCst)).await;
    eventually("slot released", || h.scheduler.pool().running() == 0).await;

    h.submit("t-2", &[TaskType::Sca]).await;
    eventually("second task finished", || {
        h.status("t-2", TaskType::Sca) == Some(TaskStatus::Finished)
    })
    .await;
    assert_eq!(sca.runs(), 1);
    eventually("slot released", || h.scheduler.pool().running() == 0).await;

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn category_limit_holds_second_cohort_until_first_finishes() {
    let sast = TestHandler::new(TaskType::Sast, Behavior::Hold);
    let config = SchedulerConfig {
        category_limits: HashMap::from([("java".to_string(), 1)]),
        ..config(2)
    };
    let h = Harness::custom(config, vec![sast.clone()], MemoryStore::new(), |b| b);
    h.scheduler.start().await.unwrap();

    for id in ["t-1", "t-2"] {
        h.store.insert_task(task(id, TaskType::Sast));
        h.tasks
            .publish(&CreatedTask::new(id, [TaskType::Sast]).with_lang("java"))
            .await
            .unwrap();
    }

    eventually("first cohort running", || sast.active() == 1).await;
    eventually("second cohort rejected", || {
        h.events.count(EventKind::AdmissionRejected) >= 1
    })
    .await;
    assert_eq!(sast.runs(), 1);
    assert_eq!(h.scheduler.pool().running(), 1);
    assert_eq!(h.tasks.acked(), 1);
    let java = h.scheduler.categories().get("java").unwrap();
    assert_eq!(java.running(), 1);
    assert_eq!(h.status("t-2", TaskType::Sast), Some(TaskStatus::Queuing));

    sast.release.cancel();
    for id in ["t-1", "t-2"] {
        eventually("cohort finished", || {
            h.status(id, TaskType::Sast) == Some(TaskStatus::Finished)
        })
        .await;
    }
    assert_eq!(sast.runs(), 2);
    eventually("slots released", || {
        h.scheduler.pool().running() == 0 && java.running() == 0
    })
    .await;
    assert_eq!(h.tasks.acked(), 2);

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_fails_processing_tasks() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Hold);
    let h = Harness::new(1, vec![sca.clone()]);
    h.scheduler.start().await.unwrap();

    h.submit("t-1", &[TaskType::Sca]).await;
    eventually("job running", || sca.active() == 1).await;

    h.scheduler.shutdown().await;

    let stored = h.store.task("t-1", TaskType::Sca).unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.err_msg, err_code::MSG_INTERRUPTED);
    assert!(!h.terminations.has_responder());
    assert_eq!(h.events.count(EventKind::ShutdownCompleted), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reaper_fails_stale_queued_tasks() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Succeed);
    let h = Harness::new(1, vec![sca]);

    let two_hours_ago = SystemTime::now() - Duration::from_secs(2 * 60 * 60);
    h.store
        .insert_task(task("old", TaskType::Sca).with_created_at(two_hours_ago));
    h.store.insert_task(task("fresh", TaskType::Sca));
    h.scheduler.start().await.unwrap();

    eventually("stale task failed", || {
        h.status("old", TaskType::Sca) == Some(TaskStatus::Failed)
    })
    .await;
    assert_eq!(h.store.task("old", TaskType::Sca).unwrap().err_msg, "scanning timeout");
    assert_eq!(h.status("fresh", TaskType::Sca), Some(TaskStatus::Queuing));

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reaper_purges_unreferenced_deleted_models() {
    let bha = TestHandler::new(TaskType::Bha, Behavior::Succeed);
    let store = MemoryStore::new();
    let model = |id: &str| BhaModel {
        id: id.to_string(),
        name: id.to_string(),
        algorithm: Algorithm::Bsd,
        path: format!("models/{id}"),
        is_builtin: false,
        deleted_at: None,
    };
    store.insert_model(model("unused"));
    store.insert_model(model("in-use"));
    store.mark_model_deleted("unused");
    store.mark_model_deleted("in-use");
    store.insert_task(Task::new(
        "t-1",
        TaskDetail::Bha(BhaParams {
            detection_method: DetectionMethod::Intelligent,
            algorithm: Algorithm::Bsd,
            model_id: Some("in-use".into()),
        }),
    ));

    let h = Harness::with_store(1, vec![bha], store);
    h.blobs.insert("models/unused", b"weights".to_vec());
    h.blobs.insert("models/in-use", b"weights".to_vec());
    h.scheduler.start().await.unwrap();

    eventually("unused model purged", || {
        h.events.count(EventKind::ModelPurged) == 1
    })
    .await;
    let remaining: Vec<_> = h.store.models().into_iter().map(|m| m.id).collect();
    assert_eq!(remaining, vec!["in-use".to_string()]);
    assert!(!h.blobs.contains("models/unused"));
    assert!(h.blobs.contains("models/in-use"));

    h.scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn latest_persisted_config_is_applied_on_start() {
    let sca = TestHandler::new(TaskType::Sca, Behavior::Succeed);
    let store = MemoryStore::new();
    store.insert_config(TaskConfig {
        concurrency: 2,
        ..TaskConfig::default()
    });
    store.insert_config(TaskConfig {
        concurrency: 8,
        sca_timeout: Some(90),
        ..TaskConfig::default()
    });

    let h = Harness::with_store(1, vec![sca], store);
    assert_eq!(h.scheduler.pool().capacity(), 1);
    h.scheduler.start().await.unwrap();

    assert_eq!(h.scheduler.pool().capacity(), 8);
    assert_eq!(
        h.scheduler.settings().timeout_for(TaskType::Sca),
        Duration::from_secs(90)
    );

    h.scheduler.shutdown().await;
}
