use bvi_core::{Event, EventKind, Subscribe};
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    proto::MetricFamily,
};
use tracing::trace;

const DURATION_BUCKETS: &[f64] = &[
    1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0, 3600.0,
];

/// Scheduler metrics on a dedicated registry.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    jobs_started: IntCounterVec,
    jobs_completed: IntCounterVec,
    job_duration: HistogramVec,
    admission_rejected: IntCounterVec,
    messages_skipped: IntCounter,
    admission_capacity: IntGauge,
    admission_running: IntGauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register every metric on `registry`.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let jobs_started = IntCounterVec::new(
            Opts::new("bvi_jobs_started_total", "Jobs claimed and started"),
            &["task_type"],
        )?;
        let jobs_completed = IntCounterVec::new(
            Opts::new("bvi_jobs_completed_total", "Jobs that stopped running, by outcome"),
            &["task_type", "outcome"],
        )?;
        let job_duration = HistogramVec::new(
            HistogramOpts::new("bvi_job_duration_seconds", "Job wall time in seconds")
                .buckets(DURATION_BUCKETS.to_vec()),
            &["task_type"],
        )?;
        let admission_rejected = IntCounterVec::new(
            Opts::new(
                "bvi_admission_rejected_total",
                "Deliveries left unacknowledged by a full limiter",
            ),
            &["reason"],
        )?;
        let messages_skipped = IntCounter::new(
            "bvi_messages_skipped_total",
            "Deliveries acknowledged without queued tasks",
        )?;
        let admission_capacity =
            IntGauge::new("bvi_admission_capacity", "Global admission capacity")?;
        let admission_running =
            IntGauge::new("bvi_admission_running", "Cohorts holding a global slot")?;

        registry.register(Box::new(jobs_started.clone()))?;
        registry.register(Box::new(jobs_completed.clone()))?;
        registry.register(Box::new(job_duration.clone()))?;
        registry.register(Box::new(admission_rejected.clone()))?;
        registry.register(Box::new(messages_skipped.clone()))?;
        registry.register(Box::new(admission_capacity.clone()))?;
        registry.register(Box::new(admission_running.clone()))?;

        Ok(Self {
            registry,
            jobs_started,
            jobs_completed,
            job_duration,
            admission_rejected,
            messages_skipped,
            admission_capacity,
            admission_running,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    fn job_done(&self, event: &Event, outcome: &str) {
        let task_type = task_type(event);
        self.jobs_completed
            .with_label_values(&[task_type, outcome])
            .inc();
        if let Some(elapsed) = event.elapsed {
            self.job_duration
                .with_label_values(&[task_type])
                .observe(elapsed.as_secs_f64());
        }
    }

    fn slots(&self, event: &Event) {
        if let Some(capacity) = event.capacity {
            self.admission_capacity.set(capacity as i64);
        }
        if let Some(running) = event.running {
            self.admission_running.set(running as i64);
        }
    }
}

fn task_type(event: &Event) -> &'static str {
    event.task_type.map(|t| t.as_str()).unwrap_or("unknown")
}

impl Subscribe for PrometheusMetrics {
    fn on_event(&self, event: &Event) {
        match event.kind {
            EventKind::JobStarting => {
                self.jobs_started
                    .with_label_values(&[task_type(event)])
                    .inc();
            }
            EventKind::JobFinished => self.job_done(event, "finished"),
            EventKind::JobFailed => self.job_done(event, "failed"),
            EventKind::JobTerminated => self.job_done(event, "terminated"),
            EventKind::AdmissionRejected => {
                let reason = event.reason.as_deref().unwrap_or("unknown");
                self.admission_rejected.with_label_values(&[reason]).inc();
                self.slots(event);
            }
            EventKind::MessageSkipped => self.messages_skipped.inc(),
            EventKind::CohortAdmitted | EventKind::CohortCompleted | EventKind::CapacityTuned => {
                self.slots(event)
            }
            other => trace!(kind = ?other, "event not tracked by metrics"),
        }
    }

    fn name(&self) -> &'static str {
        "prometheus"
    }
}
