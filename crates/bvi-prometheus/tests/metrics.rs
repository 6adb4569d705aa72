use std::time::Duration;

use bvi_core::{Event, EventKind, Subscribe};
use bvi_model::TaskType;
use bvi_prometheus::{Encoder, PrometheusMetrics, TextEncoder};

fn render(metrics: &PrometheusMetrics) -> String {
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&metrics.gather(), &mut buf)
        .unwrap();
    String::from_utf8(buf).unwrap()
}

#[test]
fn job_lifecycle_is_counted_by_type_and_outcome() {
    let metrics = PrometheusMetrics::new().unwrap();

    for outcome in [EventKind::JobFinished, EventKind::JobFailed, EventKind::JobFinished] {
        metrics.on_event(&Event::new(EventKind::JobStarting).with_task("t1", TaskType::Bha));
        metrics.on_event(
            &Event::new(outcome)
                .with_task("t1", TaskType::Bha)
                .with_elapsed(Duration::from_secs(42)),
        );
    }
    metrics.on_event(
        &Event::new(EventKind::JobTerminated)
            .with_task("t2", TaskType::Sca)
            .with_reason("terminate"),
    );

    let text = render(&metrics);
    assert!(text.contains(r#"bvi_jobs_started_total{task_type="bha"} 3"#));
    assert!(text.contains(r#"bvi_jobs_completed_total{outcome="finished",task_type="bha"} 2"#));
    assert!(text.contains(r#"bvi_jobs_completed_total{outcome="failed",task_type="bha"} 1"#));
    assert!(text.contains(r#"bvi_jobs_completed_total{outcome="terminated",task_type="sca"} 1"#));
    assert!(text.contains(r#"bvi_job_duration_seconds_count{task_type="bha"} 3"#));
}

#[test]
fn admission_pressure_is_visible() {
    let metrics = PrometheusMetrics::new().unwrap();

    metrics.on_event(
        &Event::new(EventKind::AdmissionRejected)
            .with_task_id("t1")
            .with_reason("capacity")
            .with_slots(2, 2),
    );
    metrics.on_event(
        &Event::new(EventKind::AdmissionRejected)
            .with_task_id("t2")
            .with_reason("category")
            .with_slots(2, 1),
    );
    metrics.on_event(&Event::new(EventKind::MessageSkipped).with_task_id("t3"));

    let text = render(&metrics);
    assert!(text.contains(r#"bvi_admission_rejected_total{reason="capacity"} 1"#));
    assert!(text.contains(r#"bvi_admission_rejected_total{reason="category"} 1"#));
    assert!(text.contains("bvi_messages_skipped_total 1"));
    assert!(text.contains("bvi_admission_capacity 2"));
    assert!(text.contains("bvi_admission_running 1"));
}

#[test]
fn untracked_events_are_ignored() {
    let metrics = PrometheusMetrics::new().unwrap();
    metrics.on_event(&Event::new(EventKind::ShutdownRequested));
    metrics.on_event(&Event::new(EventKind::ModelPurged).with_reason("m1"));

    assert!(!render(&metrics).contains("bvi_jobs_started_total{"));
    assert_eq!(metrics.name(), "prometheus");
}
