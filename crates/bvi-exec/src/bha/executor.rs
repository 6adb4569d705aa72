use std::{fmt, future, sync::Arc, time::Duration};

use bvi_core::{JobContext, ports::BlobStore};
use bvi_model::Algorithm;
use serde::Deserialize;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bha::client::{BhaClient, ScanRequest};
use crate::error::{ExecError, ExecResult};

/// Canonical name of the scan result inside the output directory.
pub const RESULT_FILE: &str = "bha-result.json";
pub const LOG_FILE: &str = "bin-vul-inspector.log";
pub const ASM_FILE: &str = "bin-vul-inspector_asm.txt";

const STATUS_FILE: &str = "status";

/// Generic names written by the service, paired with the names the pipeline reads.
const ARTIFACTS: [(&str, &str); 3] = [
    ("output.json", RESULT_FILE),
    ("log.txt", LOG_FILE),
    ("output_asm.txt", ASM_FILE),
];

/// Terminal value of the status marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Successful,
    Failed,
    Terminated,
    Timeout,
}

impl ScanStatus {
    /// `None` for values that are not terminal.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "successful" => Some(ScanStatus::Successful),
            "failed" => Some(ScanStatus::Failed),
            "terminated" => Some(ScanStatus::Terminated),
            "timeout" => Some(ScanStatus::Timeout),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Successful => "successful",
            ScanStatus::Failed => "failed",
            ScanStatus::Terminated => "terminated",
            ScanStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the service reported once the scan reached a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub scan_id: String,
    pub status: ScanStatus,
    pub message: String,
}

impl ScanOutcome {
    pub fn is_successful(&self) -> bool {
        self.status == ScanStatus::Successful
    }
}

#[derive(Debug, Deserialize)]
struct Marker {
    status: String,
    #[serde(default)]
    msg: String,
}

/// One submit-then-poll run against the analysis service.
pub struct Executor {
    client: BhaClient,
    blobs: Arc<dyn BlobStore>,
    request: ScanRequest,
    timeout: Duration,
    poll_interval: Duration,
}

impl Executor {
    pub fn builder(client: BhaClient, blobs: Arc<dyn BlobStore>) -> ExecutorBuilder {
        ExecutorBuilder::new(client, blobs)
    }

    pub fn request(&self) -> &ScanRequest {
        &self.request
    }

    fn artifact(&self, name: &str) -> String {
        format!("{}/{}", self.request.output_dir.trim_end_matches('/'), name)
    }

    /// Submit the scan and wait for its status marker.
    ///
    /// Returns [`ExecError::Terminated`] when `ctx` is cancelled and [`ExecError::Timeout`] when
    /// the executor's own timeout elapses first; in both cases the remote scan is asked to stop.
    pub async fn run(&self, ctx: &JobContext) -> ExecResult<ScanOutcome> {
        if ctx.is_cancelled() {
            return Err(ExecError::Terminated);
        }
        let deadline = (!self.timeout.is_zero()).then(|| Instant::now() + self.timeout);

        let id = self.client.scan(&self.request).await?;
        info!(scan_id = %id, input = %self.request.input_path, "bha scan submitted");

        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!(scan_id = %id, cause = ?ctx.cause(), "bha scan received cancel signal");
                    self.stop_quietly(&id).await;
                    return Err(ExecError::Terminated);
                }
                _ = &mut expired => {
                    warn!(scan_id = %id, timeout = ?self.timeout, "bha scan timed out");
                    self.stop_quietly(&id).await;
                    return Err(ExecError::Timeout);
                }
                _ = ticker.tick() => {
                    if let Some(outcome) = self.poll(&id).await? {
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    /// One look at the status marker; `None` while the scan is still running.
    async fn poll(&self, id: &str) -> ExecResult<Option<ScanOutcome>> {
        let raw = match self.blobs.get(&self.artifact(STATUS_FILE)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(e) => {
                debug!(scan_id = %id, error = %e, "status marker not readable yet");
                return Ok(None);
            }
        };
        let marker: Marker = serde_json::from_slice(&raw).map_err(|source| ExecError::Decode {
            what: "status marker",
            source,
        })?;
        let Some(status) = ScanStatus::parse(&marker.status) else {
            debug!(scan_id = %id, status = %marker.status, "scan still running");
            return Ok(None);
        };

        self.rename_artifacts(status).await?;
        info!(scan_id = %id, %status, "bha scan reached terminal status");
        Ok(Some(ScanOutcome {
            scan_id: id.to_string(),
            status,
            message: marker.msg,
        }))
    }

    /// Move the generic outputs to their canonical names.
    ///
    /// Every rename is attempted. Failures are errors only for a successful scan; a failed scan
    /// may not have produced all of them.
    async fn rename_artifacts(&self, status: ScanStatus) -> ExecResult<()> {
        let mut failures = Vec::new();
        for (from, to) in ARTIFACTS {
            if let Err(e) = self.blobs.rename(&self.artifact(from), &self.artifact(to)).await {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            return Ok(());
        }

        let joined = failures.join("; ");
        if status == ScanStatus::Successful {
            return Err(ExecError::Rename(joined));
        }
        warn!(%status, errors = %joined, "missing artifacts after unsuccessful scan");
        Ok(())
    }

    async fn stop_quietly(&self, id: &str) {
        if let Err(e) = self.client.stop(id).await {
            warn!(scan_id = %id, error = %e, "failed to stop remote scan");
        }
    }
}

/// Collects the scan parameters and validates them on [`build`](Self::build).
pub struct ExecutorBuilder {
    client: BhaClient,
    blobs: Arc<dyn BlobStore>,
    algorithm: Algorithm,
    bucket: String,
    input_path: String,
    output_dir: String,
    model_path: String,
    model_md5: String,
    top_n: Option<u32>,
    minimum_sim: f32,
    timeout: Duration,
    poll_interval: Duration,
}

impl ExecutorBuilder {
    fn new(client: BhaClient, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            client,
            blobs,
            algorithm: Algorithm::Sfs,
            bucket: String::new(),
            input_path: String::new(),
            output_dir: String::new(),
            model_path: String::new(),
            model_md5: String::new(),
            top_n: None,
            minimum_sim: 0.0,
            timeout: Duration::ZERO,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn input_path(mut self, path: impl Into<String>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Model file and its integrity hash, required by the intelligent algorithms.
    pub fn model(mut self, path: impl Into<String>, md5: impl Into<String>) -> Self {
        self.model_path = path.into();
        self.model_md5 = md5.into();
        self
    }

    /// Defaults to the algorithm's own value.
    pub fn top_n(mut self, top_n: u32) -> Self {
        self.top_n = Some(top_n);
        self
    }

    pub fn minimum_sim(mut self, sim: f32) -> Self {
        self.minimum_sim = sim;
        self
    }

    /// Zero disables the executor's own deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn build(self) -> ExecResult<Executor> {
        if self.bucket.is_empty() {
            return Err(ExecError::InvalidConfig("bha invalid ossBucket"));
        }
        if self.input_path.is_empty() {
            return Err(ExecError::InvalidConfig("bha invalid inputPath"));
        }
        if self.output_dir.is_empty() {
            return Err(ExecError::InvalidConfig("bha invalid outputDir"));
        }
        if self.poll_interval.is_zero() {
            return Err(ExecError::InvalidConfig("bha invalid poll interval"));
        }
        if self.algorithm.requires_model() {
            if self.model_path.is_empty() {
                return Err(ExecError::InvalidConfig("bha invalid model path"));
            }
            if self.model_md5.is_empty() {
                return Err(ExecError::InvalidConfig("bha invalid model MD5"));
            }
        }

        let request = ScanRequest {
            algorithm: self.algorithm.as_str().to_string(),
            oss_bucket: self.bucket,
            input_path: self.input_path,
            output_dir: self.output_dir,
            model_path: self.model_path,
            model_md5: self.model_md5,
            top_n: self.top_n.unwrap_or_else(|| self.algorithm.top_n()),
            minimum_sim: self.minimum_sim,
            timeout_minutes: self.timeout.as_secs().div_ceil(60),
        };
        Ok(Executor {
            client: self.client,
            blobs: self.blobs,
            request,
            timeout: self.timeout,
            poll_interval: self.poll_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bha::config::BhaConfig;
    use bvi_core::memory::MemoryBlobStore;

    fn builder() -> ExecutorBuilder {
        let client = BhaClient::new(&BhaConfig::new("http://127.0.0.1:1")).unwrap();
        Executor::builder(client, Arc::new(MemoryBlobStore::new()))
            .bucket("bucket")
            .input_path("uploads/a.bin")
            .output_dir("tasks/t1/bha")
    }

    #[test]
    fn terminal_statuses() {
        for s in ["successful", "failed", "terminated", "timeout"] {
            assert_eq!(ScanStatus::parse(s).map(|s| s.as_str()), Some(s));
        }
        assert_eq!(ScanStatus::parse("running"), None);
    }

    #[test]
    fn fast_algorithm_needs_no_model() {
        let exec = builder().timeout(Duration::from_secs(90 * 60)).build().unwrap();
        assert_eq!(exec.request().algorithm, "sfs");
        assert_eq!(exec.request().top_n, 1);
        assert_eq!(exec.request().timeout_minutes, 90);
    }

    #[test]
    fn sub_minute_timeout_rounds_up() {
        let exec = builder().timeout(Duration::from_secs(30)).build().unwrap();
        assert_eq!(exec.request().timeout_minutes, 1);

        let exec = builder().timeout(Duration::from_secs(61)).build().unwrap();
        assert_eq!(exec.request().timeout_minutes, 2);

        let exec = builder().timeout(Duration::ZERO).build().unwrap();
        assert_eq!(exec.request().timeout_minutes, 0);
    }

    #[test]
    fn intelligent_algorithm_requires_model() {
        let err = builder().algorithm(Algorithm::Bsd).build().err().unwrap();
        assert!(matches!(err, ExecError::InvalidConfig("bha invalid model path")));

        let err = builder()
            .algorithm(Algorithm::Ssfs)
            .model("models/m1.bin", "")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ExecError::InvalidConfig("bha invalid model MD5")));

        let exec = builder()
            .algorithm(Algorithm::Ssfs)
            .model("models/m1.bin", "abc")
            .build()
            .unwrap();
        assert_eq!(exec.request().top_n, 100);
    }

    #[test]
    fn missing_input_is_rejected() {
        let err = builder().input_path("").build().err().unwrap();
        assert!(matches!(err, ExecError::InvalidConfig("bha invalid inputPath")));
    }
}
