use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::bha::config::BhaConfig;
use crate::error::{ExecError, ExecResult};

const STATUS_OK: i32 = 0;

/// Body of `POST /scan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Algorithm name, e.g. `sfs`.
    #[serde(rename = "type")]
    pub algorithm: String,
    pub oss_bucket: String,
    pub input_path: String,
    pub output_dir: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model_path: String,
    #[serde(default, rename = "model_md5", skip_serializing_if = "String::is_empty")]
    pub model_md5: String,
    pub top_n: u32,
    pub minimum_sim: f32,
    /// Minutes before the service gives up on its own.
    #[serde(rename = "timeout")]
    pub timeout_minutes: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    err_message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ScanData {
    id: String,
}

/// HTTP client for the remote analysis service.
#[derive(Debug, Clone)]
pub struct BhaClient {
    http: reqwest::Client,
    api_url: String,
}

impl BhaClient {
    pub fn new(cfg: &BhaConfig) -> ExecResult<Self> {
        if cfg.api_url.is_empty() {
            return Err(ExecError::InvalidConfig("bha invalid apiUrl"));
        }
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(cfg.insecure_skip_verify)
            .timeout(cfg.request_timeout())
            .build()?;

        Ok(Self {
            http,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a scan; returns the service's scan id.
    #[instrument(level = "debug", skip(self, req), fields(input = %req.input_path))]
    pub async fn scan(&self, req: &ScanRequest) -> ExecResult<String> {
        let response = self
            .http
            .post(format!("{}/scan", self.api_url))
            .json(req)
            .send()
            .await?;

        let data: Option<ScanData> = check_response(response).await?;
        match data {
            Some(data) if !data.id.is_empty() => {
                debug!(scan_id = %data.id, "scan submitted");
                Ok(data.id)
            }
            _ => Err(ExecError::InvalidResponse("scan response without id".into())),
        }
    }

    /// Ask the service to stop scan `id`.
    #[instrument(level = "debug", skip(self))]
    pub async fn stop(&self, id: &str) -> ExecResult<()> {
        let response = self
            .http
            .post(format!("{}/stop/{}", self.api_url, id))
            .send()
            .await?;

        let _: Option<serde_json::Value> = check_response(response).await?;
        Ok(())
    }
}

/// Success is HTTP 200 with `code == 0`; anything else surfaces the service's message.
async fn check_response<T: DeserializeOwned>(response: reqwest::Response) -> ExecResult<Option<T>> {
    let status = response.status();
    let body = response.text().await?;

    let envelope = match serde_json::from_str::<Envelope<T>>(&body) {
        Ok(envelope) => envelope,
        Err(e) if status == StatusCode::OK => {
            return Err(ExecError::InvalidResponse(format!(
                "failed to parse response: {}, body: {}",
                e, body
            )));
        }
        Err(_) => return Err(ExecError::Rejected(status.to_string())),
    };

    if status == StatusCode::OK && envelope.code == STATUS_OK {
        return Ok(envelope.data);
    }
    if !envelope.err_message.is_empty() {
        return Err(ExecError::Rejected(envelope.err_message));
    }
    Err(ExecError::Rejected(status.to_string()))
}
