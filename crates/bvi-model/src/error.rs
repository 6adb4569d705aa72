use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("unknown task type: {0}")]
    UnknownTaskType(String),
    #[error("unknown task status: {0}")]
    UnknownStatus(String),
    #[error("unknown bha algorithm: {0}")]
    UnknownAlgorithm(String),
}
