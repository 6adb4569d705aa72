use bvi_core::{CoreError, HandlerError};
use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("invalid executor config: {0}")]
    InvalidConfig(&'static str),

    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("analysis service rejected request: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("storage error: {0}")]
    Storage(#[from] CoreError),

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("rename output files failed: {0}")]
    Rename(String),

    #[error("scan terminated")]
    Terminated,

    #[error("scan timed out")]
    Timeout,
}

impl From<ExecError> for HandlerError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Terminated => HandlerError::Terminated,
            ExecError::Timeout => HandlerError::Timeout,
            ExecError::InvalidConfig(_) | ExecError::Rejected(_) => {
                HandlerError::business(e.to_string())
            }
            other => HandlerError::internal(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_a_business_failure() {
        let err: HandlerError = ExecError::Rejected("unsupported file".into()).into();
        assert_eq!(
            err.user_message(),
            "analysis service rejected request: unsupported file"
        );
    }

    #[test]
    fn storage_failure_is_internal() {
        let err: HandlerError = ExecError::Storage(CoreError::Blob("down".into())).into();
        assert!(matches!(err, HandlerError::Internal(_)));
        assert_eq!(err.user_message(), "internal service failure");
    }

    #[test]
    fn cancellation_kinds_are_preserved() {
        assert!(matches!(HandlerError::from(ExecError::Timeout), HandlerError::Timeout));
        assert!(matches!(
            HandlerError::from(ExecError::Terminated),
            HandlerError::Terminated
        ));
    }
}
