use std::path::PathBuf;

use hyper::StatusCode;
use thiserror::Error;

/// Errors raised by the sender, the receiver and the verifier.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The configuration is rejected at startup.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Transport level failure from hyper.
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),
    /// The request could not be built.
    #[error("failed to build request: {0}")]
    Request(#[from] hyper::http::Error),
    /// An operation did not finish in time.
    #[error("timeout: {0}")]
    Timeout(String),
    /// The receiver answered with a non-success status.
    #[error("receiver answered {status} for task {task_id}")]
    UnexpectedStatus { task_id: u64, status: StatusCode },
    /// File system failure on `path`.
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The receiver's server task ended abnormally.
    #[error("receiver stopped: {0}")]
    ServerStopped(String),
    #[error("method {0} is not allowed")]
    MethodNotAllowed(String),
    #[error("missing task_id query parameter")]
    MissingTaskId,
    #[error("invalid task_id: {0}")]
    InvalidTaskId(String),
    #[error("missing Content-Length header")]
    MissingContentLength,
    #[error("invalid Content-Length header: {0}")]
    InvalidContentLength(String),
    /// The client stopped sending before the declared length was reached.
    #[error("incomplete request body: {0}")]
    IncompleteBody(String),
    #[error("payload of {len} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { len: u64, limit: u64 },
}

impl HarnessError {
    /// Wrap an io error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The status the receiver answers with when a request fails with this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingTaskId
            | Self::InvalidTaskId(_)
            | Self::InvalidContentLength(_)
            | Self::IncompleteBody(_) => StatusCode::BAD_REQUEST,
            Self::MissingContentLength => StatusCode::LENGTH_REQUIRED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_map_to_client_statuses() {
        assert_eq!(
            HarnessError::MissingTaskId.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HarnessError::InvalidTaskId("x".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HarnessError::IncompleteBody("closed".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HarnessError::MissingContentLength.status_code(),
            StatusCode::LENGTH_REQUIRED
        );
        assert_eq!(
            HarnessError::PayloadTooLarge { len: 2, limit: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            HarnessError::MethodNotAllowed("GET".to_string()).status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_io_errors_are_internal() {
        let err = HarnessError::io(
            "out_recv/1.bin",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("out_recv/1.bin"));
    }
}
