//! Directory API error types and their retry classification

use reqwest::StatusCode;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// How a failure should be treated by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// HTTP 429; retried, honouring any `Retry-After`
    RateLimited,
    /// 5xx, connection failures, timeouts; retried with backoff
    Transient,
    /// Anything else; returned immediately
    Permanent,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limited by the directory (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("directory server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("request did not complete: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("authentication rejected ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("request rejected {status}: {body}")]
    Client { status: u16, body: String },

    #[error("could not build request: {0}")]
    Request(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: Box<ApiError> },
}

impl ApiError {
    /// Map an unsuccessful HTTP status to an error.
    pub fn from_status(status: StatusCode, retry_after_secs: Option<u64>, body: String) -> Self {
        let body = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            body
        };
        match status {
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { retry_after_secs },
            StatusCode::NOT_FOUND => ApiError::NotFound(body),
            StatusCode::CONFLICT => ApiError::Conflict(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized {
                status: status.as_u16(),
                body,
            },
            s if s.is_server_error() => ApiError::Server {
                status: s.as_u16(),
                body,
            },
            s => ApiError::Client {
                status: s.as_u16(),
                body,
            },
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            ApiError::RateLimited { .. } => FailureClass::RateLimited,
            ApiError::Server { .. } | ApiError::Network(_) => FailureClass::Transient,
            _ => FailureClass::Permanent,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::Request(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
