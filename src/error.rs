/// Crate-wide error type.
///
/// Only transport-level and setup failures are represented here. Line-level
/// and shape-level anomalies in an event stream are absorbed by the stream
/// processor and never become a `StreamError`.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    /// The caller's cancellation token fired before the streams were handed out.
    #[error("Request cancelled")]
    Cancelled,
}

/// Broad error category a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Cancelled,
    Authentication,
    Permission,
    RateLimit,
    ServerError,
    Unknown,
}

/// Map an upstream HTTP status code to an error category.
#[must_use]
pub fn category_from_upstream_status(status: u16) -> ErrorCategory {
    match status {
        400 => ErrorCategory::InvalidRequest,
        401 => ErrorCategory::Authentication,
        403 => ErrorCategory::Permission,
        429 => ErrorCategory::RateLimit,
        500..=599 => ErrorCategory::ServerError,
        _ => ErrorCategory::Unknown,
    }
}

impl StreamError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            StreamError::Cancelled => ErrorCategory::Cancelled,
            StreamError::Config(_) | StreamError::Transport(_) => ErrorCategory::ServerError,
            StreamError::Upstream { status, .. } => category_from_upstream_status(*status),
        }
    }

    /// The upstream HTTP status, if this error came from a non-success response.
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            StreamError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Transport(err.to_string())
    }
}

const UPSTREAM_ERROR_MAX_LEN: usize = 500;

/// Extract the upstream-provided `error.message` from a response body.
///
/// Returns `None` when the body is not JSON or carries no message.
#[must_use]
pub fn upstream_error_message(body: &[u8]) -> Option<String> {
    let json = serde_json::from_slice::<serde_json::Value>(body).ok()?;
    let msg = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())?;
    Some(truncate_message(msg))
}

/// Sanitize an upstream error body to avoid leaking internal details.
///
/// Attempts to extract just the `error.message` field from JSON responses.
/// Falls back to a truncated UTF-8 representation capped at 500 chars.
#[must_use]
pub fn sanitize_upstream_error(body: &[u8]) -> String {
    if let Some(msg) = upstream_error_message(body) {
        return msg;
    }
    truncate_message(&String::from_utf8_lossy(body))
}

fn truncate_message(msg: &str) -> String {
    if msg.len() <= UPSTREAM_ERROR_MAX_LEN {
        return msg.to_string();
    }
    let mut end = UPSTREAM_ERROR_MAX_LEN;
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &msg[..end])
}
