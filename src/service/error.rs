use std::time::Duration;
use thiserror::Error;

/// Failure of a single generation call.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request could not complete (connect, TLS, body read).
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status without a readable error body.
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The service answered with an application-level error field.
    #[error("{0}")]
    Service(String),

    /// The body carried neither the expected payload nor an error.
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("Request timed out after {}", format_deadline(.0))]
    TimedOut(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("request task failed: {0}")]
    TaskFailed(String),
}

fn format_deadline(d: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*d)
}

impl ServiceError {
    /// Message suitable for the user, or `None` when the failure carries nothing useful
    /// and the caller should fall back to a stage-specific message.
    pub fn user_message(&self) -> Option<String> {
        match self {
            ServiceError::Service(msg) if msg.trim().is_empty() => None,
            ServiceError::Malformed(_) => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ServiceError::Transport(_) | ServiceError::Status(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_message_passes_through() {
        let e = ServiceError::Service("bad url".into());
        assert_eq!(e.user_message().as_deref(), Some("bad url"));
        assert!(!e.is_transport());
    }

    #[test]
    fn blank_and_malformed_have_no_message() {
        assert_eq!(ServiceError::Service("  ".into()).user_message(), None);
        assert_eq!(ServiceError::Malformed("missing `titles`".into()).user_message(), None);
    }

    #[test]
    fn timeout_and_status_render() {
        let e = ServiceError::TimedOut(Duration::from_secs(90));
        assert_eq!(e.user_message().as_deref(), Some("Request timed out after 1m 30s"));
        let e = ServiceError::Status(reqwest::StatusCode::BAD_GATEWAY);
        assert_eq!(e.to_string(), "HTTP 502 Bad Gateway");
        assert!(e.is_transport());
    }
}
