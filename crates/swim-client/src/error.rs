//! Error types for SWIM client operations

use std::time::Duration;

use thiserror::Error;

use crate::types::OperationKind;

/// Result type alias for SWIM client operations
pub type Result<T> = std::result::Result<T, SwimError>;

/// Failures of a single HTTP exchange with the controller
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed (connection, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Controller answered with a non-2xx status
    #[error("Server error {status}: {message}")]
    Status { status: u16, message: String },

    /// Socket-level IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Response body could not be decoded or lacks a required field
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors that can occur while driving an upgrade
#[derive(Error, Debug)]
pub enum SwimError {
    /// Transport-level failure; never retried by the poller
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The controller reported `isError = true` for the task
    #[error("Task {task_id} had error: {progress}")]
    RemoteTask { task_id: String, progress: String },

    /// The task did not reach a terminal state within the timeout
    #[error("Task {task_id} did not complete within the specified timeout ({})", describe_timeout(.timeout))]
    TaskTimeout { task_id: String, timeout: Duration },

    /// Polling was interrupted through a cancellation token
    #[error("Polling of task {task_id} was cancelled")]
    Cancelled { task_id: String },

    /// Cancellation fired before the operation was sent to the controller
    #[error("Image {operation} was cancelled before submission")]
    NotSubmitted { operation: OperationKind },

    /// Authentication did not yield a token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// No image matches the requested version
    #[error("Image not found for version: {0}")]
    ImageNotFound(String),

    /// No device matches the requested hostname
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}

/// Coarse classification of a [`SwimError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    RemoteTask,
    Timeout,
    Cancelled,
    Lookup,
}

impl SwimError {
    /// Create a status error from status code and message
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport(TransportError::Status {
            status,
            message: message.into(),
        })
    }

    /// Create a malformed-response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Transport(TransportError::MalformedResponse(message.into()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::RemoteTask { .. } => ErrorKind::RemoteTask,
            Self::TaskTimeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } | Self::NotSubmitted { .. } => ErrorKind::Cancelled,
            Self::Auth(_) | Self::ImageNotFound(_) | Self::DeviceNotFound(_) => ErrorKind::Lookup,
        }
    }

    /// Task id carried by task-level failures
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::RemoteTask { task_id, .. }
            | Self::TaskTimeout { task_id, .. }
            | Self::Cancelled { task_id } => Some(task_id),
            _ => None,
        }
    }
}

fn describe_timeout(timeout: &Duration) -> String {
    if timeout.subsec_millis() == 0 && timeout.as_secs() > 0 {
        format!("{} seconds", timeout.as_secs())
    } else {
        format!("{} ms", timeout.as_millis())
    }
}

impl From<reqwest::Error> for SwimError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(TransportError::Http(err))
    }
}

impl From<std::io::Error> for SwimError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(TransportError::Io(err))
    }
}

impl From<url::ParseError> for SwimError {
    fn from(err: url::ParseError) -> Self {
        Self::Transport(TransportError::InvalidUrl(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = SwimError::status(500, "boom");
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.task_id().is_none());

        let err = SwimError::RemoteTask {
            task_id: "T1".into(),
            progress: "disk full".into(),
        };
        assert_eq!(err.kind(), ErrorKind::RemoteTask);
        assert_eq!(err.task_id(), Some("T1"));

        let err = SwimError::ImageNotFound("17.9.4".into());
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn test_timeout_message() {
        let err = SwimError::TaskTimeout {
            task_id: "T1".into(),
            timeout: Duration::from_secs(60),
        };
        assert_eq!(
            err.to_string(),
            "Task T1 did not complete within the specified timeout (60 seconds)"
        );

        let err = SwimError::TaskTimeout {
            task_id: "T1".into(),
            timeout: Duration::from_millis(200),
        };
        assert_eq!(
            err.to_string(),
            "Task T1 did not complete within the specified timeout (200 ms)"
        );
    }

    #[test]
    fn test_not_submitted_is_cancellation_without_task() {
        let err = SwimError::NotSubmitted {
            operation: OperationKind::Distribution,
        };
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(err.task_id().is_none());
    }
}
