//! Backend errors and their user-facing descriptions

use super::retry::{Classify, FailureClass};
use super::traits::Backend;

/// Failure of a single backend attempt
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Backend answered with a non-200 status
    #[error("API request failed with status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },
    /// Request timed out
    #[error("request timed out")]
    Timeout,
    /// Backend could not be reached
    #[error("connection failed: {0}")]
    Connection(String),
    /// 200 response whose body had an unexpected shape
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Any other transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connection(error.to_string())
        } else if error.is_decode() {
            Self::Malformed(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl Classify for BackendError {
    fn failure_class(&self) -> FailureClass {
        match self {
            Self::Timeout => FailureClass::Timeout,
            Self::Connection(_) => FailureClass::Connection,
            Self::Status { .. } | Self::Malformed(_) | Self::Transport(_) => FailureClass::Api,
        }
    }
}

impl BackendError {
    /// Message shown to the user once all `attempts` have failed
    #[must_use]
    pub fn describe(&self, backend: Backend, attempts: u32) -> String {
        match self {
            Self::Status { .. } => self.to_string(),
            Self::Timeout => format!(
                "Request timed out after {attempts} attempts. The model might be taking too long to respond."
            ),
            Self::Connection(_) => format!(
                "Connection error after {attempts} attempts. Please check if {backend} is running."
            ),
            Self::Malformed(detail) | Self::Transport(detail) => {
                format!("Unexpected error after {attempts} attempts: {detail}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        let status = BackendError::Status {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(status.failure_class(), FailureClass::Api);
        assert_eq!(BackendError::Timeout.failure_class(), FailureClass::Timeout);
        assert_eq!(
            BackendError::Connection("refused".into()).failure_class(),
            FailureClass::Connection
        );
        assert_eq!(
            BackendError::Malformed("not json".into()).failure_class(),
            FailureClass::Api
        );
    }

    #[test]
    fn test_descriptions() {
        let status = BackendError::Status {
            status: 404,
            body: "model not found".into(),
        };
        assert_eq!(
            status.describe(Backend::Ollama, 3),
            "API request failed with status 404: model not found"
        );
        assert!(BackendError::Connection("refused".into())
            .describe(Backend::LmStudio, 3)
            .contains("check if LM Studio is running"));
        assert!(BackendError::Timeout
            .describe(Backend::Ollama, 3)
            .starts_with("Request timed out after 3 attempts"));
    }
}
