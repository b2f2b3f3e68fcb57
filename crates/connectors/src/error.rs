//! Error types for connectors and the observation scheduler

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during connector operations
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Failed to initialize connector (e.g., HTTP client creation failed)
    #[error("failed to initialize connector: {0}")]
    Init(String),

    /// HTTP request failed
    #[cfg(feature = "jenkins")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote server answered with an unexpected status code
    #[error("unexpected HTTP status {code} from {url}")]
    Status { code: u16, url: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Remote target is temporarily unreachable
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// Every retry attempt failed
    #[error("failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Unknown connector type
    #[error("Unknown connector type: {0}")]
    UnknownConnector(String),

    /// Required configuration item is absent
    #[error("connector '{connector}' is missing required item '{item}'")]
    MissingItem { connector: String, item: &'static str },

    /// Configuration item has an unusable value
    #[error("connector '{connector}' has invalid item '{item}': {message}")]
    InvalidItem {
        connector: String,
        item: &'static str,
        message: String,
    },

    /// The operation observed a cancellation request
    #[error("operation cancelled")]
    Cancelled,

    /// Connector identifier is already registered with the scheduler
    #[error("connector {0} is already observed")]
    AlreadyObserved(Uuid),

    /// Scheduler loop is already running
    #[error("scheduler is already running")]
    AlreadyRunning,
}

impl ConnectorError {
    /// Create a MissingItem error
    pub fn missing_item(connector: impl Into<String>, item: &'static str) -> Self {
        Self::MissingItem {
            connector: connector.into(),
            item,
        }
    }

    /// Create an InvalidItem error
    pub fn invalid_item(
        connector: impl Into<String>,
        item: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidItem {
            connector: connector.into(),
            item,
            message: message.into(),
        }
    }

    /// True for the cancellation signal, which is never treated as a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for failures worth retrying (timeouts, connect errors, 5xx, 429)
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "jenkins")]
            Self::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                e.status()
                    .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            Self::Status { code, .. } => *code >= 500 || *code == 429,
            Self::Unavailable(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_not_transient() {
        let err = ConnectorError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_status_transience() {
        let server = ConnectorError::Status {
            code: 503,
            url: "http://ci/job/a/api/json".into(),
        };
        let throttled = ConnectorError::Status {
            code: 429,
            url: "http://ci/job/a/api/json".into(),
        };
        let client = ConnectorError::Status {
            code: 400,
            url: "http://ci/job/a/api/json".into(),
        };
        assert!(server.is_transient());
        assert!(throttled.is_transient());
        assert!(!client.is_transient());
        assert!(server.to_string().contains("503"));
    }

    #[test]
    fn test_not_found_is_permanent() {
        assert!(!ConnectorError::NotFound("build 12".into()).is_transient());
        assert!(!ConnectorError::AuthFailed("bad token".into()).is_transient());
    }

    #[test]
    fn test_item_error_display() {
        let err = ConnectorError::missing_item("core main", "server");
        assert!(err.to_string().contains("core main"));
        assert!(err.to_string().contains("server"));

        let err = ConnectorError::invalid_item("gateway", "port", "not a number");
        assert!(err.to_string().contains("port"));
        assert!(err.to_string().contains("not a number"));
    }
}
