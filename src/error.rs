//! Error types for backend communication.

use thiserror::Error;

/// Errors produced by the backend client and the streaming session layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (connect, DNS, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned a non-success status
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The streaming response misbehaved in a way that is not an HTTP error
    #[error("stream error: {0}")]
    Stream(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ClientError::Server {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("500"));
        assert!(display.contains("Internal Server Error"));
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: ClientError = json_err.into();
        assert!(matches!(err, ClientError::Json(_)));
    }
}
