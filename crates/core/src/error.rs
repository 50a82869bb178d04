//! Error types for the relay core.

/// Errors produced while setting up or running a relayed call.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Failed to connect to the realtime service: {0}")]
    Connect(String),
    #[error("Failed to configure the realtime session: {0}")]
    Configure(String),
    #[error("Telephony connection error: {0}")]
    Telephony(String),
    #[error("Realtime connection error: {0}")]
    Realtime(String),
    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Call log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Call log is already closed")]
    LogClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_error_display() {
        let err = RelayError::Connect("refused".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to connect to the realtime service: refused"
        );

        let err = RelayError::LogClosed;
        assert_eq!(err.to_string(), "Call log is already closed");
    }

    #[test]
    fn test_relay_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: RelayError = json_err.into();
        assert!(matches!(err, RelayError::Json(_)));
    }
}
