use std::time::Duration;

use thiserror::Error;

/// Failure of a single chain-client operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Connection refused/reset, HTTP 5xx or 429.
    #[error("transient transport failure: {0}")]
    Transient(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The node answered with a JSON-RPC error object.
    #[error("node error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// The reply could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The node answered, but the returned call data is not the expected ABI shape.
    #[error("undecodable call result: {0}")]
    CallResult(String),

    /// The request could not be built (bad endpoint URL, unencodable batch).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RpcError {
    /// Transient and timeout failures may succeed when repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RpcError::Transient(_) | RpcError::Timeout(_))
    }

    /// The node's message for protocol errors.
    pub fn node_message(&self) -> Option<&str> {
        match self {
            RpcError::Protocol { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(RpcError::Transient("reset".into()).is_retryable());
        assert!(RpcError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!RpcError::Protocol { code: -32000, message: "nonce too low".into() }.is_retryable());
        assert!(!RpcError::InvalidResponse("eof".into()).is_retryable());
        assert!(!RpcError::InvalidRequest("bad url".into()).is_retryable());
        assert!(!RpcError::CallResult("short".into()).is_retryable());
    }

    #[test]
    fn display_protocol() {
        let err = RpcError::Protocol { code: -32000, message: "already known".into() };
        assert_eq!(err.to_string(), "node error -32000: already known");
        assert_eq!(err.node_message(), Some("already known"));
    }

    #[test]
    fn display_timeout() {
        let err = RpcError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "request timed out after 1.5s");
    }
}
