use thiserror::Error;

/// Failures a relay call can end in. The controller turns every variant into
/// a transcript entry; none of them are fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The server answered with a non-2xx status.
    #[error("HTTP error! status: {status}")]
    Transport { status: u16 },

    /// The request never got a response (refused connection, DNS, TLS...).
    #[error("Network error: {0}")]
    Network(String),

    /// A 2xx response whose body was not valid JSON.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Valid JSON, but not the shape the caller expected.
    #[error("Invalid response from server: {0}")]
    Protocol(String),

    /// The relay side dropped the call without answering.
    #[error("Relay unavailable")]
    BridgeClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_mentions_status() {
        let err = RelayError::Transport { status: 500 };
        assert_eq!(err.to_string(), "HTTP error! status: 500");
    }

    #[test]
    fn test_protocol_error_is_generic_invalid_response() {
        let err = RelayError::Protocol("missing field `choices`".to_string());
        assert!(err.to_string().starts_with("Invalid response from server"));
    }
}
