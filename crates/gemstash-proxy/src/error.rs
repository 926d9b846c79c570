//! Proxy error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid gem id: {0:?}")]
    InvalidGemId(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    /// The upstream answered with a status outside the success range.
    #[error("Upstream returned error: {status} - {message}")]
    Upstream { status: u16, message: String },

    /// No connection could be established within the retry budget.
    #[error("Upstream connection failed: {0}")]
    Connection(String),

    #[error("Upstream transport error: {0}")]
    Transport(String),

    #[error("Incomplete download, only {actual} was downloaded out of {expected}")]
    IncompleteDownload { expected: u64, actual: u64 },
}

impl ProxyError {
    /// Status code a caller should relay to its own client.
    ///
    /// Only faults that originate upstream carry a code; local faults
    /// (bad configuration, truncated payloads) return `None`.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProxyError::Upstream { status, .. } => Some(*status),
            ProxyError::Connection(_) => Some(502),
            _ => None,
        }
    }

    /// Whether this fault was produced locally rather than by the upstream.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ProxyError::IncompleteDownload { .. }
                | ProxyError::InvalidUrl(_)
                | ProxyError::InvalidGemId(_)
                | ProxyError::Client(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = ProxyError::Upstream {
            status: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_local());

        let err = ProxyError::Connection("connection refused".to_string());
        assert_eq!(err.status(), Some(502));

        let err = ProxyError::IncompleteDownload {
            expected: 10,
            actual: 4,
        };
        assert_eq!(err.status(), None);
        assert!(err.is_local());
        assert_eq!(
            err.to_string(),
            "Incomplete download, only 4 was downloaded out of 10"
        );
    }
}
