//! Feed client error types.
//!
//! Error definitions with transient/permanent classification driving
//! the retry policy: transient failures are retried on the backoff
//! schedule, permanent ones fail the fetch immediately. In both cases
//! the caller receives an error value, never a panic, so a single OU's
//! outage cannot abort a whole sync run.

use thiserror::Error;

/// Error that can occur while fetching a roster feed.
#[derive(Debug, Error)]
pub enum FeedError {
    // Transient (retried)
    /// Request timed out.
    #[error("feed request timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Could not reach the feed endpoint.
    #[error("feed connection failed: {message}")]
    Connection { message: String },

    /// Upstream returned a server error.
    #[error("feed upstream error: HTTP {status}")]
    Upstream { status: u16 },

    /// Upstream is throttling us.
    #[error("feed rate limited: HTTP 429")]
    RateLimited,

    // Permanent (not retried)
    /// Credentials were rejected.
    #[error("feed authentication rejected: HTTP {status}")]
    AuthRejected { status: u16 },

    /// Request was rejected for a non-auth reason.
    #[error("feed request rejected: HTTP {status}")]
    Rejected { status: u16 },

    /// Response body was not a roster.
    #[error("malformed feed payload: {detail}")]
    MalformedPayload { detail: String },

    /// Retry schedule exhausted without a successful fetch.
    #[error("feed retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FeedError>,
    },

    /// Client configuration is invalid.
    #[error("invalid feed configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl FeedError {
    /// Whether the fetch should be retried on the backoff schedule.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedError::Timeout { .. }
                | FeedError::Connection { .. }
                | FeedError::Upstream { .. }
                | FeedError::RateLimited
        )
    }

    /// Whether retrying cannot help.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        FeedError::Connection {
            message: message.into(),
        }
    }

    /// Create a malformed-payload error.
    pub fn malformed(detail: impl Into<String>) -> Self {
        FeedError::MalformedPayload {
            detail: detail.into(),
        }
    }

    /// Create an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        FeedError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let transient = [
            FeedError::Timeout { timeout_secs: 30 },
            FeedError::connection("refused"),
            FeedError::Upstream { status: 503 },
            FeedError::RateLimited,
        ];
        for err in transient {
            assert!(err.is_transient(), "expected {err} to be transient");
        }
    }

    #[test]
    fn test_permanent_classification() {
        let permanent = [
            FeedError::AuthRejected { status: 401 },
            FeedError::Rejected { status: 404 },
            FeedError::malformed("not an array"),
            FeedError::invalid_config("bad url"),
            FeedError::RetriesExhausted {
                attempts: 3,
                last: Box::new(FeedError::Upstream { status: 500 }),
            },
        ];
        for err in permanent {
            assert!(err.is_permanent(), "expected {err} to be permanent");
        }
    }

    #[test]
    fn test_retries_exhausted_keeps_last_cause() {
        let err = FeedError::RetriesExhausted {
            attempts: 3,
            last: Box::new(FeedError::Upstream { status: 502 }),
        };
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "feed upstream error: HTTP 502");
    }
}
