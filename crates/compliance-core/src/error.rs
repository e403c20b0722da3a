use thiserror::Error;

/// Result type alias for compliance agent operations
pub type Result<T> = std::result::Result<T, ComplianceError>;

/// Errors shared across the compliance agent crates
#[derive(Error, Debug)]
pub enum ComplianceError {
    /// Collector rejected the request with a client error (4xx)
    #[error("collector rejected request ({code}): {message}")]
    Rejected {
        /// HTTP status code
        code: u16,
        /// Error message from the collector
        message: String,
    },

    /// Collector returned a server error (5xx)
    #[error("collector error ({code}): {message}")]
    Server {
        /// HTTP status code
        code: u16,
        /// Error message from the collector
        message: String,
    },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Request timed out
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Connection failed
    #[error("connection failed: {0}")]
    Connection(String),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl ComplianceError {
    /// Returns true if the error is worth another delivery attempt
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Server { .. } | Self::Timeout(_) | Self::Connection(_) | Self::Http(_)
        )
    }

    /// Returns the HTTP status code if the collector answered
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } | Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}
