//! Error types for query-counter

use thiserror::Error;

/// Result type alias for counter operations
pub type CounterResult<T> = Result<T, CounterError>;

/// Error types raised by [`QueryCounter`](crate::QueryCounter)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    /// Attaching was attempted without a usable event source
    #[error("Failed to create listener - no session provided")]
    MissingSession,

    /// One or more statements repeated more often than the alert threshold.
    ///
    /// `message` holds the full report, one `Count: .. Query: ..` line per statement.
    #[error("QueryCounter:\n{message}")]
    QueryCountExceeded { message: String },
}

impl CounterError {
    /// Create a threshold error carrying a formatted report
    pub fn exceeded(message: impl Into<String>) -> Self {
        Self::QueryCountExceeded {
            message: message.into(),
        }
    }

    /// Check if this is a missing session error
    pub fn is_missing_session(&self) -> bool {
        matches!(self, Self::MissingSession)
    }

    /// Check if this is a threshold error
    pub fn is_query_count_exceeded(&self) -> bool {
        matches!(self, Self::QueryCountExceeded { .. })
    }

    /// The report carried by a threshold error
    pub fn report(&self) -> Option<&str> {
        match self {
            Self::QueryCountExceeded { message } => Some(message),
            Self::MissingSession => None,
        }
    }
}
