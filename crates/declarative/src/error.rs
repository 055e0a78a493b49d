//! Error types for reconciliation runs.
//!
//! Every failure aborts the run it happens in. Errors are categorized so the
//! CLI can report them consistently; none of them are retried internally.

use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid input combination.
    Config,
    /// A scope, resource or member lookup matched nothing.
    NotFound,
    /// The remote API (or one of its jobs) reported a failure.
    Remote,
    /// The current resource state forbids the requested transition.
    Conflict,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Invalid configuration",
            Self::NotFound => "Resource not found",
            Self::Remote => "Remote operation failed",
            Self::Conflict => "State conflict",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => "Check the declared fields and connection settings",
            Self::NotFound => "Verify names and ids, and the domain/account/project they live in",
            Self::Remote => "Inspect the error text returned by the cloud API",
            Self::Conflict => "Release whatever binds the resource before changing it",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during a reconciliation run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input combination, e.g. an account without a domain.
    #[error("configuration error: {0}")]
    Config(String),

    /// A lookup matched nothing.
    #[error("{0}")]
    NotFound(String),

    /// The API or a polled job returned an explicit error text.
    #[error("Failed: '{0}'")]
    RemoteOperation(String),

    /// The resource is in a state that forbids the transition.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// The request never produced an API response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be interpreted.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Create a not-found error for a named entity.
    pub fn not_found(kind: impl fmt::Display, name: impl fmt::Display) -> Self {
        Self::NotFound(format!("{kind} '{name}' not found"))
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,
            Error::NotFound(_) => ErrorCategory::NotFound,
            Error::RemoteOperation(_) | Error::Transport(_) | Error::InvalidResponse(_) => {
                ErrorCategory::Remote
            }
            Error::StateConflict(_) => ErrorCategory::Conflict,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}
