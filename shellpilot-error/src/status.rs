//! Error status - whether an error is worth retrying

use std::fmt;

/// How the error should be handled by the caller.
///
/// Status starts from the kind's default (see `ErrorKind::is_retryable`) and
/// can be overridden per error. `Persistent` marks a temporary error that
/// kept failing after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    /// The error is not going away; retrying will not help
    Permanent,
    /// The error is transient; a retry may succeed
    Temporary,
    /// The error was temporary but persisted through retries
    Persistent,
}

impl ErrorStatus {
    /// Check whether a retry could help
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorStatus::Temporary)
    }

    /// Transition a temporary status to persistent after failed retries
    pub fn persist(self) -> Self {
        match self {
            ErrorStatus::Temporary => ErrorStatus::Persistent,
            other => other,
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorStatus::Permanent => "permanent",
            ErrorStatus::Temporary => "temporary",
            ErrorStatus::Persistent => "persistent",
        };
        write!(f, "{}", s)
    }
}
