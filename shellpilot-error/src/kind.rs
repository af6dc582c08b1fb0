//! Error kinds for shellpilot operations

use std::fmt;

/// The kind of error that occurred.
///
/// This enum categorizes errors to help callers write clear handling logic.
/// The shell, the conversation loop, and the orchestrator all match on
/// ErrorKind to decide whether a failure is a usage problem, a missing
/// target, or a collaborator fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration or parameters
    ConfigInvalid,

    // =========================================================================
    // Caller errors
    // =========================================================================
    /// Missing or malformed command arguments
    UsageInvalid,

    /// Tool-call arguments failed to parse or failed schema validation
    ProtocolInvalid,

    // =========================================================================
    // Filesystem errors
    // =========================================================================
    /// The target path does not exist
    NotFound,

    /// Permission denied accessing the target
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    // =========================================================================
    // Subprocess errors
    // =========================================================================
    /// Subprocess exited non-zero or failed to launch
    SubprocessFailed,

    /// Operation exceeded its wall-clock bound
    Timeout,

    // =========================================================================
    // Network errors
    // =========================================================================
    /// Outbound request failed
    NetworkFailed,

    /// Rate limit exceeded
    RateLimited,

    /// Authentication failed
    AuthenticationFailed,

    // =========================================================================
    // Inference errors
    // =========================================================================
    /// The model collaborator failed to produce a completion
    InferenceFailed,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse input
    ParseFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",

            ErrorKind::UsageInvalid => "UsageInvalid",
            ErrorKind::ProtocolInvalid => "ProtocolInvalid",

            ErrorKind::NotFound => "NotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",

            ErrorKind::SubprocessFailed => "SubprocessFailed",
            ErrorKind::Timeout => "Timeout",

            ErrorKind::NetworkFailed => "NetworkFailed",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",

            ErrorKind::InferenceFailed => "InferenceFailed",

            ErrorKind::ParseFailed => "ParseFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::InferenceFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
