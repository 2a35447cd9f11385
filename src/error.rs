//! Error types for the fleet resource client
//!
//! Local pre-flight failures (unregistered kinds, bad arguments, read-only
//! rejections) are raised before any I/O. Remote failures are carried verbatim
//! as a [`Status`] so callers can match on the server's code.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Remote Status
// =============================================================================

/// Status codes reported by the resource-state service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Unknown,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    Unauthenticated,
    FailedPrecondition,
    Aborted,
    ResourceExhausted,
    Unavailable,
    DeadlineExceeded,
    Internal,
    Unimplemented,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Unknown => write!(f, "unknown"),
            Code::InvalidArgument => write!(f, "invalid_argument"),
            Code::NotFound => write!(f, "not_found"),
            Code::AlreadyExists => write!(f, "already_exists"),
            Code::PermissionDenied => write!(f, "permission_denied"),
            Code::Unauthenticated => write!(f, "unauthenticated"),
            Code::FailedPrecondition => write!(f, "failed_precondition"),
            Code::Aborted => write!(f, "aborted"),
            Code::ResourceExhausted => write!(f, "resource_exhausted"),
            Code::Unavailable => write!(f, "unavailable"),
            Code::DeadlineExceeded => write!(f, "deadline_exceeded"),
            Code::Internal => write!(f, "internal"),
            Code::Unimplemented => write!(f, "unimplemented"),
        }
    }
}

/// A status returned by the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(Code::Aborted, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

// =============================================================================
// Client Error
// =============================================================================

/// Unified error type for the client
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Local Pre-flight Errors
    // =========================================================================
    #[error("Resource kind not registered: {kind}")]
    NotRegistered { kind: &'static str },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation {operation} on {resource_type} rejected: client is in read-only mode")]
    ReadOnlyMode {
        operation: String,
        resource_type: String,
    },

    // =========================================================================
    // Call Lifecycle Errors
    // =========================================================================
    #[error("Deadline exceeded for {operation} after {timeout:?}")]
    DeadlineExceeded {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Call {operation} was cancelled")]
    Cancelled { operation: &'static str },

    // =========================================================================
    // Remote Errors
    // =========================================================================
    #[error("Remote error: {0}")]
    Remote(Status),

    // =========================================================================
    // Encoding Errors
    // =========================================================================
    #[error("Failed to parse {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("Failed to encode spec: {0}")]
    Encode(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Remote(status)
    }
}

impl Error {
    /// Remote status code, if this error came from the server
    pub fn code(&self) -> Option<Code> {
        match self {
            Error::Remote(status) => Some(status.code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(Code::NotFound)
    }

    pub fn is_already_exists(&self) -> bool {
        self.code() == Some(Code::AlreadyExists)
    }

    /// Stale optimistic-concurrency version
    pub fn is_conflict(&self) -> bool {
        matches!(self.code(), Some(Code::Aborted | Code::FailedPrecondition))
    }

    pub fn is_permission_denied(&self) -> bool {
        self.code() == Some(Code::PermissionDenied)
    }

    pub fn is_read_only_rejection(&self) -> bool {
        matches!(self, Error::ReadOnlyMode { .. })
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Error::DeadlineExceeded { .. } => true,
            Error::Remote(status) => matches!(
                status.code,
                Code::Unavailable | Code::DeadlineExceeded | Code::ResourceExhausted
            ),
            _ => false,
        }
    }

    /// Check if retrying the same call can succeed
    pub fn is_retryable(&self) -> bool {
        self.is_transient() || self.is_conflict()
    }

    pub(crate) fn parse(source_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Parse {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for the client
pub type Result<T> = std::result::Result<T, Error>;
