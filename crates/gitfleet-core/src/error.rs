//! The GitFleet error taxonomy.
//!
//! Nine kinds cover every failure the workspace can surface. Display output
//! is one line and starts with the kind name; anything multi-line coming
//! from lower layers is flattened before it gets here.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a GitFleet failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid or expired credentials.
    AuthenticationFailure,
    /// An API token ran out of quota.
    RateLimitExceeded,
    /// The requested resource does not exist.
    NotFound,
    /// Network, TLS, or DNS failure.
    TransportFailure,
    /// The remote answered with an unexpected shape.
    ProtocolFailure,
    /// Not a repository, or the history is unreadable.
    RepositoryFailure,
    /// Permission or I/O failure on the local filesystem.
    FilesystemFailure,
    /// The operation was cancelled before completing.
    Cancelled,
    /// An internal invariant was broken. Always a bug.
    InvariantViolation,
}

impl ErrorKind {
    /// The kind name as it appears at the start of error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailure => "AuthenticationFailure",
            Self::RateLimitExceeded => "RateLimitExceeded",
            Self::NotFound => "NotFound",
            Self::TransportFailure => "TransportFailure",
            Self::ProtocolFailure => "ProtocolFailure",
            Self::RepositoryFailure => "RepositoryFailure",
            Self::FilesystemFailure => "FilesystemFailure",
            Self::Cancelled => "Cancelled",
            Self::InvariantViolation => "InvariantViolation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workspace-wide error type.
///
/// Carries a kind plus a single-line message; the rate-limit kind also
/// carries the epoch second at which quota returns.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Invalid or expired credentials.
    #[error("AuthenticationFailure: {message}")]
    Authentication {
        /// Failure detail.
        message: String,
    },

    /// Out of API quota.
    #[error("RateLimitExceeded: {message} (resets at {reset_time})")]
    RateLimit {
        /// Failure detail.
        message: String,
        /// Epoch seconds at which the limit resets.
        reset_time: i64,
    },

    /// Resource absent.
    #[error("NotFound: {message}")]
    NotFound {
        /// What was missing.
        message: String,
    },

    /// Network, TLS, or DNS failure.
    #[error("TransportFailure: {message}")]
    Transport {
        /// Failure detail.
        message: String,
    },

    /// Response had an unexpected shape.
    #[error("ProtocolFailure: {message}")]
    Protocol {
        /// Failure detail.
        message: String,
    },

    /// Not a repository, or corrupted history.
    #[error("RepositoryFailure: {message}")]
    Repository {
        /// Failure detail.
        message: String,
    },

    /// Local filesystem failure.
    #[error("FilesystemFailure: {message}")]
    Filesystem {
        /// Failure detail.
        message: String,
    },

    /// Operation cancelled.
    #[error("Cancelled: {message}")]
    Cancelled {
        /// What was cancelled.
        message: String,
    },

    /// Broken internal invariant.
    #[error("InvariantViolation: {message}")]
    Invariant {
        /// Which invariant broke.
        message: String,
    },
}

impl Error {
    /// Create an authentication failure.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: single_line(message.into()),
        }
    }

    /// Create a rate-limit failure carrying the reset epoch.
    #[must_use]
    pub fn rate_limit(message: impl Into<String>, reset_time: i64) -> Self {
        Self::RateLimit {
            message: single_line(message.into()),
            reset_time,
        }
    }

    /// Create a not-found failure.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: single_line(message.into()),
        }
    }

    /// Create a transport failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: single_line(message.into()),
        }
    }

    /// Create a protocol failure.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: single_line(message.into()),
        }
    }

    /// Create a repository failure.
    #[must_use]
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: single_line(message.into()),
        }
    }

    /// Create a filesystem failure.
    #[must_use]
    pub fn filesystem(message: impl Into<String>) -> Self {
        Self::Filesystem {
            message: single_line(message.into()),
        }
    }

    /// Create a cancellation marker.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: single_line(message.into()),
        }
    }

    /// Create an invariant violation. These indicate bugs, never user error.
    #[must_use]
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: single_line(message.into()),
        }
    }

    /// The kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::AuthenticationFailure,
            Self::RateLimit { .. } => ErrorKind::RateLimitExceeded,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Transport { .. } => ErrorKind::TransportFailure,
            Self::Protocol { .. } => ErrorKind::ProtocolFailure,
            Self::Repository { .. } => ErrorKind::RepositoryFailure,
            Self::Filesystem { .. } => ErrorKind::FilesystemFailure,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Invariant { .. } => ErrorKind::InvariantViolation,
        }
    }

    /// Check if this is an authentication failure.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Check if this is a not-found failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a rate-limit failure.
    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }

    /// Check if the operation was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The epoch second at which a rate limit resets, if applicable.
    #[must_use]
    pub const fn rate_limit_reset(&self) -> Option<i64> {
        match self {
            Self::RateLimit { reset_time, .. } => Some(*reset_time),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::filesystem(err.to_string())
    }
}

/// Collapse a message to one line.
fn single_line(message: String) -> String {
    if message.contains('\n') {
        message
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("; ")
    } else {
        message
    }
}

/// Result type for GitFleet operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages_start_with_kind_name() {
        let cases: Vec<(Error, &str)> = vec![
            (Error::authentication("bad token"), "AuthenticationFailure"),
            (Error::rate_limit("core quota", 99), "RateLimitExceeded"),
            (Error::not_found("repo x"), "NotFound"),
            (Error::transport("dns"), "TransportFailure"),
            (Error::protocol("missing field"), "ProtocolFailure"),
            (Error::repository("not a repo"), "RepositoryFailure"),
            (Error::filesystem("denied"), "FilesystemFailure"),
            (Error::cancelled("clone"), "Cancelled"),
            (Error::invariant("bad transition"), "InvariantViolation"),
        ];

        for (err, prefix) in cases {
            let rendered = err.to_string();
            assert!(
                rendered.starts_with(prefix),
                "{rendered:?} does not start with {prefix}"
            );
            assert_eq!(err.kind().as_str(), prefix);
            assert!(!rendered.contains('\n'));
        }
    }

    #[test]
    fn multiline_messages_are_flattened() {
        let err = Error::repository("line one\n  line two\n\nline three");
        assert_eq!(
            err.to_string(),
            "RepositoryFailure: line one; line two; line three"
        );
    }

    #[test]
    fn rate_limit_carries_reset() {
        let err = Error::rate_limit("exceeded", 1_700_000_000);
        assert_eq!(err.rate_limit_reset(), Some(1_700_000_000));
        assert!(err.is_rate_limit());
        assert!(!err.is_auth());
    }

    #[test]
    fn io_error_maps_to_filesystem() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::from(io);
        assert_eq!(err.kind(), ErrorKind::FilesystemFailure);
    }
}
