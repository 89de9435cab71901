//! Core fleet types: clone state machine, task records, analysis records.

use gitfleet_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Highest legal clone progress percentage.
pub const MAX_PROGRESS: u8 = 100;

/// Observable state of one clone attempt.
///
/// Legal transitions: `Queued → Cloning → (Completed | Failed)`,
/// `Cloning → Cloning` with non-decreasing progress, and `Failed → Cloning`
/// for a retry. The registry enforces the order; this type enforces field
/// validity when built from a flat record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StatusRecord", into = "StatusRecord")]
pub enum CloneStatus {
    /// Registered, clone not started.
    Queued,
    /// Transfer in flight; `progress` is a percentage in `[0, 100]`.
    Cloning {
        /// Objects-received percentage.
        progress: u8,
    },
    /// Clone finished; the owning task carries the temp directory.
    Completed,
    /// Clone ended in error.
    Failed {
        /// Single-line failure description.
        error: String,
    },
}

impl CloneStatus {
    /// Build a `Cloning` status, rejecting progress above 100.
    pub fn cloning(progress: u8) -> Result<Self> {
        if progress > MAX_PROGRESS {
            return Err(Error::invariant(format!(
                "clone progress {progress} exceeds {MAX_PROGRESS}"
            )));
        }
        Ok(Self::Cloning { progress })
    }

    /// Build a `Failed` status, rejecting empty messages.
    pub fn failed(error: impl Into<String>) -> Result<Self> {
        let error = error.into();
        if error.is_empty() {
            return Err(Error::invariant("failed status requires an error message"));
        }
        Ok(Self::Failed { error })
    }

    /// Build a status from a flat record: a kind tag plus optional fields.
    ///
    /// Rejects every combination other than the four legal ones, including
    /// a progress above 100 and auxiliary data on the wrong variant.
    pub fn from_parts(kind: &str, progress: Option<u8>, error: Option<&str>) -> Result<Self> {
        match (kind, progress, error) {
            ("queued", None, None) => Ok(Self::Queued),
            ("cloning", Some(p), None) => Self::cloning(p),
            ("completed", None, None) => Ok(Self::Completed),
            ("failed", None, Some(e)) => Self::failed(e),
            _ => Err(Error::invariant(format!(
                "illegal clone status record: kind={kind:?} progress={progress:?} error={}",
                error.map_or("none", |_| "set")
            ))),
        }
    }

    /// The kind tag used in flat records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Cloning { .. } => "cloning",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Progress percentage, present only while cloning.
    #[must_use]
    pub const fn progress(&self) -> Option<u8> {
        match self {
            Self::Cloning { progress } => Some(*progress),
            _ => None,
        }
    }

    /// Failure message, present only when failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Whether this state admits no further transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

impl fmt::Display for CloneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Cloning { progress } => write!(f, "cloning ({progress}%)"),
            Self::Completed => write!(f, "completed"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Flat serialization shape for [`CloneStatus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusRecord {
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TryFrom<StatusRecord> for CloneStatus {
    type Error = Error;

    fn try_from(record: StatusRecord) -> Result<Self> {
        Self::from_parts(&record.status, record.progress, record.error.as_deref())
    }
}

impl From<CloneStatus> for StatusRecord {
    fn from(status: CloneStatus) -> Self {
        Self {
            status: status.kind().to_string(),
            progress: status.progress(),
            error: status.error().map(ToString::to_string),
        }
    }
}

/// Durable record of one URL's clone attempt.
///
/// `url` is the registry key and never changes. `temp_dir` is set exactly
/// when the task completes and cleared by cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneTask {
    /// Remote repository URL.
    pub url: String,
    /// Current clone state.
    pub status: CloneStatus,
    /// Local working copy, owned by this task until cleanup.
    pub temp_dir: Option<PathBuf>,
}

impl CloneTask {
    /// Create a freshly queued task.
    #[must_use]
    pub fn queued(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: CloneStatus::Queued,
            temp_dir: None,
        }
    }
}

/// One line of blame attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameLine {
    /// Hex id of the commit that last touched the line.
    pub commit_id: String,
    /// Author name recorded on that commit.
    pub author_name: String,
    /// Author email recorded on that commit.
    pub author_email: String,
    /// Line number at the attributing commit (1-based).
    pub orig_line_no: u32,
    /// Line number in the blob at HEAD (1-based).
    pub final_line_no: u32,
    /// The line's content at HEAD, without the trailing newline.
    pub line_content: String,
}

/// Per-file blame outcome: ordered lines on success, a single-line message
/// on per-file failure.
pub type FileBlame = std::result::Result<Vec<BlameLine>, String>;

/// Bulk blame output, keyed by the file paths the caller passed in.
pub type BlameResult = HashMap<String, FileBlame>;

/// One commit of a repository's history with first-parent line statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full hex commit id.
    pub sha: String,
    /// Final path component of the repository the commit came from.
    pub repo_name: String,
    /// Full commit message.
    pub message: String,
    /// Author name.
    pub author_name: String,
    /// Author email.
    pub author_email: String,
    /// Author time in epoch seconds.
    pub author_timestamp: i64,
    /// Author timezone offset in minutes.
    pub author_offset: i32,
    /// Committer name.
    pub committer_name: String,
    /// Committer email.
    pub committer_email: String,
    /// Committer time in epoch seconds.
    pub committer_timestamp: i64,
    /// Committer timezone offset in minutes.
    pub committer_offset: i32,
    /// Lines added versus the first parent (empty tree for root commits).
    pub additions: usize,
    /// Lines deleted versus the first parent.
    pub deletions: usize,
    /// Whether the commit has more than one parent.
    pub is_merge: bool,
}

/// HTTPS credentials for the clone transport.
///
/// SSH URLs authenticate through the agent instead; these are only offered
/// to HTTPS remotes. The token never appears in `Debug` output or logs.
#[derive(Clone)]
pub struct GitCredentials {
    username: String,
    token: String,
}

impl GitCredentials {
    /// Create a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    /// The username half of the pair.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The token half of the pair.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitCredentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_parts_accepts_legal_records() {
        assert_eq!(
            CloneStatus::from_parts("queued", None, None).unwrap(),
            CloneStatus::Queued
        );
        assert_eq!(
            CloneStatus::from_parts("cloning", Some(42), None).unwrap(),
            CloneStatus::Cloning { progress: 42 }
        );
        assert_eq!(
            CloneStatus::from_parts("completed", None, None).unwrap(),
            CloneStatus::Completed
        );
        assert_eq!(
            CloneStatus::from_parts("failed", None, Some("boom")).unwrap(),
            CloneStatus::Failed {
                error: "boom".to_string()
            }
        );
    }

    #[test]
    fn from_parts_rejects_illegal_records() {
        // Wrong auxiliary data for the tag.
        assert!(CloneStatus::from_parts("queued", Some(1), None).is_err());
        assert!(CloneStatus::from_parts("cloning", None, None).is_err());
        assert!(CloneStatus::from_parts("cloning", Some(5), Some("x")).is_err());
        assert!(CloneStatus::from_parts("completed", None, Some("x")).is_err());
        assert!(CloneStatus::from_parts("failed", None, None).is_err());
        assert!(CloneStatus::from_parts("failed", Some(3), Some("x")).is_err());
        // Unknown tag.
        assert!(CloneStatus::from_parts("paused", None, None).is_err());
        // Out-of-range progress.
        assert!(CloneStatus::from_parts("cloning", Some(101), None).is_err());
        // Empty failure message.
        assert!(CloneStatus::from_parts("failed", None, Some("")).is_err());
    }

    #[test]
    fn cloning_bounds() {
        assert!(CloneStatus::cloning(0).is_ok());
        assert!(CloneStatus::cloning(100).is_ok());
        assert!(CloneStatus::cloning(101).is_err());
    }

    #[test]
    fn serde_round_trips_through_flat_record() {
        let status = CloneStatus::Cloning { progress: 61 };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"status":"cloning","progress":61}"#);
        let back: CloneStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn serde_rejects_invalid_flat_record() {
        let err = serde_json::from_str::<CloneStatus>(r#"{"status":"cloning","progress":120}"#);
        assert!(err.is_err());
        let err = serde_json::from_str::<CloneStatus>(r#"{"status":"completed","error":"x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn credentials_debug_redacts_token() {
        let creds = GitCredentials::new("octocat", "ghp_secret");
        let debug = format!("{creds:?}");
        assert!(debug.contains("octocat"));
        assert!(!debug.contains("ghp_secret"));
    }
}
