//! The repository fleet façade.
//!
//! One `RepoManager` bundles the clone task registry, the clone executor,
//! the blame engine, and the commit extractor for a fixed set of URLs.
//! Every operation is safe to call concurrently from multiple tasks or
//! threads. Credentials live in memory for the manager's lifetime and are
//! never logged.

use crate::blame::BlameEngine;
use crate::executor::CloneExecutor;
use crate::registry::CloneTaskRegistry;
use crate::types::{BlameResult, CloneTask, CommitRecord, GitCredentials};
use crate::{commits, error::Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Manages a fleet of repositories: clone, observe, analyze, clean up.
#[derive(Debug)]
pub struct RepoManager {
    registry: Arc<CloneTaskRegistry>,
    executor: CloneExecutor,
    blame: BlameEngine,
}

impl RepoManager {
    /// Create a manager for a URL fleet with GitHub HTTPS credentials.
    #[must_use]
    pub fn new<I, S>(urls: I, github_username: &str, github_token: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(
            urls,
            Some(GitCredentials::new(github_username, github_token)),
        )
    }

    /// Create a manager without credentials, for public fleets.
    #[must_use]
    pub fn anonymous<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(urls, None)
    }

    fn build<I, S>(urls: I, credentials: Option<GitCredentials>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Arc::new(CloneTaskRegistry::new(urls));
        info!(count = registry.len(), "fleet manager created");
        Self {
            executor: CloneExecutor::new(Arc::clone(&registry), credentials),
            blame: BlameEngine::new(),
            registry,
        }
    }

    /// Clone every registered URL with bounded parallelism.
    ///
    /// Per-URL failures are recorded in the task state, not returned.
    pub async fn clone_all(&self) -> Result<()> {
        self.executor.clone_all().await
    }

    /// Clone one registered URL.
    ///
    /// A no-op for completed tasks; joins an in-flight clone of the same
    /// URL; retries failed tasks.
    pub async fn clone(&self, url: &str) -> Result<()> {
        self.executor.clone_repo(url).await
    }

    /// Snapshot of every clone task, keyed by URL.
    pub async fn fetch_clone_tasks(&self) -> HashMap<String, CloneTask> {
        self.registry.snapshot()
    }

    /// Blame a set of files in one local repository.
    pub async fn bulk_blame(
        &self,
        repo_path: &Path,
        file_paths: Vec<String>,
    ) -> Result<BlameResult> {
        self.blame.bulk_blame(repo_path, file_paths).await
    }

    /// Extract the full commit history of one local repository.
    pub async fn extract_commits(&self, repo_path: &Path) -> Result<Vec<CommitRecord>> {
        commits::extract_commits(repo_path).await
    }

    /// Remove every temp directory owned by the fleet.
    ///
    /// Returns one entry per task that had a directory to remove: `Ok(())`
    /// on success (the task's `temp_dir` is cleared), or a single-line
    /// error string. Safe to call repeatedly; later calls skip already
    /// cleaned tasks.
    pub fn cleanup(&self) -> HashMap<String, std::result::Result<(), String>> {
        let mut results = HashMap::new();
        for (url, task) in self.registry.snapshot() {
            let Some(temp_dir) = task.temp_dir else {
                continue;
            };
            match remove_dir(&temp_dir) {
                Ok(()) => {
                    // Registry errors here mean the task vanished, which
                    // cannot happen while we hold &self.
                    if let Err(err) = self.registry.clear_temp_dir(&url) {
                        results.insert(url, Err(err.to_string()));
                    } else {
                        results.insert(url, Ok(()));
                    }
                }
                Err(err) => {
                    warn!(url, temp_dir = %temp_dir.display(), error = %err, "cleanup failed");
                    results.insert(url, Err(err));
                }
            }
        }
        results
    }
}

fn remove_dir(path: &Path) -> std::result::Result<(), String> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        // Already gone counts as cleaned.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(format!(
            "FilesystemFailure: cannot remove {}: {err}",
            path.display()
        )),
    }
}

impl Drop for RepoManager {
    fn drop(&mut self) {
        let results = self.cleanup();
        if results.values().any(std::result::Result::is_err) {
            warn!("some temp directories could not be removed on drop");
        }
    }
}
