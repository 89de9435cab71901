//! The clone task registry: the single source of truth for clone progress.
//!
//! One mutex guards the whole map. Holders never perform I/O under the
//! lock; every read hands out a deep copy so callers can never observe a
//! half-applied update.

use crate::types::{CloneStatus, CloneTask, MAX_PROGRESS};
use gitfleet_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Concurrent-safe `url → CloneTask` map with a monotone state machine.
#[derive(Debug, Default)]
pub struct CloneTaskRegistry {
    tasks: Mutex<HashMap<String, CloneTask>>,
}

impl CloneTaskRegistry {
    /// Create a registry with one `Queued` task per unique URL.
    ///
    /// Duplicate URLs collapse to a single entry; input order is not
    /// observable through the registry.
    #[must_use]
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tasks = urls
            .into_iter()
            .map(Into::into)
            .map(|url| (url.clone(), CloneTask::queued(url)))
            .collect();
        Self {
            tasks: Mutex::new(tasks),
        }
    }

    /// Deep-copy snapshot of every task.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, CloneTask> {
        self.tasks.lock().clone()
    }

    /// Deep copy of a single task.
    #[must_use]
    pub fn task(&self, url: &str) -> Option<CloneTask> {
        self.tasks.lock().get(url).cloned()
    }

    /// The registered URLs.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.tasks.lock().keys().cloned().collect()
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Move a task along the legal state order.
    ///
    /// Legal moves are `Queued → Cloning`, `Failed → Cloning` (retry),
    /// `Cloning → Cloning` with non-decreasing progress, and
    /// `Cloning → (Completed | Failed)`. Anything else is rejected as an
    /// [`Error::Invariant`], which indicates a bug in the caller.
    pub fn transition(&self, url: &str, next: CloneStatus) -> Result<()> {
        if let Some(progress) = next.progress()
            && progress > MAX_PROGRESS
        {
            return Err(Error::invariant(format!(
                "clone progress {progress} exceeds {MAX_PROGRESS} for {url}"
            )));
        }

        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(url)
            .ok_or_else(|| Error::invariant(format!("no clone task registered for {url}")))?;

        let legal = match (&task.status, &next) {
            (CloneStatus::Queued | CloneStatus::Failed { .. }, CloneStatus::Cloning { progress }) => {
                *progress == 0
            }
            (CloneStatus::Cloning { progress: old }, CloneStatus::Cloning { progress: new }) => {
                new >= old
            }
            (CloneStatus::Cloning { .. }, CloneStatus::Completed | CloneStatus::Failed { .. }) => {
                true
            }
            _ => false,
        };
        if !legal {
            return Err(Error::invariant(format!(
                "illegal clone transition for {url}: {} -> {}",
                task.status, next
            )));
        }

        debug!(url, from = %task.status, to = %next, "clone task transition");
        task.status = next;
        Ok(())
    }

    /// Complete a cloning task and record its temp directory in one step,
    /// so no snapshot can observe `Completed` without the directory.
    pub fn complete(&self, url: &str, temp_dir: PathBuf) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(url)
            .ok_or_else(|| Error::invariant(format!("no clone task registered for {url}")))?;

        if !matches!(task.status, CloneStatus::Cloning { .. }) {
            return Err(Error::invariant(format!(
                "illegal clone transition for {url}: {} -> completed",
                task.status
            )));
        }
        if task.temp_dir.is_some() {
            return Err(Error::invariant(format!(
                "temp directory already recorded for {url}"
            )));
        }

        debug!(url, temp_dir = %temp_dir.display(), "clone task completed");
        task.status = CloneStatus::Completed;
        task.temp_dir = Some(temp_dir);
        Ok(())
    }

    /// Drop a completed task's temp directory record, returning the path.
    ///
    /// Used by cleanup after the directory has been removed from disk.
    pub fn clear_temp_dir(&self, url: &str) -> Result<Option<PathBuf>> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(url)
            .ok_or_else(|| Error::invariant(format!("no clone task registered for {url}")))?;
        Ok(task.temp_dir.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> CloneTaskRegistry {
        CloneTaskRegistry::new(["https://x/a.git", "https://x/b.git"])
    }

    #[test]
    fn new_registers_unique_queued_tasks() {
        let registry = CloneTaskRegistry::new(["https://x/a.git", "https://x/a.git"]);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        let task = &snapshot["https://x/a.git"];
        assert_eq!(task.status, CloneStatus::Queued);
        assert_eq!(task.temp_dir, None);
    }

    #[test]
    fn legal_lifecycle() {
        let registry = registry();
        let url = "https://x/a.git";
        registry
            .transition(url, CloneStatus::Cloning { progress: 0 })
            .unwrap();
        registry
            .transition(url, CloneStatus::Cloning { progress: 40 })
            .unwrap();
        registry
            .transition(url, CloneStatus::Cloning { progress: 40 })
            .unwrap();
        registry.complete(url, PathBuf::from("/tmp/a")).unwrap();

        let task = registry.task(url).unwrap();
        assert_eq!(task.status, CloneStatus::Completed);
        assert_eq!(task.temp_dir, Some(PathBuf::from("/tmp/a")));
    }

    #[test]
    fn progress_cannot_decrease() {
        let registry = registry();
        let url = "https://x/a.git";
        registry
            .transition(url, CloneStatus::Cloning { progress: 0 })
            .unwrap();
        registry
            .transition(url, CloneStatus::Cloning { progress: 70 })
            .unwrap();
        let err = registry
            .transition(url, CloneStatus::Cloning { progress: 69 })
            .unwrap_err();
        assert_eq!(err.kind(), gitfleet_core::ErrorKind::InvariantViolation);
    }

    #[test]
    fn progress_cannot_exceed_bound() {
        let registry = registry();
        let err = registry
            .transition("https://x/a.git", CloneStatus::Cloning { progress: 101 })
            .unwrap_err();
        assert_eq!(err.kind(), gitfleet_core::ErrorKind::InvariantViolation);
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let registry = registry();
        let url = "https://x/a.git";
        registry
            .transition(url, CloneStatus::Cloning { progress: 0 })
            .unwrap();
        registry.complete(url, PathBuf::from("/tmp/a")).unwrap();

        assert!(registry
            .transition(url, CloneStatus::Cloning { progress: 0 })
            .is_err());
        assert!(registry
            .transition(url, CloneStatus::failed("late").unwrap())
            .is_err());
    }

    #[test]
    fn failed_task_may_retry() {
        let registry = registry();
        let url = "https://x/a.git";
        registry
            .transition(url, CloneStatus::Cloning { progress: 0 })
            .unwrap();
        registry
            .transition(url, CloneStatus::failed("network down").unwrap())
            .unwrap();
        registry
            .transition(url, CloneStatus::Cloning { progress: 0 })
            .unwrap();
        assert_eq!(
            registry.task(url).unwrap().status,
            CloneStatus::Cloning { progress: 0 }
        );
    }

    #[test]
    fn retry_must_restart_at_zero() {
        let registry = registry();
        let url = "https://x/a.git";
        assert!(registry
            .transition(url, CloneStatus::Cloning { progress: 10 })
            .is_err());
    }

    #[test]
    fn queued_cannot_jump_to_terminal() {
        let registry = registry();
        assert!(registry
            .transition("https://x/a.git", CloneStatus::failed("early").unwrap())
            .is_err());
        assert!(registry
            .complete("https://x/a.git", PathBuf::from("/tmp/a"))
            .is_err());
    }

    #[test]
    fn unknown_url_is_invariant_violation() {
        let registry = registry();
        let err = registry
            .transition("https://x/zzz.git", CloneStatus::Cloning { progress: 0 })
            .unwrap_err();
        assert_eq!(err.kind(), gitfleet_core::ErrorKind::InvariantViolation);
    }

    #[test]
    fn temp_dir_is_set_exactly_once() {
        let registry = registry();
        let url = "https://x/a.git";
        registry
            .transition(url, CloneStatus::Cloning { progress: 0 })
            .unwrap();
        registry.complete(url, PathBuf::from("/tmp/a")).unwrap();
        assert!(registry.complete(url, PathBuf::from("/tmp/b")).is_err());
    }

    #[test]
    fn clear_temp_dir_returns_previous_path() {
        let registry = registry();
        let url = "https://x/a.git";
        registry
            .transition(url, CloneStatus::Cloning { progress: 0 })
            .unwrap();
        registry.complete(url, PathBuf::from("/tmp/a")).unwrap();

        assert_eq!(
            registry.clear_temp_dir(url).unwrap(),
            Some(PathBuf::from("/tmp/a"))
        );
        assert_eq!(registry.clear_temp_dir(url).unwrap(), None);
        assert_eq!(registry.task(url).unwrap().temp_dir, None);
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let registry = registry();
        let mut snapshot = registry.snapshot();
        snapshot
            .get_mut("https://x/a.git")
            .unwrap()
            .temp_dir
            .replace(PathBuf::from("/tmp/elsewhere"));

        assert_eq!(registry.task("https://x/a.git").unwrap().temp_dir, None);
    }
}
