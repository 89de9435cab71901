//! Bulk per-line blame over a local repository.
//!
//! Files are blamed against HEAD on bounded-parallel blocking workers.
//! Each worker opens its own repository handle (`git2::Repository` is not
//! `Sync`). A file that cannot be blamed contributes an error string to the
//! result map; only failures that affect the whole repository fail the
//! call.

use crate::error::{classify_local, Result};
use crate::types::{BlameLine, BlameResult, FileBlame};
use git2::{BlameOptions, Repository};
use gitfleet_core::Error;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Parallel blame engine.
#[derive(Debug, Clone)]
pub struct BlameEngine {
    max_workers: usize,
}

impl Default for BlameEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BlameEngine {
    /// Create an engine with one worker per CPU.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_workers: num_cpus::get().max(1),
        }
    }

    /// Override the parallel worker bound.
    #[must_use]
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = max.max(1);
        self
    }

    /// Blame a set of files in one repository.
    ///
    /// The result maps each requested path to its blame lines or to a
    /// per-file error string. An empty `file_paths` returns an empty map
    /// without touching the repository. A `repo_path` that is not a
    /// readable repository fails the whole call.
    pub async fn bulk_blame(&self, repo_path: &Path, file_paths: Vec<String>) -> Result<BlameResult> {
        if file_paths.is_empty() {
            return Ok(HashMap::new());
        }

        // Open once up front so a bad repo path fails the call instead of
        // producing one error string per file.
        let root = repo_path.to_path_buf();
        let root = tokio::task::spawn_blocking(move || open_work_root(&root))
            .await
            .map_err(|err| Error::invariant(format!("blame probe did not finish: {err}")))??;

        debug!(repo = %root.display(), files = file_paths.len(), "bulk blame starting");

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut workers = JoinSet::new();
        for file_path in file_paths {
            let semaphore = Arc::clone(&semaphore);
            let root = root.clone();
            workers.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::cancelled("blame batch shut down"))?;
                let outcome = tokio::task::spawn_blocking(move || {
                    let blame = blame_file(&root, &file_path);
                    (file_path, blame)
                })
                .await
                .map_err(|err| Error::invariant(format!("blame worker did not finish: {err}")))?;
                Ok::<_, Error>(outcome)
            });
        }

        let mut results = HashMap::new();
        while let Some(joined) = workers.join_next().await {
            let (file_path, blame) = joined
                .map_err(|err| Error::invariant(format!("blame worker did not finish: {err}")))??;
            results.insert(file_path, blame);
        }
        Ok(results)
    }
}

/// Open the repository and resolve its canonical working-directory root.
fn open_work_root(repo_path: &Path) -> Result<PathBuf> {
    let repo = Repository::open(repo_path).map_err(|err| classify_local(&err))?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| Error::repository("bare repository has no working tree to blame"))?;
    workdir
        .canonicalize()
        .map_err(|err| Error::filesystem(format!("cannot resolve repository root: {err}")))
}

/// Blame one file; all failures collapse to a single-line string.
fn blame_file(root: &Path, file_path: &str) -> FileBlame {
    let relative = safe_relative_path(root, file_path)?;

    let repo = Repository::open(root).map_err(|err| classify_local(&err).to_string())?;
    let head_tree = repo
        .head()
        .and_then(|head| head.peel_to_commit())
        .and_then(|commit| commit.tree())
        .map_err(|err| classify_local(&err).to_string())?;

    let entry = head_tree
        .get_path(&relative)
        .map_err(|_| format!("NotFound: {file_path} does not exist at HEAD"))?;
    let blob = repo
        .find_blob(entry.id())
        .map_err(|_| format!("NotFound: {file_path} is not a file at HEAD"))?;
    if blob.is_binary() {
        return Err(format!(
            "RepositoryFailure: {file_path} is binary and has no line attribution"
        ));
    }

    let mut options = BlameOptions::new();
    let blame = repo
        .blame_file(&relative, Some(&mut options))
        .map_err(|err| classify_local(&err).to_string())?;

    let content = String::from_utf8_lossy(blob.content()).into_owned();
    let mut lines = Vec::new();
    for (index, line_content) in content.lines().enumerate() {
        let final_line_no = index + 1;
        let hunk = blame.get_line(final_line_no).ok_or_else(|| {
            format!("RepositoryFailure: no blame hunk covers line {final_line_no} of {file_path}")
        })?;
        let offset = final_line_no - hunk.final_start_line();
        let signature = hunk.final_signature();
        lines.push(BlameLine {
            commit_id: hunk.final_commit_id().to_string(),
            author_name: String::from_utf8_lossy(signature.name_bytes()).into_owned(),
            author_email: String::from_utf8_lossy(signature.email_bytes()).into_owned(),
            orig_line_no: (hunk.orig_start_line() + offset) as u32,
            final_line_no: final_line_no as u32,
            line_content: line_content.to_string(),
        });
    }
    Ok(lines)
}

/// Validate that a requested path stays inside the repository root.
///
/// Rejects absolute paths and `..` components outright, then resolves
/// symlinks for paths that exist on disk and checks the real location too.
fn safe_relative_path(root: &Path, file_path: &str) -> std::result::Result<PathBuf, String> {
    let candidate = Path::new(file_path);
    if candidate.is_absolute() {
        return Err(format!(
            "FilesystemFailure: absolute path {file_path} is not inside the repository"
        ));
    }
    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(format!(
                    "FilesystemFailure: path {file_path} escapes the repository root"
                ));
            }
        }
    }

    let on_disk = root.join(candidate);
    if on_disk.exists() {
        let resolved = on_disk.canonicalize().map_err(|err| {
            format!("FilesystemFailure: cannot resolve {file_path}: {err}")
        })?;
        if !resolved.starts_with(root) {
            return Err(format!(
                "FilesystemFailure: path {file_path} escapes the repository root"
            ));
        }
    }
    Ok(candidate.to_path_buf())
}
