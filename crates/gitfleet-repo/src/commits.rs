//! Full-history commit extraction with first-parent line statistics.

use crate::error::{classify_local, Result};
use crate::types::CommitRecord;
use git2::{Commit, Diff, DiffOptions, Repository};
use gitfleet_core::Error;
use std::path::Path;
use tracing::debug;

/// Extract every commit reachable from HEAD.
///
/// Records come back in reverse chronological order of committer time,
/// ties broken by ascending SHA. Statistics are the diff against the first
/// parent; the root commit diffs against the empty tree; binary files
/// contribute zero lines; rename detection is off.
pub async fn extract_commits(repo_path: &Path) -> Result<Vec<CommitRecord>> {
    let repo_path = repo_path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_commits_blocking(&repo_path))
        .await
        .map_err(|err| Error::invariant(format!("commit extraction did not finish: {err}")))?
}

fn extract_commits_blocking(repo_path: &Path) -> Result<Vec<CommitRecord>> {
    let repo = Repository::open(repo_path).map_err(|err| classify_local(&err))?;
    let repo_name = repo_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut walk = repo.revwalk().map_err(|err| classify_local(&err))?;
    walk.push_head().map_err(|err| classify_local(&err))?;

    let mut records = Vec::new();
    for oid in walk {
        let oid = oid.map_err(|err| classify_local(&err))?;
        let commit = repo.find_commit(oid).map_err(|err| classify_local(&err))?;
        let (additions, deletions) = first_parent_stats(&repo, &commit)?;

        let author = commit.author();
        let committer = commit.committer();
        records.push(CommitRecord {
            sha: oid.to_string(),
            repo_name: repo_name.clone(),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            author_name: String::from_utf8_lossy(author.name_bytes()).into_owned(),
            author_email: String::from_utf8_lossy(author.email_bytes()).into_owned(),
            author_timestamp: author.when().seconds(),
            author_offset: author.when().offset_minutes(),
            committer_name: String::from_utf8_lossy(committer.name_bytes()).into_owned(),
            committer_email: String::from_utf8_lossy(committer.email_bytes()).into_owned(),
            committer_timestamp: committer.when().seconds(),
            committer_offset: committer.when().offset_minutes(),
            additions,
            deletions,
            is_merge: commit.parent_count() > 1,
        });
    }

    records.sort_by(|a, b| {
        b.committer_timestamp
            .cmp(&a.committer_timestamp)
            .then_with(|| a.sha.cmp(&b.sha))
    });

    debug!(repo = %repo_path.display(), commits = records.len(), "extracted history");
    Ok(records)
}

/// Line totals of the diff against the first parent (or the empty tree).
fn first_parent_stats(repo: &Repository, commit: &Commit<'_>) -> Result<(usize, usize)> {
    let tree = commit.tree().map_err(|err| classify_local(&err))?;
    let parent_tree = if commit.parent_count() > 0 {
        let parent = commit.parent(0).map_err(|err| classify_local(&err))?;
        Some(parent.tree().map_err(|err| classify_local(&err))?)
    } else {
        None
    };

    // No find_similar pass: rename detection stays off.
    let mut options = DiffOptions::new();
    let diff: Diff<'_> = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut options))
        .map_err(|err| classify_local(&err))?;
    let stats = diff.stats().map_err(|err| classify_local(&err))?;
    Ok((stats.insertions(), stats.deletions()))
}
