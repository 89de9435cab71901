//! Fixture repositories for fleet tests, built directly with git2.

use git2::{Oid, Repository, Signature, Time};
use std::fs;
use std::path::Path;

/// Initialize an empty fixture repository at `path`.
pub fn init_repo(path: &Path) -> Repository {
    Repository::init(path).expect("init fixture repository")
}

fn signature(when: i64) -> Signature<'static> {
    Signature::new("Fixture Author", "fixture@example.com", &Time::new(when, 0))
        .expect("fixture signature")
}

/// Write `content` to `name`, stage it, and commit it on HEAD.
pub fn commit_file(repo: &Repository, name: &str, content: &str, message: &str, when: i64) -> Oid {
    let workdir = repo.workdir().expect("fixture has a worktree");
    let file = workdir.join(name);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).expect("create fixture directories");
    }
    fs::write(&file, content).expect("write fixture file");

    let mut index = repo.index().expect("fixture index");
    index.add_path(Path::new(name)).expect("stage fixture file");
    index.write().expect("write fixture index");
    let tree_id = index.write_tree().expect("write fixture tree");
    let tree = repo.find_tree(tree_id).expect("find fixture tree");

    let sig = signature(when);
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .expect("create fixture commit")
}

/// Commit an exact tree built from `files`, with explicit parents.
///
/// Passing `None` for `update_ref` creates an anonymous commit (useful as
/// a side branch for merge fixtures).
pub fn commit_tree(
    repo: &Repository,
    update_ref: Option<&str>,
    parents: &[Oid],
    files: &[(&str, &str)],
    message: &str,
    when: i64,
) -> Oid {
    let mut builder = repo.treebuilder(None).expect("fixture tree builder");
    for (name, content) in files {
        let blob = repo.blob(content.as_bytes()).expect("fixture blob");
        builder
            .insert(name, blob, 0o100_644)
            .expect("insert fixture entry");
    }
    let tree = repo
        .find_tree(builder.write().expect("write fixture tree"))
        .expect("find fixture tree");

    let parent_commits: Vec<git2::Commit<'_>> = parents
        .iter()
        .map(|oid| repo.find_commit(*oid).expect("find fixture parent"))
        .collect();
    let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

    let sig = signature(when);
    repo.commit(update_ref, &sig, &sig, message, &tree, &parent_refs)
        .expect("create fixture commit")
}
