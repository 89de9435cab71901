//! Commit extraction and bulk blame against fixture repositories.

mod common;

use gitfleet_repo::{extract_commits, BlameEngine};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn linear_history_is_ordered_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear");
    let repo = common::init_repo(&path);

    let c1 = common::commit_file(&repo, "a.txt", "alpha\nbeta\n", "first", 1_000);
    let c2 = common::commit_file(&repo, "a.txt", "alpha\nbeta\ngamma\n", "second", 2_000);
    let c3 = common::commit_file(&repo, "b.txt", "one\n", "third", 3_000);

    let records = extract_commits(&path).await.unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].sha, c3.to_string());
    assert_eq!(records[1].sha, c2.to_string());
    assert_eq!(records[2].sha, c1.to_string());

    // Committer times never increase along the output.
    for pair in records.windows(2) {
        assert!(pair[0].committer_timestamp >= pair[1].committer_timestamp);
    }

    // SHAs are unique.
    let mut shas: Vec<_> = records.iter().map(|r| r.sha.clone()).collect();
    shas.sort();
    shas.dedup();
    assert_eq!(shas.len(), 3);

    for record in &records {
        assert_eq!(record.repo_name, "linear");
        assert_eq!(record.author_name, "Fixture Author");
        assert_eq!(record.author_email, "fixture@example.com");
        assert!(!record.is_merge);
    }
}

#[tokio::test]
async fn root_commit_diffs_against_the_empty_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("root");
    let repo = common::init_repo(&path);
    common::commit_file(&repo, "a.txt", "alpha\nbeta\n", "first", 1_000);

    let records = extract_commits(&path).await.unwrap();
    assert_eq!(records.len(), 1);
    // Two lines in the whole tree: two additions, nothing deleted.
    assert_eq!(records[0].additions + records[0].deletions, 2);
    assert_eq!(records[0].additions, 2);
    assert_eq!(records[0].deletions, 0);
}

#[tokio::test]
async fn equal_timestamps_break_ties_by_ascending_sha() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ties");
    let repo = common::init_repo(&path);

    let c1 = common::commit_file(&repo, "a.txt", "alpha\n", "first", 1_000);
    let c2 = common::commit_file(&repo, "a.txt", "alpha\nbeta\n", "second", 2_000);
    let c3 = common::commit_file(&repo, "b.txt", "one\n", "third", 2_000);

    let records = extract_commits(&path).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].sha, c1.to_string());

    let mut tied = vec![c2.to_string(), c3.to_string()];
    tied.sort();
    assert_eq!(records[0].sha, tied[0]);
    assert_eq!(records[1].sha, tied[1]);
}

#[tokio::test]
async fn merge_commit_uses_first_parent_stats() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("merged");
    let repo = common::init_repo(&path);

    let c1 = common::commit_file(&repo, "a.txt", "1\n", "first", 1_000);
    let side = common::commit_tree(
        &repo,
        None,
        &[c1],
        &[("a.txt", "1\n"), ("b.txt", "x\n")],
        "side work",
        1_500,
    );
    let c2 = common::commit_file(&repo, "a.txt", "1\n2\n", "second", 2_000);
    let merge = common::commit_tree(
        &repo,
        Some("HEAD"),
        &[c2, side],
        &[("a.txt", "1\n2\n"), ("b.txt", "x\n")],
        "merge side",
        3_000,
    );

    let records = extract_commits(&path).await.unwrap();
    assert_eq!(records.len(), 4);

    let merge_record = records
        .iter()
        .find(|r| r.sha == merge.to_string())
        .expect("merge commit present");
    assert!(merge_record.is_merge);
    // Versus the first parent, the merge only brings b.txt in.
    assert_eq!(merge_record.additions, 1);
    assert_eq!(merge_record.deletions, 0);
}

#[tokio::test]
async fn extract_commits_rejects_non_repositories() {
    let dir = tempfile::tempdir().unwrap();
    let err = extract_commits(dir.path()).await.unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[tokio::test]
async fn bulk_blame_mixes_successes_and_per_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blamed");
    let repo = common::init_repo(&path);

    let c1 = common::commit_file(&repo, "code.py", "alpha\nbeta\n", "first", 1_000);
    let c2 = common::commit_file(&repo, "code.py", "alpha\ngamma\n", "second", 2_000);

    let engine = BlameEngine::new();
    let results = engine
        .bulk_blame(
            &path,
            vec![
                "code.py".to_string(),
                "missing.py".to_string(),
                "../escape.py".to_string(),
            ],
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 3);

    let lines = results["code.py"].as_ref().expect("blame succeeds");
    assert_eq!(lines.len(), 2);

    assert_eq!(lines[0].final_line_no, 1);
    assert_eq!(lines[0].orig_line_no, 1);
    assert_eq!(lines[0].commit_id, c1.to_string());
    assert_eq!(lines[0].line_content, "alpha");
    assert_eq!(lines[0].author_name, "Fixture Author");

    assert_eq!(lines[1].final_line_no, 2);
    assert_eq!(lines[1].commit_id, c2.to_string());
    assert_eq!(lines[1].line_content, "gamma");

    let missing = results["missing.py"].as_ref().unwrap_err();
    assert!(missing.starts_with("NotFound"));

    let escape = results["../escape.py"].as_ref().unwrap_err();
    assert!(escape.starts_with("FilesystemFailure"));
}

#[tokio::test]
async fn bulk_blame_reports_binary_files_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binary");
    let repo = common::init_repo(&path);
    common::commit_tree(
        &repo,
        Some("HEAD"),
        &[],
        &[("blob.bin", "\u{0}\u{1}\u{2}binary")],
        "binary payload",
        1_000,
    );

    let engine = BlameEngine::new();
    let results = engine
        .bulk_blame(&path, vec!["blob.bin".to_string()])
        .await
        .unwrap();

    let err = results["blob.bin"].as_ref().unwrap_err();
    assert!(err.contains("binary"));
}

#[tokio::test]
async fn bulk_blame_empty_input_returns_empty_map() {
    let engine = BlameEngine::new();
    let results = engine
        .bulk_blame(std::path::Path::new("/nonexistent"), Vec::new())
        .await
        .unwrap();
    assert!(results.is_empty());
}
