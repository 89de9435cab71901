//! Concurrent Git clone fleet with blame and commit-history extraction.
//!
//! This crate manages a fleet of remote repositories end to end:
//!
//! - **Clone orchestration**: every URL gets an observable clone task that
//!   moves `Queued → Cloning(progress) → Completed | Failed`; clones run
//!   concurrently with a bounded worker pool and live transfer progress.
//! - **Blame**: bulk per-line attribution across many files of a cloned
//!   repository, tolerant of per-file failures.
//! - **History**: full commit extraction with per-commit line statistics
//!   against the first parent.
//! - **Lifecycle**: each completed clone owns a temp directory until
//!   `cleanup` removes it.
//!
//! # Quick start
//!
//! ```no_run
//! use gitfleet_repo::RepoManager;
//!
//! # async fn run() -> gitfleet_core::Result<()> {
//! let manager = RepoManager::new(
//!     ["https://github.com/rust-lang/log.git"],
//!     "octocat",
//!     "ghp_token",
//! );
//!
//! manager.clone_all().await?;
//!
//! for (url, task) in manager.fetch_clone_tasks().await {
//!     if let Some(path) = &task.temp_dir {
//!         let commits = manager.extract_commits(path).await?;
//!         println!("{url}: {} commits", commits.len());
//!     }
//! }
//!
//! manager.cleanup();
//! # Ok(())
//! # }
//! ```
//!
//! # Module structure
//!
//! - [`types`]: clone state machine and analysis records
//! - [`registry`]: the shared `url → CloneTask` map
//! - [`executor`]: concurrent clone execution over the registry
//! - [`blame`]: bulk per-line blame
//! - [`commits`]: commit-history extraction
//! - [`manager`]: the [`RepoManager`] façade

pub mod blame;
pub mod commits;
pub mod error;
pub mod executor;
pub mod manager;
pub mod registry;
pub mod types;

pub use blame::BlameEngine;
pub use commits::extract_commits;
pub use executor::CloneExecutor;
pub use manager::RepoManager;
pub use registry::CloneTaskRegistry;
pub use types::{
    BlameLine, BlameResult, CloneStatus, CloneTask, CommitRecord, FileBlame, GitCredentials,
};

pub use gitfleet_core::{Error, ErrorKind, Result};
