//! Hosted Git provider API clients for GitFleet.
//!
//! This crate talks to provider REST APIs (GitHub today; GitLab and
//! BitBucket reserved) and returns typed domain records:
//!
//! - [`ProviderClient`]: the capability surface every provider implements
//! - [`GitHubClient`]: the GitHub REST API v3 implementation, with full
//!   `Link`-header pagination and enterprise base-URL support
//! - [`TokenManager`]: a pool of API tokens with per-token rate-limit
//!   accounting, round-robin rotation, and invalidation
//!
//! # Quick start
//!
//! ```no_run
//! use gitfleet_providers::{GitHubClient, ProviderClient, TokenManager};
//! use std::sync::Arc;
//!
//! # async fn run() -> gitfleet_core::Result<()> {
//! let tokens = Arc::new(TokenManager::new());
//! let client = GitHubClient::new("ghp_token")?.with_token_manager(Arc::clone(&tokens));
//!
//! if client.validate_credentials().await? {
//!     let repos = client.fetch_repositories("octocat").await?;
//!     println!("{} repositories", repos.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module structure
//!
//! - [`models`]: provider domain records
//! - [`client`]: the [`ProviderClient`] capability trait
//! - [`github`]: GitHub implementation
//! - [`token`]: token pooling and rotation
//! - [`config`]: HTTP timeouts and identification

pub mod client;
pub mod config;
pub mod error;
pub mod github;
pub mod models;
pub mod token;

pub use client::ProviderClient;
pub use config::HttpConfig;
pub use github::GitHubClient;
pub use models::{
    BranchInfo, ContributorInfo, ProviderKind, RateLimitInfo, RepoDetails, RepoInfo, UserInfo,
};
pub use token::{TokenInfo, TokenManager, TokenStatus};

pub use gitfleet_core::{Error, ErrorKind, Result};
