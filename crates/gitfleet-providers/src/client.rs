//! The capability surface every hosted-provider client implements.

use crate::models::{
    BranchInfo, ContributorInfo, ProviderKind, RateLimitInfo, RepoDetails, RepoInfo, UserInfo,
};
use async_trait::async_trait;
use gitfleet_core::Result;

/// Typed operations against a hosted Git provider's REST API.
///
/// One implementation exists per provider; GitHub today, GitLab and
/// BitBucket reserved. All operations are cancel-safe: dropping the future
/// abandons the HTTP request without side effects beyond rate-limit
/// accounting already received.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// The provider this client talks to.
    fn provider(&self) -> ProviderKind;

    /// List repositories belonging to a user or organization.
    async fn fetch_repositories(&self, owner: &str) -> Result<Vec<RepoInfo>>;

    /// Describe the authenticated user.
    async fn fetch_user_info(&self) -> Result<UserInfo>;

    /// Current core rate-limit accounting for the active token.
    async fn get_rate_limit(&self) -> Result<RateLimitInfo>;

    /// Detailed view of one repository.
    async fn fetch_repository_details(&self, owner: &str, repo: &str) -> Result<RepoDetails>;

    /// List contributors of one repository.
    async fn fetch_contributors(&self, owner: &str, repo: &str) -> Result<Vec<ContributorInfo>>;

    /// List branches of one repository.
    async fn fetch_branches(&self, owner: &str, repo: &str) -> Result<Vec<BranchInfo>>;

    /// Whether the configured credentials are accepted.
    ///
    /// Defined as [`fetch_user_info`] succeeding: an authentication
    /// failure yields `Ok(false)`, every other failure propagates.
    ///
    /// [`fetch_user_info`]: Self::fetch_user_info
    async fn validate_credentials(&self) -> Result<bool> {
        match self.fetch_user_info().await {
            Ok(_) => Ok(true),
            Err(err) if err.is_auth() => Ok(false),
            Err(err) => Err(err),
        }
    }
}
