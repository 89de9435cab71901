//! Domain records returned by hosted-provider APIs.
//!
//! Every record carries the provider it came from and, where useful for
//! forward compatibility, the raw server payload. All records are flat
//! enough to drop into tabular form without touching `raw_data`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported hosted Git providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// github.com or GitHub Enterprise.
    GitHub,
    /// GitLab (reserved).
    GitLab,
    /// BitBucket (reserved).
    BitBucket,
}

impl ProviderKind {
    /// Lowercase provider name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::BitBucket => "bitbucket",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "gitlab" => Ok(Self::GitLab),
            "bitbucket" => Ok(Self::BitBucket),
            _ => Err(format!("unknown provider: {s}")),
        }
    }
}

/// A provider user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Provider-assigned id, stringified.
    pub id: String,
    /// Login handle.
    pub login: String,
    /// Display name, when public.
    pub name: Option<String>,
    /// Email, when public.
    pub email: Option<String>,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
    /// Which provider this account lives on.
    pub provider: ProviderKind,
    /// Raw server payload for forward compatibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
}

/// A repository as listed by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Short repository name.
    pub name: String,
    /// `owner/name` form.
    pub full_name: String,
    /// HTTPS clone URL.
    pub clone_url: String,
    /// Repository description.
    pub description: Option<String>,
    /// Default branch name.
    pub default_branch: String,
    /// Creation timestamp as reported by the provider.
    pub created_at: Option<String>,
    /// Last update timestamp as reported by the provider.
    pub updated_at: Option<String>,
    /// Dominant language.
    pub language: Option<String>,
    /// Whether this repository is a fork.
    pub fork: bool,
    /// Number of forks.
    pub forks_count: u64,
    /// Number of stars, when exposed.
    pub stargazers_count: Option<u64>,
    /// Which provider this repository lives on.
    pub provider: ProviderKind,
    /// `public`, `private`, or `internal`.
    pub visibility: String,
    /// Owning account.
    pub owner: Option<UserInfo>,
    /// Raw server payload for forward compatibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
}

/// Detailed repository view, a superset of [`RepoInfo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoDetails {
    /// The common listing fields.
    #[serde(flatten)]
    pub repo: RepoInfo,
    /// Repository topics.
    pub topics: Vec<String>,
    /// SPDX id or license name.
    pub license: Option<String>,
    /// Homepage URL.
    pub homepage: Option<String>,
    /// Whether the wiki is enabled.
    pub has_wiki: bool,
    /// Whether issues are enabled.
    pub has_issues: bool,
    /// Whether projects are enabled.
    pub has_projects: bool,
    /// Whether the repository is archived.
    pub archived: bool,
    /// Last push timestamp as reported by the provider.
    pub pushed_at: Option<String>,
    /// Repository size in kilobytes.
    pub size: u64,
}

/// Rate-limit accounting for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Epoch seconds at which the window resets.
    pub reset_time: i64,
    /// Requests used in the current window.
    pub used: u64,
    /// Which provider the limit applies to.
    pub provider: ProviderKind,
}

/// A branch as listed by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Branch name.
    pub name: String,
    /// Tip commit SHA.
    pub commit_sha: String,
    /// Whether branch protection is enabled.
    pub protected: bool,
    /// Which provider this branch lives on.
    pub provider: ProviderKind,
}

/// A repository contributor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorInfo {
    /// Provider-assigned id, stringified.
    pub id: String,
    /// Login handle.
    pub login: String,
    /// Commit count attributed to this contributor.
    pub contributions: u64,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
    /// Which provider this contributor lives on.
    pub provider: ProviderKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_round_trips_lowercase() {
        assert_eq!(ProviderKind::GitHub.as_str(), "github");
        assert_eq!("github".parse::<ProviderKind>().unwrap(), ProviderKind::GitHub);
        assert_eq!(
            "BitBucket".parse::<ProviderKind>().unwrap(),
            ProviderKind::BitBucket
        );
        assert!("sourcehut".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn repo_details_serializes_flat() {
        let details = RepoDetails {
            repo: RepoInfo {
                name: "fleet".to_string(),
                full_name: "acme/fleet".to_string(),
                clone_url: "https://github.com/acme/fleet.git".to_string(),
                description: None,
                default_branch: "main".to_string(),
                created_at: None,
                updated_at: None,
                language: Some("Rust".to_string()),
                fork: false,
                forks_count: 3,
                stargazers_count: Some(42),
                provider: ProviderKind::GitHub,
                visibility: "public".to_string(),
                owner: None,
                raw_data: None,
            },
            topics: vec!["git".to_string()],
            license: Some("MIT".to_string()),
            homepage: None,
            has_wiki: true,
            has_issues: true,
            has_projects: false,
            archived: false,
            pushed_at: None,
            size: 128,
        };

        let value = serde_json::to_value(&details).unwrap();
        // The nested RepoInfo flattens into the top-level object.
        assert_eq!(value["full_name"], "acme/fleet");
        assert_eq!(value["topics"][0], "git");
    }
}
