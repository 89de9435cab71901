//! GitHub REST API v3 client.
//!
//! Every request carries `Authorization: token <T>`, the v3 Accept header,
//! and the client-identifying User-Agent. List endpoints request
//! `per_page=100` and follow `Link: rel="next"` until exhausted. When a
//! [`TokenManager`] is attached, requests draw tokens from it and every
//! response's rate-limit headers flow back into the pool.

use crate::client::ProviderClient;
use crate::config::HttpConfig;
use crate::error::{body_excerpt, from_reqwest, Result};
use crate::models::{
    BranchInfo, ContributorInfo, ProviderKind, RateLimitInfo, RepoDetails, RepoInfo, UserInfo,
};
use crate::token::TokenManager;
use async_trait::async_trait;
use gitfleet_core::Error;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Public GitHub API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const ACCEPT_V3: &str = "application/vnd.github.v3+json";
const RATELIMIT_REMAINING: &str = "X-RateLimit-Remaining";
const RATELIMIT_RESET: &str = "X-RateLimit-Reset";

/// Typed client for the GitHub REST API.
pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
    token_manager: Option<Arc<TokenManager>>,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("token_manager", &self.token_manager.is_some())
            .finish()
    }
}

impl GitHubClient {
    /// Create a client for the public GitHub API with default timeouts.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_config(token, HttpConfig::default())
    }

    /// Create a client with explicit HTTP configuration.
    pub fn with_config(token: impl Into<String>, config: HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V3));

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|err| Error::transport(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token_manager: None,
        })
    }

    /// Point the client at a GitHub Enterprise deployment.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Attach a token manager. The client's own token joins the pool and
    /// requests rotate over whatever the pool offers.
    #[must_use]
    pub fn with_token_manager(mut self, manager: Arc<TokenManager>) -> Self {
        manager.add_token(self.token.clone(), ProviderKind::GitHub);
        self.token_manager = Some(manager);
        self
    }

    /// The base URL requests go to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&joined)
            .map_err(|err| Error::protocol(format!("invalid endpoint URL {joined}: {err}")))
    }

    /// Pick the token for the next request.
    fn pick_token(&self) -> String {
        self.token_manager
            .as_ref()
            .and_then(|manager| manager.get_next_available_token(ProviderKind::GitHub))
            .map_or_else(|| self.token.clone(), |info| info.token)
    }

    /// Push response rate-limit headers into the attached manager.
    fn record_rate_limit(&self, token: &str, headers: &HeaderMap) {
        let Some(manager) = self.token_manager.as_ref() else {
            return;
        };
        let remaining = header_u64(headers, RATELIMIT_REMAINING);
        let reset = header_u64(headers, RATELIMIT_RESET);
        if let (Some(remaining), Some(reset)) = (remaining, reset) {
            manager.update_rate_limit(
                token,
                ProviderKind::GitHub,
                remaining.min(u64::from(u32::MAX)) as u32,
                reset as i64,
            );
        }
    }

    /// Issue one authenticated GET and map non-success statuses.
    async fn send(&self, url: Url) -> Result<Response> {
        let token = self.pick_token();
        debug!(url = %url, "github request");

        let response = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, format!("token {token}"))
            .send()
            .await
            .map_err(|err| from_reqwest(&err))?;

        self.record_rate_limit(&token, response.headers());

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            if let Some(manager) = self.token_manager.as_ref() {
                warn!("github rejected a pooled token");
                manager.mark_token_invalid(&token, ProviderKind::GitHub);
            }
            return Err(Error::authentication("GitHub rejected the token (HTTP 401)"));
        }
        if status == StatusCode::FORBIDDEN && header_u64(response.headers(), RATELIMIT_REMAINING) == Some(0)
        {
            let reset = header_u64(response.headers(), RATELIMIT_RESET).unwrap_or(0) as i64;
            return Err(Error::rate_limit("GitHub rate limit exceeded", reset));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(format!("GitHub resource {}", url.path())));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::protocol(format!(
                "GitHub API returned HTTP {}: {}",
                status.as_u16(),
                body_excerpt(&body)
            )));
        }
        Ok(response)
    }

    /// GET one JSON document.
    async fn get_value(&self, path: &str) -> Result<Value> {
        let response = self.send(self.endpoint(path)?).await?;
        response
            .json()
            .await
            .map_err(|err| Error::protocol(format!("invalid JSON from GitHub: {err}")))
    }

    /// GET a list endpoint, following `Link: rel="next"` to the end.
    async fn get_list(&self, path: &str) -> Result<Vec<Value>> {
        let mut next = Some(self.endpoint(path)?);
        let mut items = Vec::new();
        while let Some(url) = next.take() {
            let response = self.send(url).await?;
            next = next_page(response.headers())?;
            let page: Value = response
                .json()
                .await
                .map_err(|err| Error::protocol(format!("invalid JSON from GitHub: {err}")))?;
            let Value::Array(mut page_items) = page else {
                return Err(Error::protocol("expected a JSON array from GitHub"));
            };
            items.append(&mut page_items);
        }
        Ok(items)
    }
}

#[async_trait]
impl ProviderClient for GitHubClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn fetch_repositories(&self, owner: &str) -> Result<Vec<RepoInfo>> {
        let items = self
            .get_list(&format!("users/{owner}/repos?per_page=100"))
            .await?;
        items.iter().map(parse_repo).collect()
    }

    async fn fetch_user_info(&self) -> Result<UserInfo> {
        let value = self.get_value("user").await?;
        parse_user(&value)
    }

    async fn get_rate_limit(&self) -> Result<RateLimitInfo> {
        let value = self.get_value("rate_limit").await?;
        let core = value
            .pointer("/resources/core")
            .ok_or_else(|| Error::protocol("rate limit payload is missing resources.core"))?;
        parse_rate_limit(core)
    }

    async fn fetch_repository_details(&self, owner: &str, repo: &str) -> Result<RepoDetails> {
        let value = self.get_value(&format!("repos/{owner}/{repo}")).await?;
        parse_repo_details(&value)
    }

    async fn fetch_contributors(&self, owner: &str, repo: &str) -> Result<Vec<ContributorInfo>> {
        let items = self
            .get_list(&format!("repos/{owner}/{repo}/contributors?per_page=100"))
            .await?;
        items.iter().map(parse_contributor).collect()
    }

    async fn fetch_branches(&self, owner: &str, repo: &str) -> Result<Vec<BranchInfo>> {
        let items = self
            .get_list(&format!("repos/{owner}/{repo}/branches?per_page=100"))
            .await?;
        items.iter().map(parse_branch).collect()
    }
}

/// Extract the `rel="next"` target from a Link header, if any.
fn next_page(headers: &HeaderMap) -> Result<Option<Url>> {
    let Some(link) = headers.get(LINK) else {
        return Ok(None);
    };
    let link = link
        .to_str()
        .map_err(|_| Error::protocol("Link header is not valid UTF-8"))?;

    for part in link.split(',') {
        let mut sections = part.split(';');
        let target = sections.next().unwrap_or_default().trim();
        let is_next = sections
            .any(|param| param.trim().eq_ignore_ascii_case(r#"rel="next""#));
        if !is_next {
            continue;
        }
        let target = target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .ok_or_else(|| Error::protocol(format!("malformed Link header segment: {part}")))?;
        let url = Url::parse(target)
            .map_err(|err| Error::protocol(format!("malformed Link target {target}: {err}")))?;
        return Ok(Some(url));
    }
    Ok(None)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn parse_user(value: &Value) -> Result<UserInfo> {
    Ok(UserInfo {
        id: required_id(value, "user")?,
        login: required_str(value, "login", "user")?,
        name: optional_str(value, "name"),
        email: optional_str(value, "email"),
        avatar_url: optional_str(value, "avatar_url"),
        provider: ProviderKind::GitHub,
        raw_data: Some(value.clone()),
    })
}

fn parse_repo(value: &Value) -> Result<RepoInfo> {
    let owner = match value.get("owner") {
        Some(owner_value) if !owner_value.is_null() => Some(parse_user(owner_value)?),
        _ => None,
    };
    Ok(RepoInfo {
        name: required_str(value, "name", "repository")?,
        full_name: required_str(value, "full_name", "repository")?,
        clone_url: required_str(value, "clone_url", "repository")?,
        description: optional_str(value, "description"),
        default_branch: string_or(value, "default_branch", "main"),
        created_at: optional_str(value, "created_at"),
        updated_at: optional_str(value, "updated_at"),
        language: optional_str(value, "language"),
        fork: bool_or(value, "fork", false),
        forks_count: u64_or(value, "forks_count", 0),
        stargazers_count: optional_u64(value, "stargazers_count"),
        provider: ProviderKind::GitHub,
        visibility: string_or(value, "visibility", "public"),
        owner,
        raw_data: Some(value.clone()),
    })
}

fn parse_repo_details(value: &Value) -> Result<RepoDetails> {
    let topics = value
        .get("topics")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default();
    let license = value
        .pointer("/license/spdx_id")
        .or_else(|| value.pointer("/license/name"))
        .and_then(Value::as_str)
        .map(ToString::to_string);

    Ok(RepoDetails {
        repo: parse_repo(value)?,
        topics,
        license,
        homepage: optional_str(value, "homepage"),
        has_wiki: bool_or(value, "has_wiki", false),
        has_issues: bool_or(value, "has_issues", false),
        has_projects: bool_or(value, "has_projects", false),
        archived: bool_or(value, "archived", false),
        pushed_at: optional_str(value, "pushed_at"),
        size: u64_or(value, "size", 0),
    })
}

fn parse_rate_limit(value: &Value) -> Result<RateLimitInfo> {
    Ok(RateLimitInfo {
        limit: required_u64(value, "limit", "rate limit")?,
        remaining: required_u64(value, "remaining", "rate limit")?,
        reset_time: required_u64(value, "reset", "rate limit")? as i64,
        used: required_u64(value, "used", "rate limit")?,
        provider: ProviderKind::GitHub,
    })
}

fn parse_branch(value: &Value) -> Result<BranchInfo> {
    let commit_sha = value
        .pointer("/commit/sha")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::protocol("missing required field commit.sha in branch payload"))?
        .to_string();
    Ok(BranchInfo {
        name: required_str(value, "name", "branch")?,
        commit_sha,
        protected: bool_or(value, "protected", false),
        provider: ProviderKind::GitHub,
    })
}

fn parse_contributor(value: &Value) -> Result<ContributorInfo> {
    Ok(ContributorInfo {
        id: required_id(value, "contributor")?,
        login: required_str(value, "login", "contributor")?,
        contributions: required_u64(value, "contributions", "contributor")?,
        avatar_url: optional_str(value, "avatar_url"),
        provider: ProviderKind::GitHub,
    })
}

/// GitHub ids are numbers; tolerate strings for enterprise proxies.
fn required_id(value: &Value, context: &str) -> Result<String> {
    match value.get("id") {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(Error::protocol(format!(
            "missing required field id in {context} payload"
        ))),
    }
}

fn required_str(value: &Value, key: &str, context: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            Error::protocol(format!("missing required field {key} in {context} payload"))
        })
}

fn required_u64(value: &Value, key: &str, context: &str) -> Result<u64> {
    value.get(key).and_then(Value::as_u64).ok_or_else(|| {
        Error::protocol(format!("missing required field {key} in {context} payload"))
    })
}

fn optional_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn optional_u64(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}

fn string_or(value: &Value, key: &str, default: &str) -> String {
    optional_str(value, key).unwrap_or_else(|| default.to_string())
}

fn bool_or(value: &Value, key: &str, default: bool) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn u64_or(value: &Value, key: &str, default: u64) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(default)
}
