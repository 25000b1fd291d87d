//! GitHub API client for fork-sync.
//!
//! This module provides direct GitHub REST API access for the handful of
//! endpoints the sync engine needs: listing repositories, fetching repository
//! detail, comparing refs, and the merge-upstream mutation.

use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use ureq::{Agent, Body, http::Response};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "fork-sync";
const PER_PAGE: usize = 100;
const AFFILIATION: &str = "owner,collaborator,organization_member";

// ============== Configuration Types ==============

/// GitHub client configuration
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub api_base: String,
    /// Per-request timeout; `None` waits forever.
    pub timeout: Option<Duration>,
}

// ============== API Response Types ==============

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Repository as returned by the listing endpoint (no parent linkage)
#[derive(Debug, Clone, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    #[serde(default)]
    pub fork: bool,
}

/// Full repository detail, including the parent of a fork
#[derive(Debug, Clone, Deserialize)]
pub struct RepoDetail {
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
    #[serde(default)]
    pub fork: bool,
    /// Only present on forks, and not always then.
    #[serde(default)]
    pub parent: Option<ParentRepo>,
    #[serde(default)]
    pub default_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentRepo {
    pub name: String,
    pub full_name: String,
    pub owner: Owner,
}

/// Result of comparing two refs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Comparison {
    pub ahead_by: u64,
    pub behind_by: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeUpstreamResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub merge_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthenticatedUser {
    login: String,
}

#[derive(Debug, Serialize)]
struct MergeUpstreamRequest<'a> {
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ============== Error Types ==============

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitHubError {
    #[error("No GitHub token configured")]
    NoToken,
    #[error("GitHub token is malformed")]
    MalformedToken,
    #[error("GitHub token is invalid or expired")]
    Unauthorized,
    #[error("GitHub API rate limited{}", .reset_at.map(|t| format!(" until {t}")).unwrap_or_default())]
    RateLimited { reset_at: Option<u64> },
    #[error("404 Not Found: {message}")]
    NotFound { message: String },
    #[error("409 Conflict: {message}")]
    Conflict { message: String },
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unexpected response from GitHub: {0}")]
    Decode(String),
}

impl From<ureq::Error> for GitHubError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::StatusCode(status) => {
                classify_status(status, format!("HTTP status {status}"), None, None)
            }
            other => GitHubError::Network(other.to_string()),
        }
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
pub fn classify_status(
    status: u16,
    message: String,
    rate_limit_remaining: Option<u64>,
    reset_at: Option<u64>,
) -> GitHubError {
    match status {
        401 => GitHubError::Unauthorized,
        403 if rate_limit_remaining == Some(0) => GitHubError::RateLimited { reset_at },
        429 => GitHubError::RateLimited { reset_at },
        404 => GitHubError::NotFound { message },
        409 => GitHubError::Conflict { message },
        _ => GitHubError::Api { status, message },
    }
}

/// Reject tokens that cannot possibly be valid before touching the network.
pub fn validate_token(token: &str) -> Result<(), GitHubError> {
    if token.is_empty() {
        return Err(GitHubError::NoToken);
    }
    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(GitHubError::MalformedToken);
    }
    Ok(())
}

/// Extract the `rel="next"` target from a `Link` response header.
pub fn next_page_url(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let (url, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim() == "rel=\"next\"");
        if !is_next {
            return None;
        }
        let url = url.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(url.to_string())
    })
}

// ============== Gateway Seam ==============

/// The remote operations the sync engine depends on.
///
/// `GitHubClient` talks to the real service; tests substitute an in-memory
/// double. Implementations are shared read-only across worker threads.
pub trait ForkGateway: Send + Sync {
    /// Every repository visible to the authenticated identity, all pages.
    fn list_repositories(&self) -> Result<Vec<RepoSummary>, GitHubError>;

    fn get_repository(&self, owner: &str, name: &str) -> Result<RepoDetail, GitHubError>;

    /// Compare `base...head` in the context of `owner/name`.
    fn compare_refs(
        &self,
        owner: &str,
        name: &str,
        base: &str,
        head: &str,
    ) -> Result<Comparison, GitHubError>;

    fn merge_upstream(
        &self,
        owner: &str,
        name: &str,
        branch: &str,
    ) -> Result<MergeUpstreamResponse, GitHubError>;
}

// ============== Client ==============

/// GitHub API client
pub struct GitHubClient {
    config: GitHubConfig,
    agent: Agent,
    login: String,
}

impl GitHubClient {
    /// Validate the token and resolve the identity that owns it.
    pub fn authenticate(config: GitHubConfig) -> Result<Self, GitHubError> {
        validate_token(&config.token)?;

        let agent_config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .user_agent(USER_AGENT)
            .build();
        let mut client = Self {
            agent: Agent::new_with_config(agent_config),
            config,
            login: String::new(),
        };

        let url = format!("{}/user", client.config.api_base);
        let user: AuthenticatedUser = read_json(client.get(&url)?)?;
        tracing::debug!("Authenticated as {}", user.login);
        client.login = user.login;
        Ok(client)
    }

    /// Login of the authenticated identity
    pub fn login(&self) -> &str {
        &self.login
    }

    fn get(&self, url: &str) -> Result<Response<Body>, GitHubError> {
        tracing::debug!("GET {}", url);
        let response = self
            .agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", self.config.token))
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .call()?;
        check_status(response)
    }

    fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<Response<Body>, GitHubError> {
        tracing::debug!("POST {}", url);
        let response = self
            .agent
            .post(url)
            .header("Authorization", &format!("Bearer {}", self.config.token))
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send_json(body)?;
        check_status(response)
    }
}

impl ForkGateway for GitHubClient {
    fn list_repositories(&self) -> Result<Vec<RepoSummary>, GitHubError> {
        let mut all_repos = Vec::new();
        let mut next = Some(format!(
            "{}/user/repos?per_page={}&visibility=all&affiliation={}",
            self.config.api_base, PER_PAGE, AFFILIATION
        ));

        while let Some(url) = next {
            let response = self.get(&url)?;
            next = response
                .headers()
                .get("link")
                .and_then(|value| value.to_str().ok())
                .and_then(next_page_url);
            let repos: Vec<RepoSummary> = read_json(response)?;
            all_repos.extend(repos);
        }

        tracing::info!("Found {} total repositories", all_repos.len());
        Ok(all_repos)
    }

    fn get_repository(&self, owner: &str, name: &str) -> Result<RepoDetail, GitHubError> {
        let url = format!("{}/repos/{}/{}", self.config.api_base, owner, name);
        read_json(self.get(&url)?)
    }

    fn compare_refs(
        &self,
        owner: &str,
        name: &str,
        base: &str,
        head: &str,
    ) -> Result<Comparison, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/compare/{}...{}",
            self.config.api_base, owner, name, base, head
        );
        read_json(self.get(&url)?)
    }

    fn merge_upstream(
        &self,
        owner: &str,
        name: &str,
        branch: &str,
    ) -> Result<MergeUpstreamResponse, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/merge-upstream",
            self.config.api_base, owner, name
        );
        read_json(self.post_json(&url, &MergeUpstreamRequest { branch })?)
    }
}

// ============== Helper Functions ==============

fn header_u64(response: &Response<Body>, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

fn check_status(mut response: Response<Body>) -> Result<Response<Body>, GitHubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let remaining = header_u64(&response, "x-ratelimit-remaining");
    let reset_at = header_u64(&response, "x-ratelimit-reset");
    let raw = response.body_mut().read_to_string().unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&raw)
        .map(|body| body.message)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or(raw)
        });

    Err(classify_status(status.as_u16(), message, remaining, reset_at))
}

fn read_json<T: DeserializeOwned>(mut response: Response<Body>) -> Result<T, GitHubError> {
    response
        .body_mut()
        .read_json()
        .map_err(|e| GitHubError::Decode(e.to_string()))
}
