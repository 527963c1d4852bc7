// crates/integrity-observer-sources/src/github.rs
// ============================================================================
// Module: GitHub Commit Source
// Description: Commit-detail fetches against the GitHub REST API.
// Purpose: Issue bounded, authenticated GET requests for commit metadata.
// Dependencies: integrity-observer-core, integrity-observer-config, reqwest, url
// ============================================================================

//! ## Overview
//! [`GitHubCommitSource`] implements [`CommitSource`] with a blocking
//! `reqwest` client. It enforces scheme restrictions, an optional host
//! allowlist, disabled redirects, and a response size limit. The bearer token
//! is resolved once when the source is built and attached to every request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::io::Read;
use std::time::Duration;

use integrity_observer_config::GitHubConfig;
use integrity_observer_core::CommitSource;
use integrity_observer_core::FetchError;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Media type requested from the commit API.
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the GitHub commit source.
#[derive(Clone, PartialEq, Eq)]
pub struct GitHubSourceConfig {
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Optional host allowlist.
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// User agent string for outbound requests.
    pub user_agent: String,
    /// Bearer token; requests are unauthenticated when absent.
    pub token: Option<String>,
}

impl Default for GitHubSourceConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            timeout_ms: 5_000,
            max_response_bytes: 1024 * 1024,
            allowed_hosts: None,
            user_agent: "integrity-observer/0.1".to_string(),
            token: None,
        }
    }
}

impl GitHubSourceConfig {
    /// Builds source settings from the `[github]` config section, resolving
    /// the token from the environment.
    #[must_use]
    pub fn from_config(config: &GitHubConfig) -> Self {
        Self {
            allow_http: config.allow_http,
            timeout_ms: config.timeout_ms,
            max_response_bytes: config.max_response_bytes,
            allowed_hosts: config.allowed_hosts.clone(),
            user_agent: config.user_agent.clone(),
            token: config.resolve_token(),
        }
    }
}

impl fmt::Debug for GitHubSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubSourceConfig")
            .field("allow_http", &self.allow_http)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("user_agent", &self.user_agent)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// SECTION: Source Implementation
// ============================================================================

/// Commit source backed by the GitHub REST API.
#[derive(Debug)]
pub struct GitHubCommitSource {
    /// Source configuration, including limits and policy.
    config: GitHubSourceConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl GitHubCommitSource {
    /// Creates a new commit source with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the HTTP client cannot be created.
    pub fn new(config: GitHubSourceConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| FetchError::Transport("http client build failed".to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Returns true when requests carry a bearer token.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.config.token.is_some()
    }
}

impl CommitSource for GitHubCommitSource {
    fn fetch_commit(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let url = Url::parse(url).map_err(|err| FetchError::InvalidUrl(err.to_string()))?;
        validate_url(&url, &self.config)?;
        let mut request = self.client.get(url).header(ACCEPT, GITHUB_MEDIA_TYPE);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        let mut response = request.send().map_err(|err| {
            FetchError::Transport(if err.is_timeout() {
                "request timed out".to_string()
            } else {
                "http request failed".to_string()
            })
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        read_response_limited(&mut response, self.config.max_response_bytes)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates URL scheme and allowlist policy.
fn validate_url(url: &Url, config: &GitHubSourceConfig) -> Result<(), FetchError> {
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        scheme => {
            return Err(FetchError::InvalidUrl(format!("unsupported url scheme: {scheme}")));
        }
    }
    if let Some(allowlist) = &config.allowed_hosts {
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl("url host required".to_string()))?;
        if !allowlist.contains(host) {
            return Err(FetchError::InvalidUrl(format!("url host not allowed: {host}")));
        }
    }
    Ok(())
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, FetchError> {
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| FetchError::Transport("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(FetchError::TooLarge {
            max_bytes,
        });
    }
    let mut buf = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    let mut handle = response.take(limit);
    handle
        .read_to_end(&mut buf)
        .map_err(|_| FetchError::Transport("failed to read response".to_string()))?;
    if buf.len() > max_bytes {
        return Err(FetchError::TooLarge {
            max_bytes,
        });
    }
    if let Some(expected) = expected_len {
        let expected = usize::try_from(expected)
            .map_err(|_| FetchError::Transport("invalid response length".to_string()))?;
        if buf.len() < expected {
            return Err(FetchError::Transport("http response truncated".to_string()));
        }
    }
    Ok(buf)
}
