// crates/integrity-observer-config/src/config.rs
// ============================================================================
// Module: Integrity Observer Configuration
// Description: Configuration loading and validation for the observer.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: integrity-observer-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid configuration.
//! Invalid values fail closed with [`ConfigError::Invalid`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use integrity_observer_core::DEFAULT_CONTENT_MATCH_THRESHOLD;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "integrity-observer.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "INTEGRITY_OBSERVER_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default number of resources observed concurrently.
pub(crate) const DEFAULT_CONCURRENCY: usize = 8;
/// Maximum number of resources observed concurrently.
pub(crate) const MAX_CONCURRENCY: usize = 256;
/// Default cycle deadline in milliseconds.
pub(crate) const DEFAULT_DEADLINE_MS: u64 = 30_000;
/// Minimum cycle deadline in milliseconds.
pub(crate) const MIN_DEADLINE_MS: u64 = 100;
/// Maximum cycle deadline in milliseconds.
pub(crate) const MAX_DEADLINE_MS: u64 = 600_000;
/// Default interval between watch cycles in milliseconds.
pub(crate) const DEFAULT_INTERVAL_MS: u64 = 60_000;
/// Maximum interval between watch cycles in milliseconds.
pub(crate) const MAX_INTERVAL_MS: u64 = 86_400_000;
/// Default environment variable holding the commit API token.
pub(crate) const DEFAULT_TOKEN_ENV: &str = "GIT_TOKEN";
/// Default commit API request timeout in milliseconds.
pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 5_000;
/// Minimum commit API request timeout in milliseconds.
pub(crate) const MIN_TIMEOUT_MS: u64 = 100;
/// Maximum commit API request timeout in milliseconds.
pub(crate) const MAX_TIMEOUT_MS: u64 = 60_000;
/// Default maximum commit response size in bytes.
pub(crate) const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
/// Maximum allowed commit response size in bytes.
pub(crate) const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;
/// Default user agent for commit API requests.
pub(crate) const DEFAULT_USER_AGENT: &str = "integrity-observer/0.1";
/// Maximum number of allowlisted hosts.
pub(crate) const MAX_ALLOWED_HOSTS: usize = 64;
/// Default result document name.
pub(crate) const DEFAULT_OUTPUT_NAME: &str = "integrity-observer-results";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Integrity observer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Cycle sizing and timing.
    #[serde(default)]
    pub cycle: CycleConfig,
    /// Commit API client settings.
    #[serde(default)]
    pub github: GitHubConfig,
    /// Manifest locator settings.
    #[serde(default)]
    pub locator: LocatorConfig,
    /// Cross-cycle history settings.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Observer log settings.
    #[serde(default)]
    pub log: LogConfig,
    /// Result document settings.
    #[serde(default)]
    pub output: OutputConfig,
}

impl ObserverConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cycle.validate()?;
        self.github.validate()?;
        self.locator.validate()?;
        self.output.validate()?;
        Ok(())
    }
}

/// Cycle sizing and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Maximum number of resources observed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Wall-clock budget for one cycle in milliseconds.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Pause between cycles in watch mode, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            deadline_ms: default_deadline_ms(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl CycleConfig {
    /// Validates cycle bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Invalid(format!(
                "cycle.concurrency must be between 1 and {MAX_CONCURRENCY}"
            )));
        }
        if !(MIN_DEADLINE_MS ..= MAX_DEADLINE_MS).contains(&self.deadline_ms) {
            return Err(ConfigError::Invalid(format!(
                "cycle.deadline_ms must be between {MIN_DEADLINE_MS} and {MAX_DEADLINE_MS}"
            )));
        }
        if self.interval_ms == 0 || self.interval_ms > MAX_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "cycle.interval_ms must be between 1 and {MAX_INTERVAL_MS}"
            )));
        }
        Ok(())
    }
}

/// Commit API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow cleartext HTTP URLs.
    #[serde(default)]
    pub allow_http: bool,
    /// Optional host allowlist.
    #[serde(default)]
    pub allowed_hosts: Option<BTreeSet<String>>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            timeout_ms: default_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            user_agent: default_user_agent(),
            allow_http: false,
            allowed_hosts: None,
        }
    }
}

impl GitHubConfig {
    /// Reads the bearer token from the configured environment variable.
    ///
    /// Returns `None` when the variable is unset or empty; requests are then
    /// sent unauthenticated.
    #[must_use]
    pub fn resolve_token(&self) -> Option<String> {
        env::var(&self.token_env).ok().filter(|token| !token.trim().is_empty())
    }

    /// Validates client limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_env.trim().is_empty() {
            return Err(ConfigError::Invalid("github.token_env must be non-empty".to_string()));
        }
        if !(MIN_TIMEOUT_MS ..= MAX_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "github.timeout_ms must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}"
            )));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "github.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES}"
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("github.user_agent must be non-empty".to_string()));
        }
        if let Some(hosts) = &self.allowed_hosts {
            if hosts.len() > MAX_ALLOWED_HOSTS {
                return Err(ConfigError::Invalid(format!(
                    "github.allowed_hosts exceeds {MAX_ALLOWED_HOSTS} entries"
                )));
            }
            if hosts.iter().any(|host| host.trim().is_empty()) {
                return Err(ConfigError::Invalid(
                    "github.allowed_hosts entries must be non-empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Manifest locator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Locate manifests in bundles before resolving commits.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum content similarity for the content matcher.
    #[serde(default = "default_content_match_threshold")]
    pub content_match_threshold: f64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            content_match_threshold: default_content_match_threshold(),
        }
    }
}

impl LocatorConfig {
    /// Validates the similarity threshold.
    fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.content_match_threshold;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(ConfigError::Invalid(
                "locator.content_match_threshold must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cross-cycle history settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Reuse commit details resolved in the previous cycle instead of
    /// fetching them again.
    #[serde(default)]
    pub reuse_resolved_commits: bool,
}

/// Observer log settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Most verbose level emitted.
    #[serde(default)]
    pub level: LogLevel,
    /// Output encoding.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log severity, ordered from most to least severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Failures that stop an operation.
    Error,
    /// Degraded results.
    Warn,
    /// Cycle milestones.
    #[default]
    Info,
    /// Per-resource progress.
    Debug,
    /// Per-request detail.
    Trace,
}

impl LogLevel {
    /// Returns the lowercase label of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Returns true when an event at `level` passes this threshold.
    #[must_use]
    pub fn allows(self, level: Self) -> bool {
        level <= self
    }
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// One human-readable line per event.
    Text,
}

/// Result document settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination of the result document; stdout when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Document name recorded in the output.
    #[serde(default = "default_output_name")]
    pub name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            name: default_output_name(),
        }
    }
}

impl OutputConfig {
    /// Validates the output destination.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("output.name must be non-empty".to_string()));
        }
        if let Some(path) = &self.path {
            validate_path(path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Default concurrency.
const fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Default cycle deadline.
const fn default_deadline_ms() -> u64 {
    DEFAULT_DEADLINE_MS
}

/// Default watch interval.
const fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

/// Default token variable.
fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

/// Default request timeout.
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Default response size limit.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default user agent.
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Serde helper for fields defaulting to true.
const fn default_true() -> bool {
    true
}

/// Default similarity threshold.
const fn default_content_match_threshold() -> f64 {
    DEFAULT_CONTENT_MATCH_THRESHOLD
}

/// Default document name.
fn default_output_name() -> String {
    DEFAULT_OUTPUT_NAME.to_string()
}
