// crates/integrity-observer-sources/tests/github_source.rs
// ============================================================================
// Module: GitHub Commit Source Tests
// Description: Request headers, status handling, and fetch policy.
// Purpose: Validate authenticated, bounded commit-detail fetches.
// Dependencies: integrity-observer-sources, integrity-observer-core, tiny_http
// ============================================================================

//! ## Overview
//! Runs the commit source against a local `tiny_http` server and checks:
//! - Bearer and accept headers are sent as configured.
//! - Non-success statuses map to [`FetchError::Status`].
//! - Scheme, allowlist, and size limits fail closed.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeSet;
use std::sync::mpsc;
use std::thread;

use integrity_observer_config::GitHubConfig;
use integrity_observer_core::CommitSource;
use integrity_observer_core::FetchError;
use integrity_observer_sources::GitHubCommitSource;
use integrity_observer_sources::GitHubSourceConfig;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// Headers observed by the local server.
#[derive(Debug, Default)]
struct SeenHeaders {
    /// Authorization header value, if sent.
    authorization: Option<String>,
    /// Accept header value, if sent.
    accept: Option<String>,
    /// Request path.
    path: String,
}

/// Creates a source allowed to reach the local server.
fn local_source(token: Option<&str>, max_response_bytes: usize) -> GitHubCommitSource {
    let mut allowed_hosts = BTreeSet::new();
    allowed_hosts.insert("127.0.0.1".to_string());
    GitHubCommitSource::new(GitHubSourceConfig {
        allow_http: true,
        allowed_hosts: Some(allowed_hosts),
        max_response_bytes,
        token: token.map(str::to_string),
        ..GitHubSourceConfig::default()
    })
    .unwrap()
}

/// Spawns a one-shot server answering with `body` and `status`.
fn spawn_server(
    body: String,
    status: u16,
) -> (String, mpsc::Receiver<SeenHeaders>, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://{addr}");
    let (sender, receiver) = mpsc::channel();

    let handle = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let header = |name: &'static str| {
                request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv(name))
                    .map(|header| header.value.as_str().to_string())
            };
            let seen = SeenHeaders {
                authorization: header("Authorization"),
                accept: header("Accept"),
                path: request.url().to_string(),
            };
            let _ = sender.send(seen);
            let response = Response::from_string(body).with_status_code(status);
            let _ = request.respond(response);
        }
    });

    (url, receiver, handle)
}

const COMMIT_JSON: &str =
    r#"{"sha":"abc123","commit":{"author":{"email":"dev@acme.io","date":"2024-01-02T03:04:05Z"}}}"#;

// ============================================================================
// SECTION: Happy Path
// ============================================================================

#[test]
fn fetch_returns_body_and_sends_bearer_token() {
    let (url, seen, handle) = spawn_server(COMMIT_JSON.to_string(), 200);
    let source = local_source(Some("s3cret"), 1024 * 1024);

    let body = source.fetch_commit(&format!("{url}/repos/acme/app/commits/abc123")).unwrap();

    assert_eq!(body, COMMIT_JSON.as_bytes());
    let seen = seen.recv().unwrap();
    assert_eq!(seen.authorization.as_deref(), Some("Bearer s3cret"));
    assert_eq!(seen.accept.as_deref(), Some("application/vnd.github+json"));
    assert_eq!(seen.path, "/repos/acme/app/commits/abc123");
    assert!(source.is_authenticated());
    handle.join().unwrap();
}

#[test]
fn fetch_without_token_sends_no_authorization() {
    let (url, seen, handle) = spawn_server(COMMIT_JSON.to_string(), 200);
    let source = local_source(None, 1024 * 1024);

    source.fetch_commit(&format!("{url}/repos/acme/app/commits/abc123")).unwrap();

    assert_eq!(seen.recv().unwrap().authorization, None);
    assert!(!source.is_authenticated());
    handle.join().unwrap();
}

// ============================================================================
// SECTION: Failure Handling
// ============================================================================

#[test]
fn non_success_status_is_reported() {
    let (url, _seen, handle) = spawn_server("{\"message\":\"Not Found\"}".to_string(), 404);
    let source = local_source(None, 1024 * 1024);

    let result = source.fetch_commit(&format!("{url}/repos/acme/app/commits/nope"));

    assert_eq!(result, Err(FetchError::Status(404)));
    handle.join().unwrap();
}

#[test]
fn rate_limited_status_is_reported() {
    let (url, _seen, handle) = spawn_server("{}".to_string(), 403);
    let source = local_source(None, 1024 * 1024);

    assert_eq!(source.fetch_commit(&url), Err(FetchError::Status(403)));
    handle.join().unwrap();
}

#[test]
fn oversized_response_is_rejected() {
    let (url, _seen, handle) = spawn_server("x".repeat(2048), 200);
    let source = local_source(None, 1024);

    let result = source.fetch_commit(&url);

    assert_eq!(
        result,
        Err(FetchError::TooLarge {
            max_bytes: 1024
        })
    );
    handle.join().unwrap();
}

#[test]
fn cleartext_http_is_rejected_by_default() {
    let source = GitHubCommitSource::new(GitHubSourceConfig::default()).unwrap();

    let result = source.fetch_commit("http://127.0.0.1:9/repos/acme/app/commits/abc");

    assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
}

#[test]
fn unlisted_host_is_rejected() {
    let source = local_source(None, 1024);

    let result = source.fetch_commit("http://api.github.com/repos/acme/app/commits/abc");

    assert!(matches!(result, Err(FetchError::InvalidUrl(message)) if message.contains("not allowed")));
}

#[test]
fn malformed_url_is_rejected() {
    let source = local_source(None, 1024);

    assert!(matches!(source.fetch_commit("not a url"), Err(FetchError::InvalidUrl(_))));
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

#[test]
fn source_config_copies_github_section() {
    let section = GitHubConfig {
        token_env: "INTEGRITY_OBSERVER_TEST_TOKEN_THAT_IS_NEVER_SET".to_string(),
        timeout_ms: 1_500,
        allow_http: true,
        ..GitHubConfig::default()
    };

    let config = GitHubSourceConfig::from_config(&section);

    assert_eq!(config.timeout_ms, 1_500);
    assert!(config.allow_http);
    assert_eq!(config.token, None);
}

#[test]
fn debug_output_redacts_token() {
    let config = GitHubSourceConfig {
        token: Some("s3cret".to_string()),
        ..GitHubSourceConfig::default()
    };

    let rendered = format!("{config:?}");

    assert!(!rendered.contains("s3cret"));
    assert!(rendered.contains("<redacted>"));
}
