// crates/integrity-observer-core/tests/resolver.rs
// ============================================================================
// Module: Commit Resolver Tests
// Description: Commit-detail parsing, cache de-duplication, history reuse.
// Purpose: Ensure each (repository, commit) is fetched at most once per cycle.
// Dependencies: integrity-observer-core, serde_json
// ============================================================================

//! ## Overview
//! Drives [`CommitResolver`] against a counting in-memory source, including
//! concurrent resolution of the same commit from several threads.

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

mod common;

use std::sync::Arc;

use integrity_observer_core::CommitCache;
use integrity_observer_core::CommitDetail;
use integrity_observer_core::CommitRef;
use integrity_observer_core::CommitResolver;
use integrity_observer_core::FetchError;
use integrity_observer_core::ManifestProvenanceInfo;
use integrity_observer_core::ManifestProvenanceResult;
use integrity_observer_core::ObservationHistory;
use integrity_observer_core::ObservationResult;
use integrity_observer_core::ResolutionFailure;
use integrity_observer_core::ResourceIdentity;
use integrity_observer_core::commit_detail_url;
use integrity_observer_core::parse_commit_detail;
use integrity_observer_core::resolve_parents;
use serde_json::json;

use crate::common::CountingSource;
use crate::common::commit_body;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const REPO: &str = "https://github.com/acme/app.git";
const DATE: &str = "2024-01-02T03:04:05Z";

fn info(commit: &str) -> ManifestProvenanceInfo {
    ManifestProvenanceInfo {
        artifact: "ghcr.io/acme/app-manifests:1.0.0".to_string(),
        commit_id: commit.to_string(),
        repo_url: REPO.to_string(),
        commit_detail_url: commit_detail_url(REPO, commit),
        content_hash: "sha256:9f2c".to_string(),
    }
}

fn source_with(commit: &str, body: Vec<u8>) -> Arc<CountingSource> {
    let source = Arc::new(CountingSource::default());
    source.respond(&commit_detail_url(REPO, commit), Ok(body));
    source
}

fn default_body() -> Vec<u8> {
    commit_body(json!("dev@acme.io"), DATE, Some(json!([{"filename": "deploy/web.yaml"}])))
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn parse_commit_detail_reads_author_and_files() {
    let detail = parse_commit_detail(&default_body(), "abc123").unwrap();

    assert_eq!(detail.commit_id, "abc123");
    assert_eq!(detail.author_email, "dev@acme.io");
    assert_eq!(detail.commit_date, DATE);
    assert_eq!(detail.changed_files, vec!["deploy/web.yaml".to_string()]);
    assert!(detail.parents.is_empty());
}

#[test]
fn missing_files_yield_empty_changed_files() {
    let detail = parse_commit_detail(&commit_body(json!("dev@acme.io"), DATE, None), "abc123")
        .unwrap();

    assert!(detail.changed_files.is_empty());
}

#[test]
fn null_email_yields_empty_author_email() {
    let detail = parse_commit_detail(&commit_body(json!(null), DATE, None), "abc123").unwrap();

    assert_eq!(detail.author_email, "");
}

#[test]
fn malformed_file_entries_are_skipped() {
    let body = commit_body(
        json!("dev@acme.io"),
        DATE,
        Some(json!([{"filename": "a.yaml"}, {"status": "added"}, 7, {"filename": "b.yaml"}])),
    );

    let detail = parse_commit_detail(&body, "abc123").unwrap();

    assert_eq!(detail.changed_files, vec!["a.yaml".to_string(), "b.yaml".to_string()]);
}

#[test]
fn non_array_files_yield_empty_changed_files() {
    let body = commit_body(json!("dev@acme.io"), DATE, Some(json!("deploy/web.yaml")));

    assert!(parse_commit_detail(&body, "abc123").unwrap().changed_files.is_empty());
}

#[test]
fn invalid_date_is_a_resolution_failure() {
    let result = parse_commit_detail(&commit_body(json!("dev@acme.io"), "yesterday", None), "abc");

    assert!(matches!(result, Err(ResolutionFailure::InvalidDate(_))));
}

#[test]
fn missing_author_and_bad_json_are_failures() {
    assert_eq!(
        parse_commit_detail(br#"{"sha": "abc"}"#, "abc"),
        Err(ResolutionFailure::MissingField("commit"))
    );
    assert_eq!(
        parse_commit_detail(br#"{"commit": {}}"#, "abc"),
        Err(ResolutionFailure::MissingField("commit.author"))
    );
    assert_eq!(
        parse_commit_detail(br#"{"commit": {"author": {"email": "a@b"}}}"#, "abc"),
        Err(ResolutionFailure::MissingField("commit.author.date"))
    );
    assert!(matches!(
        parse_commit_detail(b"<html>", "abc"),
        Err(ResolutionFailure::InvalidResponse(_))
    ));
}

#[test]
fn resolve_parents_is_best_effort() {
    let parents = resolve_parents(&default_body());

    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].commit, "p1");
    assert!(resolve_parents(b"not json").is_empty());
    assert!(resolve_parents(br#"{"parents": [{"sha": 1}]}"#).is_empty());
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

#[test]
fn resolve_merges_detail_with_parents() {
    let source = source_with("abc123", default_body());
    let resolver = CommitResolver::new(source.clone());
    let cache = CommitCache::new();

    let result = resolver.resolve(info("abc123"), &cache);

    assert!(result.is_resolved());
    assert_eq!(result.failure, None);
    let detail = result.detail.unwrap();
    assert_eq!(detail.author_email, "dev@acme.io");
    assert_eq!(detail.parents.len(), 1);
    assert_eq!(result.info, info("abc123"));
}

#[test]
fn same_commit_is_fetched_once_per_cache() {
    let source = source_with("abc123", default_body());
    let resolver = CommitResolver::new(source.clone());
    let cache = CommitCache::new();

    let first = resolver.resolve(info("abc123"), &cache);
    let second = resolver.resolve(info("abc123"), &cache);

    assert_eq!(source.calls(), 1);
    assert_eq!(first.detail, second.detail);
    assert_eq!(cache.len(), 1);
}

#[test]
fn new_cache_fetches_again() {
    let source = source_with("abc123", default_body());
    let resolver = CommitResolver::new(source.clone());

    let _ = resolver.resolve(info("abc123"), &CommitCache::new());
    let _ = resolver.resolve(info("abc123"), &CommitCache::new());

    assert_eq!(source.calls(), 2);
}

#[test]
fn concurrent_resolution_fetches_once() {
    let source = source_with("abc123", default_body());
    let resolver = CommitResolver::new(source.clone());
    let cache = CommitCache::new();

    let results: Vec<ManifestProvenanceResult> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0 .. 8)
            .map(|_| scope.spawn(|| resolver.resolve(info("abc123"), &cache)))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(source.calls(), 1);
    assert!(results.iter().all(|result| result.detail == results[0].detail));
    assert!(results[0].is_resolved());
}

#[test]
fn fetch_failure_is_recorded_on_the_entry_and_cached() {
    let source = Arc::new(CountingSource::default());
    source.respond(&commit_detail_url(REPO, "gone"), Err(FetchError::Status(404)));
    let resolver = CommitResolver::new(source.clone());
    let cache = CommitCache::new();

    let first = resolver.resolve(info("gone"), &cache);
    let second = resolver.resolve(info("gone"), &cache);

    assert!(!first.is_resolved());
    assert_eq!(first.failure.as_deref(), Some("commit api returned status 404"));
    assert_eq!(first, second);
    assert_eq!(source.calls(), 1);
}

#[test]
fn empty_commit_id_fails_without_fetching() {
    let source = Arc::new(CountingSource::default());
    let resolver = CommitResolver::new(source.clone());

    let result = resolver.resolve(info(""), &CommitCache::new());

    assert_eq!(result.failure, Some(ResolutionFailure::MissingCommitId.to_string()));
    assert_eq!(source.calls(), 0);
}

#[test]
fn one_failed_commit_does_not_affect_another() {
    let source = source_with("abc123", default_body());
    let resolver = CommitResolver::new(source.clone());
    let cache = CommitCache::new();

    let broken = resolver.resolve(info("def456"), &cache);
    let healthy = resolver.resolve(info("abc123"), &cache);

    assert!(!broken.is_resolved());
    assert!(healthy.is_resolved());
    assert_eq!(source.calls(), 2);
}

// ============================================================================
// SECTION: History Reuse
// ============================================================================

fn history_with(detail: CommitDetail) -> ObservationHistory {
    let mut result = ObservationResult::new(
        ResourceIdentity::new("Deployment", "default", "web"),
        json!({}),
    );
    result.provenance.push(ManifestProvenanceResult::resolved(info("abc123"), detail));
    let mut history = ObservationHistory::new();
    history.insert(result);
    history
}

#[test]
fn history_reuse_skips_fetch_for_resolved_commit() {
    let detail = parse_commit_detail(&default_body(), "abc123").unwrap();
    let source = Arc::new(CountingSource::default());
    let resolver = CommitResolver::new(source.clone())
        .with_history(Arc::new(history_with(detail.clone())));
    let cache = CommitCache::new();

    let result = resolver.resolve(info("abc123"), &cache);

    assert_eq!(result.detail, Some(detail));
    assert_eq!(source.calls(), 0);
    assert!(cache.get(&CommitRef::new(REPO, "abc123")).is_some());
}

#[test]
fn history_reuse_still_fetches_unknown_commits() {
    let detail = parse_commit_detail(&default_body(), "abc123").unwrap();
    let source = source_with("def456", default_body());
    let resolver =
        CommitResolver::new(source.clone()).with_history(Arc::new(history_with(detail)));

    let result = resolver.resolve(info("def456"), &CommitCache::new());

    assert!(result.is_resolved());
    assert_eq!(source.calls(), 1);
}
