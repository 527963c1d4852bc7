// crates/integrity-observer-core/src/runtime/resolver.rs
// ============================================================================
// Module: Commit Resolver
// Description: Resolves provenance records into commit metadata.
// Purpose: Fetch, parse, and cache commit details once per cycle.
// Dependencies: crate::{core, interfaces}, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! [`CommitResolver`] merges a [`ManifestProvenanceInfo`] with the commit
//! metadata behind it. Lookups go through a cycle-local [`CommitCache`] keyed
//! by (repository, commit); the first caller for a key performs the fetch and
//! concurrent callers for the same key wait for that outcome instead of
//! issuing their own request.
//! Invariants:
//! - At most one fetch per (repository, commit) per cache.
//! - Failures are recorded on the affected entry only.
//! - Reuse of the previous cycle's history is opt-in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::PoisonError;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::CommitDetail;
use crate::core::CommitParent;
use crate::core::CommitRef;
use crate::core::ManifestProvenanceInfo;
use crate::core::ManifestProvenanceResult;
use crate::core::ObservationHistory;
use crate::interfaces::CommitSource;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Per-entry commit resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    /// Provenance record has no commit identifier.
    #[error("provenance material has no commit digest")]
    MissingCommitId,
    /// Request failed.
    #[error("{0}")]
    Fetch(String),
    /// Response body is not a commit document.
    #[error("invalid commit response: {0}")]
    InvalidResponse(String),
    /// Required field is absent.
    #[error("commit response is missing {0}")]
    MissingField(&'static str),
    /// Commit date is not RFC 3339.
    #[error("invalid commit date: {0}")]
    InvalidDate(String),
}

// ============================================================================
// SECTION: Commit Cache
// ============================================================================

/// Shared slot holding the single outcome for one cache key.
type CacheSlot = Arc<OnceLock<Result<CommitDetail, ResolutionFailure>>>;

/// Cycle-local commit cache safe for concurrent use.
#[derive(Debug, Default)]
pub struct CommitCache {
    /// Outcome slots keyed by commit reference.
    slots: Mutex<HashMap<CommitRef, CacheSlot>>,
}

impl CommitCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached outcome for `key`, if one was produced.
    #[must_use]
    pub fn get(&self, key: &CommitRef) -> Option<Result<CommitDetail, ResolutionFailure>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Returns the outcome for `key`, running `resolve` only if no outcome
    /// exists yet. Concurrent callers for one key block on the same slot.
    pub fn get_or_resolve(
        &self,
        key: &CommitRef,
        resolve: impl FnOnce() -> Result<CommitDetail, ResolutionFailure>,
    ) -> Result<CommitDetail, ResolutionFailure> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        slot.get_or_init(resolve).clone()
    }

    /// Returns the number of keys with a slot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no key has been requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves provenance records against a commit source.
#[derive(Clone)]
pub struct CommitResolver {
    /// Commit metadata source.
    source: Arc<dyn CommitSource>,
    /// Previous cycle's history consulted before fetching, when enabled.
    previous: Option<Arc<ObservationHistory>>,
}

impl CommitResolver {
    /// Creates a resolver that always fetches on a cache miss.
    #[must_use]
    pub fn new(source: Arc<dyn CommitSource>) -> Self {
        Self {
            source,
            previous: None,
        }
    }

    /// Enables reuse of commit details already resolved in `previous`.
    #[must_use]
    pub fn with_history(mut self, previous: Arc<ObservationHistory>) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Resolves one provenance record.
    ///
    /// Never fails: resolution errors are carried on the returned result.
    #[must_use]
    pub fn resolve(
        &self,
        info: ManifestProvenanceInfo,
        cache: &CommitCache,
    ) -> ManifestProvenanceResult {
        match self.resolve_detail(&info, cache) {
            Ok(detail) => ManifestProvenanceResult::resolved(info, detail),
            Err(failure) => ManifestProvenanceResult::failed(info, failure.to_string()),
        }
    }

    /// Resolves commit metadata through the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionFailure`] when the commit cannot be resolved.
    pub fn resolve_detail(
        &self,
        info: &ManifestProvenanceInfo,
        cache: &CommitCache,
    ) -> Result<CommitDetail, ResolutionFailure> {
        if info.commit_id.is_empty() {
            return Err(ResolutionFailure::MissingCommitId);
        }
        let key = CommitRef::new(&info.repo_url, &info.commit_id);
        cache.get_or_resolve(&key, || {
            if let Some(detail) = self.previous.as_ref().and_then(|prev| prev.find_resolved(&key))
            {
                return Ok(detail.clone());
            }
            let body = self
                .source
                .fetch_commit(&info.commit_detail_url)
                .map_err(|err| ResolutionFailure::Fetch(err.to_string()))?;
            let mut detail = parse_commit_detail(&body, &info.commit_id)?;
            detail.parents = resolve_parents(&body);
            Ok(detail)
        })
    }
}

// ============================================================================
// SECTION: Response Parsing
// ============================================================================

/// Typed view of a commit-detail response.
#[derive(Debug, Deserialize)]
struct CommitResponse {
    /// Git commit section.
    #[serde(default)]
    commit: Option<CommitSection>,
    /// Changed files; entries are validated individually.
    #[serde(default)]
    files: Option<Value>,
}

/// Git commit section of a commit-detail response.
#[derive(Debug, Deserialize)]
struct CommitSection {
    /// Author signature.
    #[serde(default)]
    author: Option<AuthorSection>,
}

/// Author signature of a commit.
#[derive(Debug, Deserialize)]
struct AuthorSection {
    /// Author email; may be null.
    #[serde(default)]
    email: Option<String>,
    /// Author date.
    #[serde(default)]
    date: Option<String>,
}

/// One changed-file entry.
#[derive(Debug, Deserialize)]
struct FileEntry {
    /// Path of the changed file.
    filename: String,
}

/// One parent entry.
#[derive(Debug, Deserialize)]
struct ParentEntry {
    /// Parent commit identifier.
    sha: String,
    /// Parent commit API URL.
    url: String,
}

/// Parses a commit-detail response body.
///
/// A missing or null author email yields an empty string and a missing
/// `files` array yields no changed files. Malformed file entries are skipped.
///
/// # Errors
///
/// Returns [`ResolutionFailure`] when the body is not a JSON object or the
/// author date is missing or not RFC 3339.
pub fn parse_commit_detail(
    body: &[u8],
    commit_id: &str,
) -> Result<CommitDetail, ResolutionFailure> {
    let response: CommitResponse = serde_json::from_slice(body)
        .map_err(|err| ResolutionFailure::InvalidResponse(err.to_string()))?;
    let author = response
        .commit
        .ok_or(ResolutionFailure::MissingField("commit"))?
        .author
        .ok_or(ResolutionFailure::MissingField("commit.author"))?;
    let commit_date = author.date.ok_or(ResolutionFailure::MissingField("commit.author.date"))?;
    OffsetDateTime::parse(&commit_date, &Rfc3339)
        .map_err(|err| ResolutionFailure::InvalidDate(format!("{commit_date}: {err}")))?;
    let changed_files = response
        .files
        .as_ref()
        .and_then(Value::as_array)
        .map(|files| {
            files
                .iter()
                .filter_map(|file| FileEntry::deserialize(file).ok())
                .map(|file| file.filename)
                .collect()
        })
        .unwrap_or_default();
    Ok(CommitDetail {
        commit_id: commit_id.to_string(),
        author_email: author.email.unwrap_or_default(),
        commit_date,
        changed_files,
        parents: Vec::new(),
    })
}

/// Extracts parent commits from a commit-detail response body.
///
/// Best effort: an unparseable body or missing `parents` array yields an
/// empty list and malformed entries are skipped.
#[must_use]
pub fn resolve_parents(body: &[u8]) -> Vec<CommitParent> {
    let Ok(document) = serde_json::from_slice::<Value>(body) else {
        return Vec::new();
    };
    document
        .get("parents")
        .and_then(Value::as_array)
        .map(|parents| {
            parents
                .iter()
                .filter_map(|parent| ParentEntry::deserialize(parent).ok())
                .map(|parent| CommitParent {
                    commit: parent.sha,
                    url: parent.url,
                })
                .collect()
        })
        .unwrap_or_default()
}
