// crates/integrity-observer-core/src/runtime/locator.rs
// ============================================================================
// Module: Manifest Locator
// Description: Ranked matching of live resources against bundle manifests.
// Purpose: Recover the manifest document that produced a running resource.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The locator narrows a bundle to the documents of the resource's kind and
//! then consults an ordered list of [`ManifestMatcher`]s. The first matcher
//! that selects exactly one candidate wins, so identity matching always takes
//! precedence over content matching.
//! Invariants:
//! - A resource maps to at most one manifest.
//! - Ambiguous matches never select a manifest.
//! - Locating has no side effects; failure is reported as [`LocateError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use serde_json::Value;
use thiserror::Error;

use crate::core::ArtifactBundle;
use crate::core::CandidateManifest;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::LiveResource;
use crate::core::LocatedManifest;
use crate::core::MatchStrategy;
use crate::core::hashing::hash_bytes;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default minimum share of manifest fields that must match the live object.
pub const DEFAULT_CONTENT_MATCH_THRESHOLD: f64 = 0.9;

/// Server-populated metadata fields excluded from content comparison.
const SERVER_METADATA_FIELDS: &[&str] = &[
    "creationTimestamp",
    "generation",
    "managedFields",
    "resourceVersion",
    "selfLink",
    "uid",
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the manifest locator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    /// No candidate manifest matches the resource.
    #[error("manifest not found for {resource}: {reason}")]
    NotFound {
        /// Display form of the resource identity.
        resource: String,
        /// Why no candidate was selected.
        reason: String,
    },
}

// ============================================================================
// SECTION: Matchers
// ============================================================================

/// Result of one matcher over the kind-filtered candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Exactly one candidate selected, by index.
    Found(usize),
    /// More than one candidate qualified equally.
    Ambiguous,
    /// No candidate qualified.
    NoMatch,
}

/// One ranked matching strategy.
pub trait ManifestMatcher: Send + Sync {
    /// Strategy label recorded on the located manifest.
    fn strategy(&self) -> MatchStrategy;

    /// Selects a candidate for the resource.
    fn select(&self, resource: &LiveResource, candidates: &[CandidateManifest]) -> MatchOutcome;
}

/// Matches on api version, kind, name, and namespace.
///
/// A manifest without a namespace matches any namespace, but only when no
/// manifest names the resource's namespace explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMatcher;

impl ManifestMatcher for IdentityMatcher {
    fn strategy(&self) -> MatchStrategy {
        MatchStrategy::Identity
    }

    fn select(&self, resource: &LiveResource, candidates: &[CandidateManifest]) -> MatchOutcome {
        let identity = resource.identity();
        let same_object = |candidate: &CandidateManifest| {
            candidate.api_version == resource.api_version()
                && candidate.kind == identity.kind
                && candidate.name == identity.name
        };
        let exact = indices(candidates, |candidate| {
            same_object(candidate) && candidate.namespace == identity.namespace
        });
        if !exact.is_empty() {
            return single(&exact);
        }
        let unscoped = indices(candidates, |candidate| {
            same_object(candidate) && candidate.namespace.is_empty()
        });
        single(&unscoped)
    }
}

/// Matches on the share of manifest fields present with equal values in the
/// live object.
#[derive(Debug, Clone, Copy)]
pub struct ContentMatcher {
    /// Minimum similarity in `[0, 1]` a candidate must reach.
    threshold: f64,
}

impl ContentMatcher {
    /// Creates a content matcher with the given similarity threshold.
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self {
            threshold,
        }
    }
}

impl Default for ContentMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_MATCH_THRESHOLD)
    }
}

impl ManifestMatcher for ContentMatcher {
    fn strategy(&self) -> MatchStrategy {
        MatchStrategy::Content
    }

    fn select(&self, resource: &LiveResource, candidates: &[CandidateManifest]) -> MatchOutcome {
        let mut best: Option<(usize, FieldScore)> = None;
        let mut tied = false;
        for (index, candidate) in candidates.iter().enumerate() {
            let score = score_fields(&candidate.body, resource.body());
            if !score.meets(self.threshold) {
                continue;
            }
            match best.map(|(_, current)| score.cmp_ratio(current)) {
                Some(Ordering::Less) => {}
                Some(Ordering::Equal) => tied = true,
                _ => {
                    best = Some((index, score));
                    tied = false;
                }
            }
        }
        match best {
            Some(_) if tied => MatchOutcome::Ambiguous,
            Some((index, _)) => MatchOutcome::Found(index),
            None => MatchOutcome::NoMatch,
        }
    }
}

// ============================================================================
// SECTION: Locator
// ============================================================================

/// Ranked manifest locator.
pub struct ManifestLocator {
    /// Matchers in precedence order.
    matchers: Vec<Box<dyn ManifestMatcher>>,
}

impl ManifestLocator {
    /// Creates the standard identity-then-content locator.
    #[must_use]
    pub fn new(content_threshold: f64) -> Self {
        Self::with_matchers(vec![
            Box::new(IdentityMatcher),
            Box::new(ContentMatcher::new(content_threshold)),
        ])
    }

    /// Creates a locator from an explicit matcher ranking.
    #[must_use]
    pub fn with_matchers(matchers: Vec<Box<dyn ManifestMatcher>>) -> Self {
        Self {
            matchers,
        }
    }

    /// Finds the manifest in `bundle` that produced `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`LocateError::NotFound`] when no kind-matching document exists
    /// or no matcher selects exactly one candidate.
    pub fn locate(
        &self,
        bundle: &ArtifactBundle,
        resource: &LiveResource,
    ) -> Result<LocatedManifest, LocateError> {
        let candidates = bundle.candidates_of_kind(resource.kind());
        if candidates.is_empty() {
            return Err(not_found(resource, format!("no {} manifests in bundle", resource.kind())));
        }
        for matcher in &self.matchers {
            if let MatchOutcome::Found(index) = matcher.select(resource, &candidates) {
                let Some(candidate) = candidates.get(index) else {
                    continue;
                };
                return Ok(LocatedManifest {
                    image_ref: bundle.image_ref.clone(),
                    manifest: String::from_utf8_lossy(&candidate.raw).into_owned(),
                    digest: hash_bytes(DEFAULT_HASH_ALGORITHM, &candidate.raw),
                    matched_by: matcher.strategy(),
                });
            }
        }
        Err(not_found(resource, "no unambiguous match".to_string()))
    }
}

impl Default for ManifestLocator {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_MATCH_THRESHOLD)
    }
}

// ============================================================================
// SECTION: Content Comparison
// ============================================================================

/// Returns the share of manifest fields present with equal values in `live`.
///
/// Mapping keys are compared by name, so key order never matters. Sequence
/// items are compared by position.
#[must_use]
pub fn content_similarity(manifest: &Value, live: &Value) -> f64 {
    score_fields(manifest, live).ratio()
}

/// Matched and total leaf counts of a manifest against a live object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FieldScore {
    /// Leaves with an equal value in the live object.
    matched: u64,
    /// Leaves considered.
    total: u64,
}

impl FieldScore {
    /// Returns the matched share, zero for an empty manifest.
    #[allow(clippy::cast_precision_loss, reason = "Leaf counts stay far below 2^52.")]
    fn ratio(self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total as f64
    }

    /// Returns true when the score reaches the threshold.
    fn meets(self, threshold: f64) -> bool {
        self.total > 0 && self.ratio() >= threshold
    }

    /// Compares matched shares exactly.
    fn cmp_ratio(self, other: Self) -> Ordering {
        let left = u128::from(self.matched) * u128::from(other.total);
        let right = u128::from(other.matched) * u128::from(self.total);
        left.cmp(&right)
    }
}

/// Scores a manifest document against a live object body.
fn score_fields(manifest: &Value, live: &Value) -> FieldScore {
    let mut score = FieldScore::default();
    let mut path = Vec::new();
    walk(manifest, Some(live), &mut path, &mut score);
    score
}

/// Recursively counts manifest leaves and their matches.
fn walk<'a>(
    manifest: &'a Value,
    live: Option<&Value>,
    path: &mut Vec<&'a str>,
    score: &mut FieldScore,
) {
    match manifest {
        Value::Object(map) if !map.is_empty() => {
            for (key, value) in map {
                path.push(key.as_str());
                if !is_ignored(path) {
                    let child = live.and_then(Value::as_object).and_then(|obj| obj.get(key));
                    walk(value, child, path, score);
                }
                path.pop();
            }
        }
        Value::Array(items) if !items.is_empty() => {
            let live_items = live.and_then(Value::as_array);
            for (index, item) in items.iter().enumerate() {
                let child = live_items.and_then(|items| items.get(index));
                walk(item, child, path, score);
            }
        }
        _ => {
            score.total += 1;
            if live.is_some_and(|live| leaf_equal(manifest, live)) {
                score.matched += 1;
            }
        }
    }
}

/// Returns true for paths excluded from comparison.
fn is_ignored(path: &[&str]) -> bool {
    match path {
        ["status"] => true,
        ["metadata", field] => SERVER_METADATA_FIELDS.contains(field),
        _ => false,
    }
}

/// Compares two leaves, treating numerically equal numbers as equal.
fn leaf_equal(manifest: &Value, live: &Value) -> bool {
    match (manifest, live) {
        (Value::Number(left), Value::Number(right)) => {
            left == right || left.as_f64().zip(right.as_f64()).is_some_and(|(l, r)| l == r)
        }
        (Value::Object(left), Value::Object(right)) => left.is_empty() && right.is_empty(),
        (Value::Array(left), Value::Array(right)) => left.is_empty() && right.is_empty(),
        _ => manifest == live,
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Collects the indices of candidates accepted by `predicate`.
fn indices(
    candidates: &[CandidateManifest],
    predicate: impl Fn(&CandidateManifest) -> bool,
) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| predicate(candidate))
        .map(|(index, _)| index)
        .collect()
}

/// Maps a set of qualifying indices to an outcome.
fn single(found: &[usize]) -> MatchOutcome {
    match found {
        [] => MatchOutcome::NoMatch,
        [index] => MatchOutcome::Found(*index),
        _ => MatchOutcome::Ambiguous,
    }
}

/// Builds a not-found error for a resource.
fn not_found(resource: &LiveResource, reason: String) -> LocateError {
    LocateError::NotFound {
        resource: resource.identity().to_string(),
        reason,
    }
}
