// crates/integrity-observer-core/src/core/observation.rs
// ============================================================================
// Module: Observation Records
// Description: Per-resource cycle results, drift signals, and history.
// Purpose: Persist one cycle's provenance view as the next cycle's baseline.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An [`ObservationResult`] aggregates what one cycle learned about one
//! resource. [`ObservationHistory`] holds the results of a whole cycle keyed by
//! [`ResourceIdentity`]; it is replaced wholesale at every cycle boundary and
//! never edited in place by readers.
//! Invariants:
//! - History entries are unique by identity; later inserts replace earlier ones.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashDigest;
use crate::core::identity::ResourceIdentity;
use crate::core::provenance::CommitDetail;
use crate::core::provenance::ManifestProvenanceResult;

// ============================================================================
// SECTION: Located Manifest
// ============================================================================

/// Strategy that selected a manifest for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Matched on api version, kind, name, and namespace.
    Identity,
    /// Matched on structural content similarity.
    Content,
}

/// Manifest recovered from a bundle for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedManifest {
    /// Image reference of the bundle.
    pub image_ref: String,
    /// Raw manifest text.
    pub manifest: String,
    /// Digest of the raw manifest bytes.
    pub digest: HashDigest,
    /// Strategy that selected the manifest.
    pub matched_by: MatchStrategy,
}

// ============================================================================
// SECTION: Drift
// ============================================================================

/// Commit reference used for cache keys and drift comparison.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommitRef {
    /// Source repository URI.
    pub repo_url: String,
    /// Commit identifier.
    pub commit_id: String,
}

impl CommitRef {
    /// Creates a commit reference.
    #[must_use]
    pub fn new(repo_url: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            commit_id: commit_id.into(),
        }
    }
}

/// Drift classification of one resource between two cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    /// No complete baseline existed in the previous cycle.
    New,
    /// Commit set matches the previous cycle.
    Unchanged,
    /// Commit set differs from the previous cycle.
    Changed,
    /// The current cycle did not finish observing the resource.
    Unknown,
}

/// Drift signal attached to a recorded observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftSignal {
    /// Drift classification.
    pub status: DriftStatus,
    /// Commits referenced now but not in the previous cycle.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<CommitRef>,
    /// Commits referenced in the previous cycle but not now.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<CommitRef>,
}

impl DriftSignal {
    /// Builds a signal with no commit deltas.
    #[must_use]
    pub const fn bare(status: DriftStatus) -> Self {
        Self {
            status,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Returns true when the commit set changed.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.status == DriftStatus::Changed
    }
}

// ============================================================================
// SECTION: Observation Result
// ============================================================================

/// Completion state of a resource observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationStatus {
    /// Every pipeline stage ran for the resource.
    Complete,
    /// The cycle deadline expired before the resource was resolved.
    Incomplete,
}

/// Per-resource, per-cycle observation aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationResult {
    /// Resource identity key.
    pub identity: ResourceIdentity,
    /// Resource body as observed.
    pub resource: Value,
    /// Manifest recovered from the bundle, when located.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<LocatedManifest>,
    /// Resolved provenance entries.
    #[serde(default)]
    pub provenance: Vec<ManifestProvenanceResult>,
    /// Completion state.
    pub status: ObservationStatus,
    /// Drift signal assigned when the result is recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftSignal>,
    /// Provenance of the last complete observation, carried while this one
    /// is incomplete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Vec<ManifestProvenanceResult>>,
}

impl ObservationResult {
    /// Creates a complete result with no provenance.
    #[must_use]
    pub const fn new(identity: ResourceIdentity, resource: Value) -> Self {
        Self {
            identity,
            resource,
            manifest: None,
            provenance: Vec::new(),
            status: ObservationStatus::Complete,
            drift: None,
            baseline: None,
        }
    }

    /// Creates an incomplete result for a resource cut off by the deadline.
    ///
    /// Entries finished before the deadline may be pushed onto `provenance`.
    #[must_use]
    pub const fn incomplete(identity: ResourceIdentity, resource: Value) -> Self {
        Self {
            identity,
            resource,
            manifest: None,
            provenance: Vec::new(),
            status: ObservationStatus::Incomplete,
            drift: None,
            baseline: None,
        }
    }

    /// Returns the set of commits referenced by this result's provenance.
    #[must_use]
    pub fn commit_refs(&self) -> BTreeSet<CommitRef> {
        self.provenance
            .iter()
            .map(|entry| CommitRef::new(&entry.info.repo_url, &entry.info.commit_id))
            .collect()
    }

    /// Returns the provenance later cycles compare against: this result's
    /// own entries when complete, otherwise the carried baseline.
    #[must_use]
    pub fn baseline_provenance(&self) -> Option<&[ManifestProvenanceResult]> {
        if self.is_complete() {
            Some(&self.provenance)
        } else {
            self.baseline.as_deref()
        }
    }

    /// Returns true when the observation finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == ObservationStatus::Complete
    }
}

// ============================================================================
// SECTION: Observation History
// ============================================================================

/// One cycle's observation results keyed by resource identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ObservationResult>", into = "Vec<ObservationResult>")]
pub struct ObservationHistory {
    /// Results keyed by identity.
    results: BTreeMap<ResourceIdentity, ObservationResult>,
}

impl ObservationHistory {
    /// Creates an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            results: BTreeMap::new(),
        }
    }

    /// Inserts a result, replacing any entry with the same identity.
    pub fn insert(&mut self, result: ObservationResult) {
        self.results.insert(result.identity.clone(), result);
    }

    /// Returns the entry for an exact (kind, namespace, name) match.
    #[must_use]
    pub fn find_by_identity(&self, identity: &ResourceIdentity) -> Option<&ObservationResult> {
        self.results.get(identity)
    }

    /// Returns every provenance entry recorded for a repository, across all
    /// resources, in identity order.
    pub fn find_by_repo<'a, 'b>(
        &'a self,
        repo_url: &'b str,
    ) -> impl Iterator<Item = &'a ManifestProvenanceResult> + use<'a, 'b> {
        self.results
            .values()
            .flat_map(|result| result.provenance.iter())
            .filter(move |entry| entry.info.repo_url == repo_url)
    }

    /// Returns previously resolved commit metadata for a commit reference.
    ///
    /// Carried baselines are searched as well as current entries.
    #[must_use]
    pub fn find_resolved(&self, commit: &CommitRef) -> Option<&CommitDetail> {
        self.results
            .values()
            .flat_map(|result| result.provenance.iter().chain(result.baseline.iter().flatten()))
            .filter(|entry| {
                entry.info.repo_url == commit.repo_url && entry.info.commit_id == commit.commit_id
            })
            .find_map(|entry| entry.detail.as_ref())
    }

    /// Iterates results in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &ObservationResult> {
        self.results.values()
    }

    /// Returns the number of recorded resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true when no resources are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl From<Vec<ObservationResult>> for ObservationHistory {
    fn from(results: Vec<ObservationResult>) -> Self {
        let mut history = Self::new();
        for result in results {
            history.insert(result);
        }
        history
    }
}

impl From<ObservationHistory> for Vec<ObservationResult> {
    fn from(history: ObservationHistory) -> Self {
        history.results.into_values().collect()
    }
}
