// crates/integrity-observer-core/src/core/provenance.rs
// ============================================================================
// Module: Provenance Records
// Description: Verification inputs, provenance records, and commit details.
// Purpose: Model the chain from attestation material to resolved commit.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`VerificationResult`] is produced upstream by the admission/verification
//! subsystem. The extractor turns its manifest-image statements into
//! [`ManifestProvenanceInfo`] records, and the resolver merges each record with
//! a [`CommitDetail`] into a [`ManifestProvenanceResult`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identity::LiveResource;

// ============================================================================
// SECTION: Attestation Inputs
// ============================================================================

/// Digest set of an attestation material (algorithm or key to value).
pub type DigestSet = BTreeMap<String, String>;

/// Wire label for manifest image artifacts.
const MANIFEST_IMAGE: &str = "manifestImage";
/// Wire label for manifest resource artifacts.
const MANIFEST_RESOURCE: &str = "manifestResource";

/// Artifact type of an attestation statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArtifactType {
    /// Signed OCI image carrying manifests.
    ManifestImage,
    /// Manifest signed inline on the resource.
    ManifestResource,
    /// Any other artifact type.
    Other(String),
}

impl From<String> for ArtifactType {
    fn from(value: String) -> Self {
        match value.as_str() {
            MANIFEST_IMAGE => Self::ManifestImage,
            MANIFEST_RESOURCE => Self::ManifestResource,
            _ => Self::Other(value),
        }
    }
}

impl From<ArtifactType> for String {
    fn from(value: ArtifactType) -> Self {
        match value {
            ArtifactType::ManifestImage => MANIFEST_IMAGE.to_string(),
            ArtifactType::ManifestResource => MANIFEST_RESOURCE.to_string(),
            ArtifactType::Other(other) => other,
        }
    }
}

/// One attested material (source repository plus digests).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceMaterial {
    /// Source URI (for example `https://github.com/acme/app.git`).
    pub uri: String,
    /// Digest set; may carry a `commit` key.
    #[serde(default)]
    pub digest: DigestSet,
}

/// One attestation statement attached to a verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationStatement {
    /// Artifact name (for example the image reference).
    pub artifact: String,
    /// Artifact type.
    pub artifact_type: ArtifactType,
    /// Artifact hash reported by verification.
    #[serde(default)]
    pub hash: String,
    /// Materials attested for the artifact.
    #[serde(default)]
    pub attestation_materials: Vec<ProvenanceMaterial>,
    /// Raw in-toto statement, read when `attestation_materials` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
}

/// Verification outcome for one live resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Verified live resource.
    pub resource: LiveResource,
    /// Attestation statements, possibly empty.
    #[serde(default)]
    pub provenances: Vec<AttestationStatement>,
    /// Signed manifest image backing the resource, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

// ============================================================================
// SECTION: Provenance Records
// ============================================================================

/// Resource provenance material bound to a resolvable commit reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestProvenanceInfo {
    /// Artifact name from the statement.
    pub artifact: String,
    /// Commit identifier; empty when the digest set has no `commit` key.
    pub commit_id: String,
    /// Source repository URI.
    pub repo_url: String,
    /// Commit metadata API URL.
    pub commit_detail_url: String,
    /// Artifact hash from the statement.
    pub content_hash: String,
}

/// Parent commit reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitParent {
    /// Parent commit identifier.
    pub commit: String,
    /// Parent commit API URL.
    pub url: String,
}

/// Resolved remote commit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    /// Commit identifier.
    pub commit_id: String,
    /// Author email; empty when the remote reports none.
    pub author_email: String,
    /// Author date in RFC 3339 form.
    pub commit_date: String,
    /// Names of the files changed by the commit.
    #[serde(default)]
    pub changed_files: Vec<String>,
    /// Parent commits.
    #[serde(default)]
    pub parents: Vec<CommitParent>,
}

/// Provenance record merged with its resolution outcome.
///
/// # Invariants
/// - Exactly one of `detail` and `failure` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestProvenanceResult {
    /// Provenance record being resolved.
    #[serde(flatten)]
    pub info: ManifestProvenanceInfo,
    /// Resolved commit metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<CommitDetail>,
    /// Resolution failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ManifestProvenanceResult {
    /// Builds a resolved result.
    #[must_use]
    pub const fn resolved(info: ManifestProvenanceInfo, detail: CommitDetail) -> Self {
        Self {
            info,
            detail: Some(detail),
            failure: None,
        }
    }

    /// Builds a failed result.
    #[must_use]
    pub fn failed(info: ManifestProvenanceInfo, failure: impl Into<String>) -> Self {
        Self {
            info,
            detail: None,
            failure: Some(failure.into()),
        }
    }

    /// Returns true when commit metadata was resolved.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.detail.is_some()
    }
}
