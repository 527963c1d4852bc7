// crates/integrity-observer-core/src/runtime/extractor.rs
// ============================================================================
// Module: Provenance Extractor
// Description: Turns verification statements into commit-resolvable records.
// Purpose: Derive commit identifiers and commit API URLs from materials.
// Dependencies: crate::core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`extract`] walks the attestation statements of a verification result,
//! keeps the manifest-image ones, and emits one [`ManifestProvenanceInfo`] per
//! (statement, material) pair in input order. A statement with no inline
//! materials falls back to its raw in-toto attestation. Statements of other
//! artifact types are skipped. Materials without a commit digest are emitted
//! with an empty commit id and fail later in the commit resolver, which also
//! handles deduplication.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use thiserror::Error;

use crate::core::ArtifactType;
use crate::core::AttestationStatement;
use crate::core::DigestSet;
use crate::core::ManifestProvenanceInfo;
use crate::core::ProvenanceMaterial;
use crate::core::VerificationResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Digest-set key carrying the source commit.
const COMMIT_DIGEST_KEY: &str = "commit";
/// Git suffix stripped from repository URIs.
const GIT_SUFFIX: &str = ".git";
/// Web host replaced by the API host.
const GITHUB_HOST: &str = "github.com";
/// API host and path prefix for repositories.
const GITHUB_API_REPOS: &str = "api.github.com/repos";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing attestation statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Statement is not valid JSON or has mistyped fields.
    #[error("invalid attestation statement: {0}")]
    Parse(String),
    /// Statement has no predicate.
    #[error("attestation statement has no predicate")]
    MissingPredicate,
    /// Predicate has no materials list.
    #[error("attestation predicate has no materials")]
    MissingMaterials,
}

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Builds provenance records from the manifest-image statements of `result`.
///
/// Returns an empty vector when the result carries no usable statements. A
/// statement whose raw attestation cannot be parsed contributes no records.
#[must_use]
pub fn extract(result: &VerificationResult) -> Vec<ManifestProvenanceInfo> {
    result
        .provenances
        .iter()
        .filter(|statement| statement.artifact_type == ArtifactType::ManifestImage)
        .flat_map(|statement| {
            let materials = statement_materials(statement).unwrap_or_default();
            materials.into_iter().map(move |material| {
                let commit_id = commit_id(&material.digest);
                ManifestProvenanceInfo {
                    artifact: statement.artifact.clone(),
                    commit_detail_url: commit_detail_url(&material.uri, &commit_id),
                    commit_id,
                    repo_url: material.uri,
                    content_hash: statement.hash.clone(),
                }
            })
        })
        .collect()
}

/// Returns the materials of a statement.
///
/// Inline materials win; otherwise the raw attestation is parsed, and a
/// statement with neither has no materials.
///
/// # Errors
///
/// Returns [`ExtractError`] when the raw attestation is malformed.
pub fn statement_materials(
    statement: &AttestationStatement,
) -> Result<Vec<ProvenanceMaterial>, ExtractError> {
    match &statement.attestation {
        Some(raw) if statement.attestation_materials.is_empty() => {
            parse_attestation_materials(raw.as_bytes())
        }
        _ => Ok(statement.attestation_materials.clone()),
    }
}

/// Returns the `commit` digest, or an empty string when absent.
#[must_use]
pub fn commit_id(digest: &DigestSet) -> String {
    digest.get(COMMIT_DIGEST_KEY).cloned().unwrap_or_default()
}

/// Maps a repository URI to its commit-detail API URL.
///
/// `https://github.com/acme/app.git` with commit `abc123` becomes
/// `https://api.github.com/repos/acme/app/commits/abc123`.
#[must_use]
pub fn commit_detail_url(uri: &str, commit_id: &str) -> String {
    format!("{}/{commit_id}", commit_history_url(uri))
}

/// Maps a repository URI to its commit-history API URL.
#[must_use]
pub fn commit_history_url(uri: &str) -> String {
    let trimmed = uri.trim_end_matches('/');
    let repo = trimmed.strip_suffix(GIT_SUFFIX).unwrap_or(trimmed);
    let api = repo.replacen(GITHUB_HOST, GITHUB_API_REPOS, 1);
    format!("{api}/commits")
}

// ============================================================================
// SECTION: Attestation Statements
// ============================================================================

/// Typed view of an in-toto statement.
#[derive(Debug, Deserialize)]
struct StatementDocument {
    /// Statement predicate.
    #[serde(default)]
    predicate: Option<PredicateDocument>,
}

/// Typed view of a provenance predicate.
#[derive(Debug, Deserialize)]
struct PredicateDocument {
    /// Attested materials.
    #[serde(default)]
    materials: Option<Vec<ProvenanceMaterial>>,
}

/// Parses the materials list out of an in-toto provenance statement.
///
/// # Errors
///
/// Returns [`ExtractError`] when the statement is malformed or lacks a
/// predicate or materials list.
pub fn parse_attestation_materials(
    statement: &[u8],
) -> Result<Vec<ProvenanceMaterial>, ExtractError> {
    let document: StatementDocument =
        serde_json::from_slice(statement).map_err(|err| ExtractError::Parse(err.to_string()))?;
    let predicate = document.predicate.ok_or(ExtractError::MissingPredicate)?;
    predicate.materials.ok_or(ExtractError::MissingMaterials)
}
