// crates/integrity-observer-core/src/core/mod.rs
// ============================================================================
// Module: Integrity Observer Core Types
// Description: Canonical resource, bundle, provenance, and observation records.
// Purpose: Provide stable, serializable types shared by every observer stage.
// Dependencies: serde, serde_json, serde_yaml, sha2
// ============================================================================

//! ## Overview
//! Core types describe what the observer sees (live resources and artifact
//! bundles), what it derives (provenance records and commit details), and what
//! it reports (observation results and history). These types are the source of
//! truth for the persisted result document.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod bundle;
pub mod hashing;
pub mod identity;
pub mod observation;
pub mod provenance;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bundle::ArtifactBundle;
pub use bundle::CandidateManifest;
pub use bundle::split_documents;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identity::LiveResource;
pub use identity::ResourceError;
pub use identity::ResourceIdentity;
pub use observation::CommitRef;
pub use observation::DriftSignal;
pub use observation::DriftStatus;
pub use observation::LocatedManifest;
pub use observation::MatchStrategy;
pub use observation::ObservationHistory;
pub use observation::ObservationResult;
pub use observation::ObservationStatus;
pub use provenance::ArtifactType;
pub use provenance::AttestationStatement;
pub use provenance::CommitDetail;
pub use provenance::CommitParent;
pub use provenance::DigestSet;
pub use provenance::ManifestProvenanceInfo;
pub use provenance::ManifestProvenanceResult;
pub use provenance::ProvenanceMaterial;
pub use provenance::VerificationResult;
