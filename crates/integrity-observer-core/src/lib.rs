// crates/integrity-observer-core/src/lib.rs
// ============================================================================
// Module: Integrity Observer Core Library
// Description: Public API surface for the manifest provenance observation engine.
// Purpose: Expose core types, collaborator interfaces, and runtime stages.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Integrity Observer core links running Kubernetes resources back to the
//! signed manifests and source-control commits that produced them. It locates
//! manifests inside artifact bundles, extracts attestation materials, resolves
//! commit metadata with per-cycle de-duplication, and records observation
//! history for drift detection.
//!
//! The core performs no I/O of its own: bundle retrieval and commit fetches go
//! through the traits in [`interfaces`], so every stage is testable in
//! isolation.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::BundleError;
pub use interfaces::BundleReader;
pub use interfaces::CommitSource;
pub use interfaces::FetchError;
pub use runtime::CommitCache;
pub use runtime::CommitResolver;
pub use runtime::ContentMatcher;
pub use runtime::DEFAULT_CONTENT_MATCH_THRESHOLD;
pub use runtime::ExtractError;
pub use runtime::IdentityMatcher;
pub use runtime::LocateError;
pub use runtime::ManifestLocator;
pub use runtime::ManifestMatcher;
pub use runtime::MatchOutcome;
pub use runtime::ObservationRecorder;
pub use runtime::ResolutionFailure;
pub use runtime::commit_detail_url;
pub use runtime::commit_history_url;
pub use runtime::commit_id;
pub use runtime::content_similarity;
pub use runtime::diff;
pub use runtime::extract;
pub use runtime::parse_attestation_materials;
pub use runtime::parse_commit_detail;
pub use runtime::record;
pub use runtime::resolve_parents;
pub use runtime::statement_materials;
