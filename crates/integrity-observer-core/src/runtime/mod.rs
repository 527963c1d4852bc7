// crates/integrity-observer-core/src/runtime/mod.rs
// ============================================================================
// Module: Integrity Observer Runtime Stages
// Description: Locator, extractor, resolver, and recorder stages.
// Purpose: Implement the per-resource pipeline and cycle bookkeeping.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime stages run in a fixed order for each resource (locate, extract,
//! resolve) and feed the recorder. Every stage contains its own failures so a
//! single resource can never abort a cycle.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod extractor;
pub mod locator;
pub mod recorder;
pub mod resolver;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use extractor::ExtractError;
pub use extractor::commit_detail_url;
pub use extractor::commit_history_url;
pub use extractor::commit_id;
pub use extractor::extract;
pub use extractor::parse_attestation_materials;
pub use extractor::statement_materials;
pub use locator::ContentMatcher;
pub use locator::DEFAULT_CONTENT_MATCH_THRESHOLD;
pub use locator::IdentityMatcher;
pub use locator::LocateError;
pub use locator::ManifestLocator;
pub use locator::ManifestMatcher;
pub use locator::MatchOutcome;
pub use locator::content_similarity;
pub use recorder::ObservationRecorder;
pub use recorder::diff;
pub use recorder::record;
pub use resolver::CommitCache;
pub use resolver::CommitResolver;
pub use resolver::ResolutionFailure;
pub use resolver::parse_commit_detail;
pub use resolver::resolve_parents;
