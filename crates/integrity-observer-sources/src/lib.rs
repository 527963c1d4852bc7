// crates/integrity-observer-sources/src/lib.rs
// ============================================================================
// Module: Integrity Observer Sources Library
// Description: Concrete implementations of the observer's collaborators.
// Purpose: Connect the core pipeline to the commit API and the filesystem.
// Dependencies: integrity-observer-core, integrity-observer-config, reqwest
// ============================================================================

//! ## Overview
//! Implementations of the core collaborator traits:
//! - [`GitHubCommitSource`] fetches commit-detail documents over HTTPS.
//! - [`FsBundleReader`] reads unpacked manifest bundles from a directory.
//!
//! [`write_result_document`] and [`read_result_document`] persist a cycle's
//! observation history between runs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bundle;
pub mod export;
pub mod github;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bundle::FsBundleReader;
pub use export::ExportError;
pub use export::ResultDocument;
pub use export::read_result_document;
pub use export::render_result_document;
pub use export::write_result_document;
pub use github::GitHubCommitSource;
pub use github::GitHubSourceConfig;
