// crates/integrity-observer-core/src/interfaces/mod.rs
// ============================================================================
// Module: Integrity Observer Interfaces
// Description: Collaborator contracts for bundle retrieval and commit fetches.
// Purpose: Keep network and registry access outside the deterministic core.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The observer depends on two external capabilities: pulling a signed
//! manifest image into an [`ArtifactBundle`] and fetching commit metadata from
//! a version-control API. Both are blocking calls and are the only suspension
//! points of a cycle. Implementations must be safe to share across worker
//! threads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ArtifactBundle;

// ============================================================================
// SECTION: Bundle Reader
// ============================================================================

/// Errors raised while retrieving an artifact bundle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    /// No bundle exists for the image reference.
    #[error("bundle not found: {0}")]
    NotFound(String),
    /// Image reference is malformed.
    #[error("invalid image reference: {0}")]
    InvalidReference(String),
    /// Retrieval failed.
    #[error("bundle io failure: {0}")]
    Io(String),
}

/// Retrieves and unpacks signed manifest images.
pub trait BundleReader: Send + Sync {
    /// Reads the bundle behind an image reference.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError`] when the bundle cannot be retrieved.
    fn read_bundle(&self, image_ref: &str) -> Result<ArtifactBundle, BundleError>;
}

// ============================================================================
// SECTION: Commit Source
// ============================================================================

/// Errors raised while fetching commit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// URL failed to parse or violates source policy.
    #[error("invalid commit url: {0}")]
    InvalidUrl(String),
    /// Transport failure.
    #[error("commit fetch failed: {0}")]
    Transport(String),
    /// Remote answered with a non-success status.
    #[error("commit api returned status {0}")]
    Status(u16),
    /// Response exceeded the configured size limit.
    #[error("commit response exceeds {max_bytes} bytes")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
    },
}

/// Fetches raw commit metadata documents.
pub trait CommitSource: Send + Sync {
    /// Issues one request for the commit detail at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport, status, or policy failures.
    fn fetch_commit(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}
