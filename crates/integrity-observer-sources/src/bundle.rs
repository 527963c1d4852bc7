// crates/integrity-observer-sources/src/bundle.rs
// ============================================================================
// Module: Filesystem Bundle Reader
// Description: Reads unpacked manifest bundles from a local directory.
// Purpose: Serve artifact bundles without a registry client.
// Dependencies: integrity-observer-core
// ============================================================================

//! ## Overview
//! [`FsBundleReader`] maps an image reference to a path below a root
//! directory. The reference is flattened by replacing `/`, `:` and `@` with
//! `_`. A directory with that name yields its `*.yaml` and `*.yml` files in
//! name order; otherwise a `<name>.yaml` or `<name>.yml` file is read as one
//! multi-document stream.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use integrity_observer_core::ArtifactBundle;
use integrity_observer_core::BundleError;
use integrity_observer_core::BundleReader;
use integrity_observer_core::split_documents;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum total bundle size in bytes.
const MAX_BUNDLE_BYTES: u64 = 16 * 1024 * 1024;
/// Maximum image reference length.
const MAX_IMAGE_REF_LENGTH: usize = 512;
/// Recognized manifest file extensions.
const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml"];

// ============================================================================
// SECTION: Reader
// ============================================================================

/// Bundle reader over a directory of unpacked manifest images.
#[derive(Debug, Clone)]
pub struct FsBundleReader {
    /// Directory holding one entry per image reference.
    root: PathBuf,
}

impl FsBundleReader {
    /// Creates a reader rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Returns the on-disk name used for an image reference.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidReference`] for empty, oversized, or
    /// path-traversing references.
    pub fn entry_name(image_ref: &str) -> Result<String, BundleError> {
        if image_ref.trim().is_empty() {
            return Err(BundleError::InvalidReference("empty image reference".to_string()));
        }
        if image_ref.len() > MAX_IMAGE_REF_LENGTH {
            return Err(BundleError::InvalidReference("image reference too long".to_string()));
        }
        if image_ref.contains("..") || image_ref.contains('\\') || image_ref.starts_with('/') {
            return Err(BundleError::InvalidReference(image_ref.to_string()));
        }
        Ok(image_ref.replace(['/', ':', '@'], "_"))
    }
}

impl BundleReader for FsBundleReader {
    fn read_bundle(&self, image_ref: &str) -> Result<ArtifactBundle, BundleError> {
        let name = Self::entry_name(image_ref)?;
        let dir = self.root.join(&name);
        if dir.is_dir() {
            let documents = read_directory(&dir)?;
            return Ok(ArtifactBundle::new(image_ref, documents));
        }
        for extension in MANIFEST_EXTENSIONS {
            let file = self.root.join(format!("{name}.{extension}"));
            if file.is_file() {
                let bytes = read_limited(&file, MAX_BUNDLE_BYTES)?;
                return Ok(ArtifactBundle::from_concatenated(image_ref, &bytes));
            }
        }
        Err(BundleError::NotFound(image_ref.to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the manifest files of a bundle directory in name order.
fn read_directory(dir: &Path) -> Result<Vec<Vec<u8>>, BundleError> {
    let entries = fs::read_dir(dir).map_err(|err| BundleError::Io(err.to_string()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| BundleError::Io(err.to_string()))?.path();
        let is_manifest = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext));
        if is_manifest && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    let mut documents = Vec::new();
    let mut remaining = MAX_BUNDLE_BYTES;
    for file in files {
        let bytes = read_limited(&file, remaining)?;
        remaining = remaining.saturating_sub(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
        documents.extend(split_documents(&bytes));
    }
    Ok(documents)
}

/// Reads a file, failing when it exceeds `max_bytes`.
fn read_limited(path: &Path, max_bytes: u64) -> Result<Vec<u8>, BundleError> {
    let size = fs::metadata(path).map_err(|err| BundleError::Io(err.to_string()))?.len();
    if size > max_bytes {
        return Err(BundleError::Io(format!("bundle exceeds {MAX_BUNDLE_BYTES} bytes")));
    }
    fs::read(path).map_err(|err| BundleError::Io(err.to_string()))
}
