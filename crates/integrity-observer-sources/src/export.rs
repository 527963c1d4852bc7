// crates/integrity-observer-sources/src/export.rs
// ============================================================================
// Module: Result Document Export
// Description: JSON persistence of a cycle's observation history.
// Purpose: Hand one cycle's results to reporting and to the next cycle.
// Dependencies: integrity-observer-core, serde, serde_json, time
// ============================================================================

//! ## Overview
//! A result document wraps an [`ObservationHistory`] with a name and an
//! RFC 3339 generation timestamp. Writes go through a temporary sibling file
//! that is renamed over the destination, so readers never see a partial
//! document.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use integrity_observer_core::ObservationHistory;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum result document size accepted on read.
const MAX_DOCUMENT_BYTES: u64 = 64 * 1024 * 1024;
/// Attempts made to allocate a unique temporary file.
const TEMP_ATTEMPTS: usize = 16;
/// Counter distinguishing temporary files within one process.
static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Persisted output of one observation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// Document name.
    pub name: String,
    /// Generation time in RFC 3339 form.
    pub generated_at: String,
    /// Observation results keyed by resource identity.
    pub results: ObservationHistory,
}

/// Errors raised while writing or reading result documents.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Filesystem failure.
    #[error("result document io error: {0}")]
    Io(String),
    /// Document could not be encoded.
    #[error("result document encode error: {0}")]
    Encode(String),
    /// Document could not be decoded.
    #[error("result document parse error: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders a result document as pretty JSON stamped with the current time.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] when the timestamp or document cannot be
/// encoded.
pub fn render_result_document(
    name: &str,
    history: &ObservationHistory,
) -> Result<Vec<u8>, ExportError> {
    let generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| ExportError::Encode(err.to_string()))?;
    let document = ResultDocument {
        name: name.to_string(),
        generated_at,
        results: history.clone(),
    };
    let mut bytes =
        serde_json::to_vec_pretty(&document).map_err(|err| ExportError::Encode(err.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Writes a result document to `path` atomically.
///
/// # Errors
///
/// Returns [`ExportError`] when encoding or any filesystem step fails.
pub fn write_result_document(
    path: &Path,
    name: &str,
    history: &ObservationHistory,
) -> Result<(), ExportError> {
    let bytes = render_result_document(name, history)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| ExportError::Io(err.to_string()))?;
    }
    let (temp_path, mut file) = create_temp_output(path)?;
    let written = file.write_all(&bytes).and_then(|()| file.sync_all());
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(ExportError::Io(err.to_string()));
    }
    fs::rename(&temp_path, path).map_err(|err| {
        let _ = fs::remove_file(&temp_path);
        ExportError::Io(err.to_string())
    })
}

/// Reads a result document written by [`write_result_document`].
///
/// # Errors
///
/// Returns [`ExportError`] when the file is missing, oversized, or malformed.
pub fn read_result_document(path: &Path) -> Result<ResultDocument, ExportError> {
    let size = fs::metadata(path).map_err(|err| ExportError::Io(err.to_string()))?.len();
    if size > MAX_DOCUMENT_BYTES {
        return Err(ExportError::Io(format!("result document exceeds {MAX_DOCUMENT_BYTES} bytes")));
    }
    let bytes = fs::read(path).map_err(|err| ExportError::Io(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| ExportError::Parse(err.to_string()))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Creates a unique temporary file alongside the destination.
fn create_temp_output(path: &Path) -> Result<(PathBuf, fs::File), ExportError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ExportError::Io("output path does not include a file name".to_string()))?;
    for _ in 0 .. TEMP_ATTEMPTS {
        let attempt = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = parent.join(format!(".{file_name}.tmp.{}.{attempt}", std::process::id()));
        match OpenOptions::new().write(true).create_new(true).open(&temp_path) {
            Ok(file) => return Ok((temp_path, file)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(ExportError::Io(err.to_string())),
        }
    }
    Err(ExportError::Io("failed to allocate temporary output path".to_string()))
}
