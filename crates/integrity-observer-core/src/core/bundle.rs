// crates/integrity-observer-core/src/core/bundle.rs
// ============================================================================
// Module: Artifact Bundles
// Description: Unpacked manifest bundles and their candidate documents.
// Purpose: Split concatenated YAML into identity-tagged candidate manifests.
// Dependencies: serde_json, serde_yaml
// ============================================================================

//! ## Overview
//! An [`ArtifactBundle`] is the unpacked content of a signed manifest image: an
//! ordered list of raw YAML documents. [`CandidateManifest`] is one parsed
//! document tagged with its identity fields. Documents that do not parse as a
//! YAML mapping are skipped rather than failing the bundle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// SECTION: Artifact Bundle
// ============================================================================

/// Unpacked content of a signed manifest image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    /// Image reference the bundle was read from.
    pub image_ref: String,
    /// Raw manifest documents in bundle order.
    pub documents: Vec<Vec<u8>>,
}

impl ArtifactBundle {
    /// Creates a bundle from already separated documents.
    #[must_use]
    pub fn new(image_ref: impl Into<String>, documents: Vec<Vec<u8>>) -> Self {
        Self {
            image_ref: image_ref.into(),
            documents,
        }
    }

    /// Creates a bundle by splitting a concatenated multi-document YAML stream.
    #[must_use]
    pub fn from_concatenated(image_ref: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(image_ref, split_documents(bytes))
    }

    /// Parses every document, skipping the ones that are not manifests.
    #[must_use]
    pub fn candidates(&self) -> Vec<CandidateManifest> {
        self.documents.iter().filter_map(|raw| CandidateManifest::parse(raw)).collect()
    }

    /// Returns the parsed candidates whose kind equals `kind`.
    #[must_use]
    pub fn candidates_of_kind(&self, kind: &str) -> Vec<CandidateManifest> {
        self.candidates().into_iter().filter(|candidate| candidate.kind == kind).collect()
    }
}

// ============================================================================
// SECTION: Candidate Manifest
// ============================================================================

/// One manifest document extracted from a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateManifest {
    /// Declared api version; empty when absent.
    pub api_version: String,
    /// Declared kind.
    pub kind: String,
    /// Declared `metadata.name`; empty when absent.
    pub name: String,
    /// Declared `metadata.namespace`; empty when absent.
    pub namespace: String,
    /// Parsed document body.
    pub body: Value,
    /// Raw document bytes as stored in the bundle.
    pub raw: Vec<u8>,
}

impl CandidateManifest {
    /// Parses a raw YAML document into a candidate.
    ///
    /// Returns `None` when the document is not a YAML mapping with a `kind`.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let body: Value = serde_yaml::from_slice(raw).ok()?;
        let map = body.as_object()?;
        let kind = map.get("kind").and_then(Value::as_str).filter(|kind| !kind.is_empty())?;
        let text = |value: Option<&Value>| {
            value.and_then(Value::as_str).unwrap_or_default().to_string()
        };
        let metadata = map.get("metadata");
        Some(Self {
            api_version: text(map.get("apiVersion")),
            kind: kind.to_string(),
            name: text(metadata.and_then(|meta| meta.get("name"))),
            namespace: text(metadata.and_then(|meta| meta.get("namespace"))),
            body: body.clone(),
            raw: raw.to_vec(),
        })
    }
}

// ============================================================================
// SECTION: Document Helpers
// ============================================================================

/// Splits a multi-document YAML stream on `---` separator lines.
///
/// Works on raw bytes so every document keeps its exact content. Empty and
/// comment-only documents are dropped.
#[must_use]
pub fn split_documents(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut documents = Vec::new();
    let mut current = Vec::new();
    for line in bytes.split_inclusive(|byte| *byte == b'\n') {
        if is_separator(line) {
            push_document(&mut documents, &mut current);
            continue;
        }
        current.extend_from_slice(line);
    }
    push_document(&mut documents, &mut current);
    documents
}

/// Returns true for a YAML document separator line.
fn is_separator(line: &[u8]) -> bool {
    let trimmed = line.trim_ascii_end();
    trimmed == b"---" || trimmed.starts_with(b"--- ")
}

/// Moves the accumulated document into `documents` unless it is blank.
fn push_document(documents: &mut Vec<Vec<u8>>, current: &mut Vec<u8>) {
    let meaningful = current.split(|byte| *byte == b'\n').any(|line| {
        let trimmed = line.trim_ascii();
        !trimmed.is_empty() && !trimmed.starts_with(b"#")
    });
    if meaningful {
        documents.push(std::mem::take(current));
    } else {
        current.clear();
    }
}
