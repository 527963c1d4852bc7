// crates/integrity-observer/tests/common/mod.rs
// ============================================================================
// Module: Cycle Test Fixtures
// Description: In-memory collaborators and builders for cycle tests.
// Purpose: Drive full cycles without network or filesystem access.
// Dependencies: integrity-observer-core, serde_json
// ============================================================================

//! ## Overview
//! Counting bundle readers and commit sources, a shared log buffer, and
//! verification-result builders.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use integrity_observer_core::ArtifactBundle;
use integrity_observer_core::ArtifactType;
use integrity_observer_core::AttestationStatement;
use integrity_observer_core::BundleError;
use integrity_observer_core::BundleReader;
use integrity_observer_core::CommitSource;
use integrity_observer_core::FetchError;
use integrity_observer_core::LiveResource;
use integrity_observer_core::ProvenanceMaterial;
use integrity_observer_core::VerificationResult;
use integrity_observer_core::commit_detail_url;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Repository used by every fixture.
pub const REPO: &str = "https://github.com/acme/app.git";
/// Image reference used by every fixture.
pub const IMAGE: &str = "ghcr.io/acme/app-manifests:1.0.0";

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Renders a Deployment manifest.
pub fn deployment_yaml(name: &str) -> String {
    format!(
        "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: {name}\n  namespace: default\n\
         spec:\n  replicas: 1\n"
    )
}

/// Builds the live object for a Deployment.
pub fn live(name: &str) -> LiveResource {
    LiveResource::from_value(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": "default", "uid": "u-1"},
        "spec": {"replicas": 1},
    }))
    .expect("live deployment")
}

/// Builds a verification result whose provenance names the given commits.
pub fn verified(name: &str, commits: &[&str]) -> VerificationResult {
    let materials = commits
        .iter()
        .map(|commit| ProvenanceMaterial {
            uri: REPO.to_string(),
            digest: [("commit".to_string(), (*commit).to_string())].into_iter().collect(),
        })
        .collect();
    VerificationResult {
        resource: live(name),
        provenances: vec![AttestationStatement {
            artifact: IMAGE.to_string(),
            artifact_type: ArtifactType::ManifestImage,
            hash: "sha256:9f2c".to_string(),
            attestation_materials: materials,
            attestation: None,
        }],
        image_ref: Some(IMAGE.to_string()),
    }
}

/// Renders a commit-detail response body.
pub fn commit_body(commit: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "sha": commit,
        "commit": {"author": {"email": "dev@acme.io", "date": "2024-01-02T03:04:05Z"}},
        "files": [{"filename": "deploy/web.yaml"}],
    }))
    .expect("commit body")
}

// ============================================================================
// SECTION: Collaborators
// ============================================================================

/// Bundle reader serving one in-memory bundle and counting reads.
#[derive(Default)]
pub struct MemoryBundles {
    /// Bundles keyed by image reference.
    bundles: BTreeMap<String, Vec<u8>>,
    /// Reads issued.
    reads: AtomicUsize,
}

impl MemoryBundles {
    /// Serves `documents` under [`IMAGE`].
    pub fn with_documents(documents: &[String]) -> Self {
        let mut bundles = BTreeMap::new();
        bundles.insert(IMAGE.to_string(), documents.join("---\n").into_bytes());
        Self {
            bundles,
            reads: AtomicUsize::new(0),
        }
    }

    /// Returns the number of reads issued.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl BundleReader for MemoryBundles {
    fn read_bundle(&self, image_ref: &str) -> Result<ArtifactBundle, BundleError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.bundles
            .get(image_ref)
            .map(|bytes| ArtifactBundle::from_concatenated(image_ref, bytes))
            .ok_or_else(|| BundleError::NotFound(image_ref.to_string()))
    }
}

/// Commit source answering every known commit, optionally slowly.
#[derive(Default)]
pub struct MemoryCommits {
    /// Bodies keyed by commit-detail URL.
    bodies: BTreeMap<String, Vec<u8>>,
    /// Delay applied to every fetch.
    delay: Option<Duration>,
    /// Fetches issued.
    calls: AtomicUsize,
}

impl MemoryCommits {
    /// Serves the given commits of [`REPO`].
    pub fn with_commits(commits: &[&str]) -> Self {
        let bodies = commits
            .iter()
            .map(|commit| (commit_detail_url(REPO, commit), commit_body(commit)))
            .collect();
        Self {
            bodies,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delays every fetch by `delay`.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of fetches issued.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CommitSource for MemoryCommits {
    fn fetch_commit(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.bodies.get(url).cloned().ok_or(FetchError::Status(404))
    }
}

// ============================================================================
// SECTION: Log Buffer
// ============================================================================

/// Cloneable in-memory writer for log assertions.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    /// Written bytes.
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Returns the written lines.
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.bytes.lock().unwrap();
        String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
    }

    /// Returns the written lines parsed as JSON.
    pub fn events(&self) -> Vec<Value> {
        self.lines().iter().map(|line| serde_json::from_str(line).unwrap()).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
