// crates/integrity-observer-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared builders for resources, bundles, and commit sources.
// Purpose: Provide reusable fixtures for observer core tests.
// Dependencies: integrity-observer-core, serde_json
// ============================================================================

//! ## Overview
//! Builders for Deployment manifests and their live counterparts, plus a
//! counting in-memory [`CommitSource`] used to assert fetch de-duplication.

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
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use integrity_observer_core::ArtifactType;
use integrity_observer_core::AttestationStatement;
use integrity_observer_core::CommitSource;
use integrity_observer_core::FetchError;
use integrity_observer_core::LiveResource;
use integrity_observer_core::ProvenanceMaterial;
use integrity_observer_core::VerificationResult;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Manifests
// ============================================================================

/// Renders a Deployment manifest as YAML.
pub fn deployment_yaml(name: &str, namespace: &str, app: &str, image: &str) -> String {
    format!(
        "apiVersion: apps/v1\n\
         kind: Deployment\n\
         metadata:\n  name: {name}\n  namespace: {namespace}\n\
         spec:\n  replicas: 1\n  selector:\n    matchLabels:\n      app: {app}\n\
         \x20 template:\n    metadata:\n      labels:\n        app: {app}\n\
         \x20   spec:\n      containers:\n      - name: {app}\n        image: {image}\n"
    )
}

/// Builds the live object the cluster would report for a Deployment.
pub fn live_deployment(name: &str, namespace: &str, app: &str, image: &str) -> LiveResource {
    LiveResource::from_value(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": "2b0c5e0e-9d52-4c8e-a7e4-1f4c3c1b9a77",
            "resourceVersion": "48213",
            "generation": 3,
        },
        "spec": {
            "replicas": 1,
            "selector": {"matchLabels": {"app": app}},
            "template": {
                "metadata": {"labels": {"app": app}},
                "spec": {"containers": [{"name": app, "image": image}]},
            },
        },
        "status": {"readyReplicas": 1},
    }))
    .expect("live deployment")
}

/// Joins YAML documents into one bundle stream.
pub fn concat(documents: &[String]) -> Vec<u8> {
    documents.join("---\n").into_bytes()
}

// ============================================================================
// SECTION: Verification Results
// ============================================================================

/// Builds a material for `uri` at `commit`.
pub fn material(uri: &str, commit: &str) -> ProvenanceMaterial {
    let mut digest = BTreeMap::new();
    digest.insert("commit".to_string(), commit.to_string());
    ProvenanceMaterial {
        uri: uri.to_string(),
        digest,
    }
}

/// Builds a manifest-image statement with the given materials.
pub fn image_statement(materials: Vec<ProvenanceMaterial>) -> AttestationStatement {
    AttestationStatement {
        artifact: "ghcr.io/acme/app-manifests:1.0.0".to_string(),
        artifact_type: ArtifactType::ManifestImage,
        hash: "sha256:9f2c".to_string(),
        attestation_materials: materials,
        attestation: None,
    }
}

/// Builds a verification result for the `web` Deployment.
pub fn web_result(statements: Vec<AttestationStatement>) -> VerificationResult {
    VerificationResult {
        resource: live_deployment("web", "default", "web", "nginx:1.25"),
        provenances: statements,
        image_ref: None,
    }
}

/// Renders a commit-detail response body.
pub fn commit_body(email: Value, date: &str, files: Option<Value>) -> Vec<u8> {
    let mut body = json!({
        "sha": "abc123",
        "commit": {"author": {"name": "Dev", "email": email, "date": date}},
        "parents": [
            {"sha": "p1", "url": "https://api.github.com/repos/acme/app/commits/p1"}
        ],
    });
    if let Some(files) = files {
        body["files"] = files;
    }
    serde_json::to_vec(&body).expect("commit body")
}

// ============================================================================
// SECTION: Commit Source
// ============================================================================

/// In-memory commit source counting fetches per URL.
#[derive(Default)]
pub struct CountingSource {
    /// Response bodies keyed by URL.
    responses: Mutex<BTreeMap<String, Result<Vec<u8>, FetchError>>>,
    /// Total fetches issued.
    calls: AtomicUsize,
}

impl CountingSource {
    /// Registers a response for a URL.
    pub fn respond(&self, url: &str, response: Result<Vec<u8>, FetchError>) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    /// Returns the number of fetches issued.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CommitSource for CountingSource {
    fn fetch_commit(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(404)))
    }
}
