// crates/integrity-observer-core/src/core/identity.rs
// ============================================================================
// Module: Resource Identity
// Description: Live cluster resources and their identity keys.
// Purpose: Key observations by (kind, namespace, name) and expose the body.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`LiveResource`] is a read-only snapshot of an object observed in the
//! cluster. Its [`ResourceIdentity`] is the key used by observation history;
//! the api version is kept alongside for manifest identity matching.
//!
//! Live resources serialize as the raw object body, so verification inputs and
//! result documents carry ordinary Kubernetes JSON.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Resource Identity
// ============================================================================

/// Identity key of a resource within an observation history.
///
/// # Invariants
/// - Cluster-scoped resources use an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    /// Resource kind (for example `Deployment`).
    pub kind: String,
    /// Resource namespace; empty for cluster-scoped resources.
    #[serde(default)]
    pub namespace: String,
    /// Resource name.
    pub name: String,
}

impl ResourceIdentity {
    /// Creates a new identity key.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when a JSON object is not a usable resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// Resource body is not a JSON object.
    #[error("resource must be an object")]
    NotAnObject,
    /// A required identity field is missing or not a string.
    #[error("resource is missing {0}")]
    MissingField(&'static str),
}

// ============================================================================
// SECTION: Live Resource
// ============================================================================

/// Resource instance observed in the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct LiveResource {
    /// API version (for example `apps/v1`).
    api_version: String,
    /// Identity key.
    identity: ResourceIdentity,
    /// Full object body.
    body: Value,
}

impl LiveResource {
    /// Builds a live resource from an object body.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError`] when the body is not an object or lacks
    /// `apiVersion`, `kind`, or `metadata.name`.
    pub fn from_value(body: Value) -> Result<Self, ResourceError> {
        let Value::Object(map) = &body else {
            return Err(ResourceError::NotAnObject);
        };
        let api_version = string_field(map.get("apiVersion"), "apiVersion")?;
        let kind = string_field(map.get("kind"), "kind")?;
        let metadata = map.get("metadata");
        let name = string_field(metadata.and_then(|meta| meta.get("name")), "metadata.name")?;
        let namespace = metadata
            .and_then(|meta| meta.get("namespace"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            api_version,
            identity: ResourceIdentity {
                kind,
                namespace,
                name,
            },
            body,
        })
    }

    /// Returns the api version.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Returns the resource kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.identity.kind
    }

    /// Returns the identity key.
    #[must_use]
    pub const fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    /// Returns the object body.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }
}

impl TryFrom<Value> for LiveResource {
    type Error = ResourceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<LiveResource> for Value {
    fn from(resource: LiveResource) -> Self {
        resource.body
    }
}

/// Reads a required string field.
fn string_field(value: Option<&Value>, field: &'static str) -> Result<String, ResourceError> {
    value
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ResourceError::MissingField(field))
}
