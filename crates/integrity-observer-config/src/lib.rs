// crates/integrity-observer-config/src/lib.rs
// ============================================================================
// Module: Integrity Observer Config Library
// Description: Configuration model and validation for the observer.
// Purpose: Single source of truth for integrity-observer.toml semantics.
// Dependencies: integrity-observer-core, serde, toml
// ============================================================================

//! ## Overview
//! `integrity-observer-config` defines the observer's TOML configuration:
//! cycle sizing, the commit API client, manifest location, history reuse,
//! logging, and result export. Loading is fail-closed; every section is
//! validated before a config value is handed to the runtime.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
