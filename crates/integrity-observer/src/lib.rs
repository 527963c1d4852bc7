// crates/integrity-observer/src/lib.rs
// ============================================================================
// Module: Integrity Observer Library
// Description: Observation cycle driver and structured observer log.
// Purpose: Run the provenance pipeline over many resources within a deadline.
// Dependencies: integrity-observer-core, integrity-observer-config, tokio
// ============================================================================

//! ## Overview
//! [`ObservationCycle`] fans a batch of verification results out to blocking
//! workers, each running locate, extract, and resolve for one resource, then
//! records the results against the previous cycle's history.
//! [`ObserverLog`] receives structured events from every stage.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cycle;
pub mod log;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cycle::CycleError;
pub use cycle::CycleOutcome;
pub use cycle::CycleReport;
pub use cycle::CycleSettings;
pub use cycle::ObservationCycle;
pub use log::JsonlObserverLog;
pub use log::NoopObserverLog;
pub use log::ObserverEvent;
pub use log::ObserverLog;
pub use log::TextObserverLog;
pub use log::observer_log_from_config;
