// crates/integrity-observer-core/src/runtime/recorder.rs
// ============================================================================
// Module: Observation Recorder
// Description: Accumulates cycle results and derives drift against history.
// Purpose: Produce the next observation history at a cycle boundary.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The recorder collects [`ObservationResult`]s in whatever order workers
//! finish, keys them by identity, and attaches a [`DriftSignal`] computed
//! against the previous cycle's entry for the same identity. The finished
//! history is a fresh value; the previous history is only read.
//! Invariants:
//! - A later result for an identity replaces the earlier one.
//! - Identities absent from the current cycle are not carried over.
//! - An incomplete result carries the provenance of the last complete
//!   observation of its identity as a baseline for later cycles.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::CommitRef;
use crate::core::DriftSignal;
use crate::core::DriftStatus;
use crate::core::ObservationHistory;
use crate::core::ObservationResult;

// ============================================================================
// SECTION: Recorder
// ============================================================================

/// Builds the next history from one cycle's results.
#[derive(Debug)]
pub struct ObservationRecorder<'a> {
    /// Previous cycle's history.
    previous: &'a ObservationHistory,
    /// Results recorded so far in this cycle.
    current: ObservationHistory,
}

impl<'a> ObservationRecorder<'a> {
    /// Starts recording against the previous history.
    #[must_use]
    pub const fn new(previous: &'a ObservationHistory) -> Self {
        Self {
            previous,
            current: ObservationHistory::new(),
        }
    }

    /// Records one result, attaching its drift signal.
    pub fn push(&mut self, mut result: ObservationResult) {
        let prior = self.previous.find_by_identity(&result.identity);
        if !result.is_complete() {
            result.baseline =
                prior.and_then(ObservationResult::baseline_provenance).map(<[_]>::to_vec);
        }
        result.drift = Some(diff(&result, prior));
        self.current.insert(result);
    }

    /// Returns the number of identities recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Returns true when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Finishes the cycle and returns the replacement history.
    #[must_use]
    pub fn finish(self) -> ObservationHistory {
        self.current
    }
}

/// Records a full set of cycle results against the previous history.
#[must_use]
pub fn record(
    cycle_results: Vec<ObservationResult>,
    previous: &ObservationHistory,
) -> ObservationHistory {
    let mut recorder = ObservationRecorder::new(previous);
    for result in cycle_results {
        recorder.push(result);
    }
    recorder.finish()
}

// ============================================================================
// SECTION: Drift
// ============================================================================

/// Compares the commit set of `current` with its previous-cycle entry.
///
/// Incomplete current results are [`DriftStatus::Unknown`]. An incomplete
/// previous entry is compared through its carried baseline; without one the
/// result is [`DriftStatus::New`].
#[must_use]
pub fn diff(current: &ObservationResult, previous: Option<&ObservationResult>) -> DriftSignal {
    if !current.is_complete() {
        return DriftSignal::bare(DriftStatus::Unknown);
    }
    let now = current.commit_refs();
    let Some(baseline) = previous.and_then(ObservationResult::baseline_provenance) else {
        return DriftSignal {
            status: DriftStatus::New,
            added: now.into_iter().collect(),
            removed: Vec::new(),
        };
    };
    let before: BTreeSet<CommitRef> = baseline
        .iter()
        .map(|entry| CommitRef::new(&entry.info.repo_url, &entry.info.commit_id))
        .collect();
    let added: Vec<_> = now.difference(&before).cloned().collect();
    let removed: Vec<_> = before.difference(&now).cloned().collect();
    let status = if added.is_empty() && removed.is_empty() {
        DriftStatus::Unchanged
    } else {
        DriftStatus::Changed
    };
    DriftSignal {
        status,
        added,
        removed,
    }
}
