// crates/integrity-observer/src/cycle.rs
// ============================================================================
// Module: Observation Cycle
// Description: Bounded-concurrency driver for one observation cycle.
// Purpose: Locate, extract, and resolve provenance for a batch of resources.
// Dependencies: integrity-observer-core, integrity-observer-config, tokio
// ============================================================================

//! ## Overview
//! A cycle runs one blocking pipeline per resource on the tokio blocking pool.
//! A semaphore bounds how many pipelines run at once. Every pipeline shares
//! one [`CommitCache`] and one bundle cache, so each commit and each image is
//! fetched at most once per cycle.
//!
//! The cycle deadline is enforced twice: the driver stops waiting for workers
//! when it passes, and each pipeline checks it before every commit
//! resolution. Each worker publishes its manifest and every resolved entry to
//! a shared progress slot as it goes, so a resource cut off by the deadline is
//! recorded as incomplete with the entries it finished. Results are recorded
//! against the previous history, which is only read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use integrity_observer_config::LogLevel;
use integrity_observer_config::ObserverConfig;
use integrity_observer_core::ArtifactBundle;
use integrity_observer_core::ArtifactType;
use integrity_observer_core::BundleError;
use integrity_observer_core::BundleReader;
use integrity_observer_core::CommitCache;
use integrity_observer_core::CommitResolver;
use integrity_observer_core::CommitSource;
use integrity_observer_core::DEFAULT_CONTENT_MATCH_THRESHOLD;
use integrity_observer_core::DriftSignal;
use integrity_observer_core::LocatedManifest;
use integrity_observer_core::ManifestLocator;
use integrity_observer_core::MatchStrategy;
use integrity_observer_core::ObservationHistory;
use integrity_observer_core::ObservationRecorder;
use integrity_observer_core::ObservationResult;
use integrity_observer_core::ObservationStatus;
use integrity_observer_core::VerificationResult;
use integrity_observer_core::extract;
use integrity_observer_core::statement_materials;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::log::ObserverEvent;
use crate::log::ObserverLog;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Runtime settings for a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSettings {
    /// Maximum number of resources observed concurrently.
    pub concurrency: usize,
    /// Wall-clock budget for the cycle.
    pub deadline: Duration,
    /// Locate manifests in bundles.
    pub locate: bool,
    /// Minimum content similarity for the content matcher.
    pub content_match_threshold: f64,
    /// Reuse commit details resolved in the previous cycle.
    pub reuse_resolved_commits: bool,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            deadline: Duration::from_secs(30),
            locate: true,
            content_match_threshold: DEFAULT_CONTENT_MATCH_THRESHOLD,
            reuse_resolved_commits: false,
        }
    }
}

impl CycleSettings {
    /// Derives settings from a validated configuration.
    #[must_use]
    pub fn from_config(config: &ObserverConfig) -> Self {
        Self {
            concurrency: config.cycle.concurrency,
            deadline: Duration::from_millis(config.cycle.deadline_ms),
            locate: config.locator.enabled,
            content_match_threshold: config.locator.content_match_threshold,
            reuse_resolved_commits: config.history.reuse_resolved_commits,
        }
    }
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Counters summarizing one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Distinct resources recorded by the cycle.
    pub resources: usize,
    /// Resources whose manifest was located.
    pub located: usize,
    /// Provenance entries with resolved commit metadata.
    pub resolved: usize,
    /// Provenance entries that failed to resolve.
    pub failures: usize,
    /// Resources cut off by the deadline.
    pub timeouts: usize,
    /// Resources whose commit set changed since the previous cycle.
    pub drifted: usize,
    /// Distinct commits looked up during the cycle.
    pub commit_lookups: usize,
}

/// Result of one cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// Replacement history for the next cycle.
    pub history: ObservationHistory,
    /// Cycle counters.
    pub report: CycleReport,
}

/// Errors that abort a cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Settings cannot drive a cycle.
    #[error("invalid cycle settings: {0}")]
    InvalidSettings(String),
}

// ============================================================================
// SECTION: Bundle Cache
// ============================================================================

/// Shared slot holding one bundle read outcome.
type BundleSlot = Arc<OnceLock<Result<Arc<ArtifactBundle>, BundleError>>>;

/// Cycle-local bundle cache keyed by image reference.
#[derive(Default)]
struct BundleCache {
    /// Outcome slots keyed by image reference.
    slots: Mutex<HashMap<String, BundleSlot>>,
}

impl BundleCache {
    /// Returns the bundle for `image_ref`, reading it at most once.
    fn get_or_read(
        &self,
        image_ref: &str,
        reader: &dyn BundleReader,
    ) -> Result<Arc<ArtifactBundle>, BundleError> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(image_ref.to_string()).or_default())
        };
        slot.get_or_init(|| reader.read_bundle(image_ref).map(Arc::new)).clone()
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Partial result a worker fills in while it runs.
type Progress = Arc<Mutex<ObservationResult>>;

/// Locks a progress slot, recovering from poisoning.
fn lock(progress: &Mutex<ObservationResult>) -> MutexGuard<'_, ObservationResult> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by every worker of one cycle.
struct Pipeline {
    /// Manifest locator, when location is enabled.
    locator: Option<ManifestLocator>,
    /// Commit resolver.
    resolver: CommitResolver,
    /// Cycle commit cache.
    commits: CommitCache,
    /// Cycle bundle cache.
    bundles: BundleCache,
    /// Bundle source.
    reader: Arc<dyn BundleReader>,
    /// Event sink.
    log: Arc<dyn ObserverLog>,
    /// Instant after which no further resolution starts.
    deadline: Instant,
}

impl Pipeline {
    /// Observes one resource, publishing partial work to `progress`. Blocking.
    fn observe(
        &self,
        input: &VerificationResult,
        progress: &Mutex<ObservationResult>,
    ) -> ObservationResult {
        let identity = input.resource.identity();
        if Instant::now() >= self.deadline {
            return lock(progress).clone();
        }
        let manifest = self.locate(input);
        lock(progress).manifest = manifest;
        self.report_invalid_attestations(input);
        for info in extract(input) {
            if Instant::now() >= self.deadline {
                self.log.record(
                    &ObserverEvent::new(
                        "resource_incomplete",
                        LogLevel::Warn,
                        "cycle deadline reached during commit resolution",
                    )
                    .with_resource(identity),
                );
                return lock(progress).clone();
            }
            let entry = self.resolver.resolve(info, &self.commits);
            match &entry.failure {
                Some(failure) => self.log.record(
                    &ObserverEvent::new("commit_unresolved", LogLevel::Warn, failure.clone())
                        .with_resource(identity)
                        .with_commit(&entry.info.repo_url, &entry.info.commit_id),
                ),
                None if self.log.enabled(LogLevel::Debug) => self.log.record(
                    &ObserverEvent::new("commit_resolved", LogLevel::Debug, "")
                        .with_resource(identity)
                        .with_commit(&entry.info.repo_url, &entry.info.commit_id),
                ),
                None => {}
            }
            lock(progress).provenance.push(entry);
        }
        let mut result = lock(progress).clone();
        result.status = ObservationStatus::Complete;
        result
    }

    /// Logs manifest-image statements whose raw attestation cannot be parsed.
    fn report_invalid_attestations(&self, input: &VerificationResult) {
        let statements = input
            .provenances
            .iter()
            .filter(|statement| statement.artifact_type == ArtifactType::ManifestImage);
        for statement in statements {
            if let Err(err) = statement_materials(statement) {
                self.log.record(
                    &ObserverEvent::new("attestation_invalid", LogLevel::Warn, err.to_string())
                        .with_resource(input.resource.identity()),
                );
            }
        }
    }

    /// Locates the manifest for a resource when a bundle is available.
    fn locate(&self, input: &VerificationResult) -> Option<LocatedManifest> {
        let locator = self.locator.as_ref()?;
        let image_ref = input.image_ref.as_deref()?;
        let identity = input.resource.identity();
        let bundle = match self.bundles.get_or_read(image_ref, self.reader.as_ref()) {
            Ok(bundle) => bundle,
            Err(err) => {
                self.log.record(
                    &ObserverEvent::new("bundle_unavailable", LogLevel::Warn, err.to_string())
                        .with_resource(identity),
                );
                return None;
            }
        };
        match locator.locate(&bundle, &input.resource) {
            Ok(located) => {
                if self.log.enabled(LogLevel::Debug) {
                    self.log.record(
                        &ObserverEvent::new(
                            "manifest_located",
                            LogLevel::Debug,
                            format!("{image_ref} via {}", strategy_label(located.matched_by)),
                        )
                        .with_resource(identity),
                    );
                }
                Some(located)
            }
            Err(err) => {
                self.log.record(
                    &ObserverEvent::new("manifest_not_located", LogLevel::Info, err.to_string())
                        .with_resource(identity),
                );
                None
            }
        }
    }
}

// ============================================================================
// SECTION: Cycle Driver
// ============================================================================

/// Observation cycle driver.
pub struct ObservationCycle {
    /// Cycle settings.
    settings: CycleSettings,
    /// Bundle source.
    reader: Arc<dyn BundleReader>,
    /// Commit metadata source.
    source: Arc<dyn CommitSource>,
    /// Event sink.
    log: Arc<dyn ObserverLog>,
}

impl ObservationCycle {
    /// Creates a cycle driver.
    #[must_use]
    pub fn new(
        settings: CycleSettings,
        reader: Arc<dyn BundleReader>,
        source: Arc<dyn CommitSource>,
        log: Arc<dyn ObserverLog>,
    ) -> Self {
        Self {
            settings,
            reader,
            source,
            log,
        }
    }

    /// Runs one cycle over `inputs` against the `previous` history.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError::InvalidSettings`] when concurrency is zero.
    pub async fn run(
        &self,
        inputs: Vec<VerificationResult>,
        previous: Arc<ObservationHistory>,
    ) -> Result<CycleOutcome, CycleError> {
        if self.settings.concurrency == 0 {
            return Err(CycleError::InvalidSettings("concurrency must be positive".to_string()));
        }
        let started = Instant::now();
        let deadline = started + self.settings.deadline;
        self.log.record(&ObserverEvent::new(
            "cycle_started",
            LogLevel::Info,
            format!("{} resources", inputs.len()),
        ));

        let mut resolver = CommitResolver::new(Arc::clone(&self.source));
        if self.settings.reuse_resolved_commits {
            resolver = resolver.with_history(Arc::clone(&previous));
        }
        let pipeline = Arc::new(Pipeline {
            locator: self
                .settings
                .locate
                .then(|| ManifestLocator::new(self.settings.content_match_threshold)),
            resolver,
            commits: CommitCache::new(),
            bundles: BundleCache::default(),
            reader: Arc::clone(&self.reader),
            log: Arc::clone(&self.log),
            deadline,
        });
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));

        let mut workers: Vec<(Progress, JoinHandle<Option<ObservationResult>>)> =
            Vec::with_capacity(inputs.len());
        for input in inputs {
            let progress: Progress = Arc::new(Mutex::new(ObservationResult::incomplete(
                input.resource.identity().clone(),
                input.resource.body().clone(),
            )));
            let pipeline = Arc::clone(&pipeline);
            let semaphore = Arc::clone(&semaphore);
            let slot = Arc::clone(&progress);
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                tokio::task::spawn_blocking(move || pipeline.observe(&input, &slot)).await.ok()
            });
            workers.push((progress, handle));
        }

        let deadline_at = tokio::time::Instant::from_std(deadline);
        let mut results = Vec::with_capacity(workers.len());
        for (progress, mut handle) in workers {
            let result = match tokio::time::timeout_at(deadline_at, &mut handle).await {
                Ok(Ok(Some(result))) => result,
                Ok(_) => {
                    let fallback = lock(&progress).clone();
                    self.log.record(
                        &ObserverEvent::new(
                            "worker_failed",
                            LogLevel::Error,
                            "resource worker failed",
                        )
                        .with_resource(&fallback.identity),
                    );
                    fallback
                }
                Err(_) => {
                    handle.abort();
                    let fallback = lock(&progress).clone();
                    self.log.record(
                        &ObserverEvent::new(
                            "resource_incomplete",
                            LogLevel::Warn,
                            "cycle deadline reached",
                        )
                        .with_resource(&fallback.identity),
                    );
                    fallback
                }
            };
            results.push(result);
        }

        let mut recorder = ObservationRecorder::new(&previous);
        for result in results {
            recorder.push(result);
        }
        let history = recorder.finish();
        let report = summarize(&history, pipeline.commits.len());
        let drifted = history
            .iter()
            .filter(|result| result.drift.as_ref().is_some_and(DriftSignal::is_changed));
        for result in drifted {
            self.log.record(
                &ObserverEvent::new("drift_detected", LogLevel::Info, "commit set changed")
                    .with_resource(&result.identity),
            );
        }
        self.log.record(&ObserverEvent::new(
            "cycle_finished",
            LogLevel::Info,
            format!(
                "resources={} resolved={} failures={} timeouts={} drifted={} elapsed_ms={}",
                report.resources,
                report.resolved,
                report.failures,
                report.timeouts,
                report.drifted,
                started.elapsed().as_millis()
            ),
        ));
        Ok(CycleOutcome {
            history,
            report,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Counts the outcome of a recorded cycle.
fn summarize(history: &ObservationHistory, commit_lookups: usize) -> CycleReport {
    let mut report = CycleReport {
        resources: history.len(),
        commit_lookups,
        ..CycleReport::default()
    };
    for result in history.iter() {
        if result.manifest.is_some() {
            report.located += 1;
        }
        if !result.is_complete() {
            report.timeouts += 1;
        }
        if result.drift.as_ref().is_some_and(DriftSignal::is_changed) {
            report.drifted += 1;
        }
        for entry in &result.provenance {
            if entry.is_resolved() {
                report.resolved += 1;
            } else {
                report.failures += 1;
            }
        }
    }
    report
}

/// Returns the log label of a match strategy.
const fn strategy_label(strategy: MatchStrategy) -> &'static str {
    match strategy {
        MatchStrategy::Identity => "identity",
        MatchStrategy::Content => "content",
    }
}
