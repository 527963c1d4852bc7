// crates/integrity-observer-cli/src/main.rs
// ============================================================================
// Module: Integrity Observer CLI Entry Point
// Description: Command dispatcher for observation cycles and manifest lookup.
// Purpose: Run one-shot or periodic observation cycles from local inputs.
// Dependencies: clap, integrity-observer, integrity-observer-sources, tokio
// ============================================================================

//! ## Overview
//! The CLI wires the filesystem bundle reader, the GitHub commit source, and
//! the configured observer log into an [`ObservationCycle`]. Inputs are
//! untrusted: every file read is size-limited and every document is
//! validated before a cycle starts.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use integrity_observer::CycleOutcome;
use integrity_observer::CycleSettings;
use integrity_observer::ObservationCycle;
use integrity_observer::ObserverLog;
use integrity_observer::observer_log_from_config;
use integrity_observer_config::ObserverConfig;
use integrity_observer_core::ArtifactBundle;
use integrity_observer_core::BundleReader;
use integrity_observer_core::DEFAULT_CONTENT_MATCH_THRESHOLD;
use integrity_observer_core::LiveResource;
use integrity_observer_core::ManifestLocator;
use integrity_observer_core::ObservationHistory;
use integrity_observer_core::VerificationResult;
use integrity_observer_sources::FsBundleReader;
use integrity_observer_sources::GitHubCommitSource;
use integrity_observer_sources::GitHubSourceConfig;
use integrity_observer_sources::read_result_document;
use integrity_observer_sources::render_result_document;
use integrity_observer_sources::write_result_document;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::Runtime;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a verification results input.
const MAX_INPUT_BYTES: usize = 64 * 1024 * 1024;
/// Maximum size of a bundle file passed to `locate`.
const MAX_BUNDLE_BYTES: usize = 16 * 1024 * 1024;
/// Maximum size of a resource file passed to `locate`.
const MAX_RESOURCE_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "integrity-observer", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one observation cycle and write the result document.
    Observe(ObserveCommand),
    /// Run observation cycles on the configured interval.
    Watch(WatchCommand),
    /// Locate the manifest for one resource in a bundle file.
    Locate(LocateCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments shared by cycle-running commands.
#[derive(Args, Debug, Clone)]
struct CycleArgs {
    /// Config file path (defaults to integrity-observer.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// JSON array of verification results to observe.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Directory of unpacked manifest bundles. Location is skipped without it.
    #[arg(long, value_name = "DIR")]
    bundles: Option<PathBuf>,
    /// Result document path (overrides `output.path`; stdout when unset).
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Previous result document used for drift detection.
    #[arg(long, value_name = "PATH")]
    history: Option<PathBuf>,
}

/// Arguments for a single observation cycle.
#[derive(Args, Debug)]
struct ObserveCommand {
    /// Shared cycle arguments.
    #[command(flatten)]
    cycle: CycleArgs,
}

/// Arguments for periodic observation.
#[derive(Args, Debug)]
struct WatchCommand {
    /// Shared cycle arguments.
    #[command(flatten)]
    cycle: CycleArgs,
    /// Stop after this many cycles.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1 ..))]
    cycles: Option<u64>,
}

/// Arguments for manifest lookup.
#[derive(Args, Debug)]
struct LocateCommand {
    /// Multi-document YAML bundle file.
    #[arg(long, value_name = "PATH")]
    bundle: PathBuf,
    /// Live resource as YAML or JSON.
    #[arg(long, value_name = "PATH")]
    resource: PathBuf,
    /// Content similarity threshold in (0, 1].
    #[arg(long, value_name = "RATIO")]
    threshold: Option<f64>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigValidateCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path (defaults to integrity-observer.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors raised by bounded file reads.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// Filesystem failure.
    #[error("{0}")]
    Io(std::io::Error),
    /// File exceeds the allowed size.
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Observed size in bytes.
        size: u64,
        /// Limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Observe(command) => command_observe(&command),
        Commands::Watch(command) => command_watch(&command),
        Commands::Locate(command) => command_locate(&command),
        Commands::Config {
            command,
        } => command_config(command),
    }
}

// ============================================================================
// SECTION: Cycle Commands
// ============================================================================

/// Cycle driver plus where its results go.
struct CycleRunner {
    /// Configured cycle driver.
    cycle: ObservationCycle,
    /// Result document destination; stdout when `None`.
    output: Option<PathBuf>,
    /// Result document name.
    name: String,
}

impl CycleRunner {
    /// Builds a runner from configuration and command arguments.
    fn new(config: &ObserverConfig, args: &CycleArgs) -> CliResult<Self> {
        let mut settings = CycleSettings::from_config(config);
        let reader: Arc<dyn BundleReader> = if let Some(root) = &args.bundles {
            Arc::new(FsBundleReader::new(root.clone()))
        } else {
            settings.locate = false;
            // Never read: location is disabled without a bundle root.
            Arc::new(FsBundleReader::new(PathBuf::new()))
        };
        let source = GitHubCommitSource::new(GitHubSourceConfig::from_config(&config.github))
            .map_err(|err| CliError::new(format!("failed to build commit source: {err}")))?;
        let log: Arc<dyn ObserverLog> =
            Arc::from(observer_log_from_config(&config.log, std::io::stderr()));
        Ok(Self {
            cycle: ObservationCycle::new(settings, reader, Arc::new(source), log),
            output: args.output.clone().or_else(|| config.output.path.clone()),
            name: config.output.name.clone(),
        })
    }

    /// Runs one cycle against `previous` and emits its result document.
    async fn run_once(
        &self,
        input: &Path,
        previous: Arc<ObservationHistory>,
    ) -> CliResult<CycleOutcome> {
        let inputs = read_inputs(input)?;
        let outcome = self
            .cycle
            .run(inputs, previous)
            .await
            .map_err(|err| CliError::new(format!("observation cycle failed: {err}")))?;
        self.emit(&outcome)?;
        Ok(outcome)
    }

    /// Writes the result document and, for file output, the cycle report.
    fn emit(&self, outcome: &CycleOutcome) -> CliResult<()> {
        match &self.output {
            Some(path) => {
                write_result_document(path, &self.name, &outcome.history).map_err(|err| {
                    CliError::new(format!("failed to write {}: {err}", path.display()))
                })?;
                write_json(&outcome.report)
            }
            None => {
                let bytes = render_result_document(&self.name, &outcome.history)
                    .map_err(|err| CliError::new(err.to_string()))?;
                write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
            }
        }
    }
}

/// Builds the runtime that drives cycles.
///
/// The runner, and with it the blocking commit source, is created and
/// dropped outside this runtime.
fn cycle_runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .map_err(|err| CliError::new(format!("failed to start runtime: {err}")))
}

/// Executes the `observe` command.
fn command_observe(command: &ObserveCommand) -> CliResult<ExitCode> {
    let config = load_config(command.cycle.config.as_deref())?;
    let previous = load_history(command.cycle.history.as_deref())?;
    let runner = CycleRunner::new(&config, &command.cycle)?;
    let runtime = cycle_runtime()?;
    runtime.block_on(runner.run_once(&command.cycle.input, Arc::new(previous)))?;
    drop(runtime);
    drop(runner);
    Ok(ExitCode::SUCCESS)
}

/// Executes the `watch` command.
fn command_watch(command: &WatchCommand) -> CliResult<ExitCode> {
    let config = load_config(command.cycle.config.as_deref())?;
    let previous = Arc::new(load_history(command.cycle.history.as_deref())?);
    let runner = CycleRunner::new(&config, &command.cycle)?;
    let interval = Duration::from_millis(config.cycle.interval_ms);
    let runtime = cycle_runtime()?;
    let watched = runtime.block_on(async {
        let mut previous = previous;
        let mut completed: u64 = 0;
        loop {
            let outcome = runner.run_once(&command.cycle.input, Arc::clone(&previous)).await?;
            previous = Arc::new(outcome.history);
            completed = completed.saturating_add(1);
            if command.cycles.is_some_and(|limit| completed >= limit) {
                return Ok::<ExitCode, CliError>(ExitCode::SUCCESS);
            }
            tokio::time::sleep(interval).await;
        }
    });
    drop(runtime);
    drop(runner);
    watched
}

// ============================================================================
// SECTION: Locate Command
// ============================================================================

/// Executes the `locate` command.
fn command_locate(command: &LocateCommand) -> CliResult<ExitCode> {
    let threshold = resolve_threshold(command.threshold)?;
    let bundle_bytes = read_bytes_with_limit(&command.bundle, MAX_BUNDLE_BYTES)
        .map_err(|err| read_error(&command.bundle, &err))?;
    let bundle =
        ArtifactBundle::from_concatenated(command.bundle.display().to_string(), &bundle_bytes);
    let resource = read_resource(&command.resource)?;
    let located = ManifestLocator::new(threshold)
        .locate(&bundle, &resource)
        .map_err(|err| CliError::new(err.to_string()))?;
    write_json(&located)?;
    Ok(ExitCode::SUCCESS)
}

/// Validates a content-match threshold, defaulting when absent.
fn resolve_threshold(threshold: Option<f64>) -> CliResult<f64> {
    let threshold = threshold.unwrap_or(DEFAULT_CONTENT_MATCH_THRESHOLD);
    if threshold > 0.0 && threshold <= 1.0 {
        Ok(threshold)
    } else {
        Err(CliError::new(format!("threshold must be in (0, 1], got {threshold}")))
    }
}

/// Reads a live resource from a YAML or JSON file.
fn read_resource(path: &Path) -> CliResult<LiveResource> {
    let bytes =
        read_bytes_with_limit(path, MAX_RESOURCE_BYTES).map_err(|err| read_error(path, &err))?;
    let value: Value = serde_yaml::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid resource {}: {err}", path.display())))?;
    LiveResource::from_value(value)
        .map_err(|err| CliError::new(format!("invalid resource {}: {err}", path.display())))
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = load_config(command.config.as_deref())?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<ObserverConfig> {
    ObserverConfig::load(path).map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Loads the previous history, or an empty one when no path is given.
fn load_history(path: Option<&Path>) -> CliResult<ObservationHistory> {
    let Some(path) = path else {
        return Ok(ObservationHistory::new());
    };
    read_result_document(path)
        .map(|document| document.results)
        .map_err(|err| CliError::new(format!("failed to read history {}: {err}", path.display())))
}

/// Reads the verification results of one cycle.
fn read_inputs(path: &Path) -> CliResult<Vec<VerificationResult>> {
    let bytes = read_bytes_with_limit(path, MAX_INPUT_BYTES).map_err(|err| read_error(path, &err))?;
    parse_inputs(&bytes)
        .map_err(|err| CliError::new(format!("invalid input {}: {err}", path.display())))
}

/// Parses a JSON array of verification results.
fn parse_inputs(bytes: &[u8]) -> Result<Vec<VerificationResult>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Reads a file, failing closed when it exceeds `max_bytes`.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Formats a bounded-read failure for `path`.
fn read_error(path: &Path, error: &ReadLimitError) -> CliError {
    CliError::new(format!("failed to read {}: {error}", path.display()))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a value as one JSON line to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = serde_json::to_vec(value)
        .map_err(|err| CliError::new(format!("failed to encode output: {err}")))?;
    bytes.push(b'\n');
    write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)?;
    stdout.flush()
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
