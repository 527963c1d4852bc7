// crates/integrity-observer/src/log.rs
// ============================================================================
// Module: Observer Log
// Description: Structured events emitted while observing resources.
// Purpose: Route cycle progress and failures to line-oriented sinks.
// Dependencies: integrity-observer-config, integrity-observer-core, serde
// ============================================================================

//! ## Overview
//! Events are plain serializable records. Sinks filter by a [`LogLevel`]
//! threshold and write one line per event. Write failures are ignored so
//! logging never interrupts a cycle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use integrity_observer_config::LogConfig;
use integrity_observer_config::LogFormat;
use integrity_observer_config::LogLevel;
use integrity_observer_core::ResourceIdentity;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Observer event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObserverEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event severity.
    pub level: LogLevel,
    /// Resource identity when the event concerns one resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Repository URI when the event concerns a commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Commit identifier when the event concerns a commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Human-readable detail.
    pub message: String,
}

impl ObserverEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(event: &'static str, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            level,
            resource: None,
            repo: None,
            commit: None,
            message: message.into(),
        }
    }

    /// Attaches a resource identity.
    #[must_use]
    pub fn with_resource(mut self, identity: &ResourceIdentity) -> Self {
        self.resource = Some(identity.to_string());
        self
    }

    /// Attaches a commit reference.
    #[must_use]
    pub fn with_commit(mut self, repo: &str, commit: &str) -> Self {
        self.repo = Some(repo.to_string());
        self.commit = Some(commit.to_string());
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Observer log sink.
pub trait ObserverLog: Send + Sync {
    /// Records an event.
    fn record(&self, event: &ObserverEvent);

    /// Returns true when events at `level` would be recorded.
    fn enabled(&self, level: LogLevel) -> bool {
        let _ = level;
        true
    }
}

/// Sink writing one JSON object per line.
pub struct JsonlObserverLog<W> {
    /// Output writer.
    writer: Mutex<W>,
    /// Most verbose level recorded.
    level: LogLevel,
}

impl<W: Write + Send> JsonlObserverLog<W> {
    /// Creates a JSON-lines sink.
    pub const fn new(writer: W, level: LogLevel) -> Self {
        Self {
            writer: Mutex::new(writer),
            level,
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> ObserverLog for JsonlObserverLog<W> {
    fn record(&self, event: &ObserverEvent) {
        if !self.level.allows(event.level) {
            return;
        }
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut writer) = self.writer.lock()
        {
            let _ = writeln!(writer, "{payload}");
            let _ = writer.flush();
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        self.level.allows(level)
    }
}

/// Sink writing one human-readable line per event.
pub struct TextObserverLog<W> {
    /// Output writer.
    writer: Mutex<W>,
    /// Most verbose level recorded.
    level: LogLevel,
}

impl<W: Write + Send> TextObserverLog<W> {
    /// Creates a text sink.
    pub const fn new(writer: W, level: LogLevel) -> Self {
        Self {
            writer: Mutex::new(writer),
            level,
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> ObserverLog for TextObserverLog<W> {
    fn record(&self, event: &ObserverEvent) {
        if !self.level.allows(event.level) {
            return;
        }
        let line = render_text(event);
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        self.level.allows(level)
    }
}

/// Sink discarding all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserverLog;

impl ObserverLog for NoopObserverLog {
    fn record(&self, _event: &ObserverEvent) {}

    fn enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

/// Builds the sink selected by the `[log]` config section.
pub fn observer_log_from_config<W: Write + Send + 'static>(
    config: &LogConfig,
    writer: W,
) -> Box<dyn ObserverLog> {
    match config.format {
        LogFormat::Json => Box::new(JsonlObserverLog::new(writer, config.level)),
        LogFormat::Text => Box::new(TextObserverLog::new(writer, config.level)),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders an event as `<ts> <LEVEL> <event> [key=value ...] <message>`.
fn render_text(event: &ObserverEvent) -> String {
    let mut line =
        format!("{} {} {}", event.timestamp_ms, event.level.as_str().to_uppercase(), event.event);
    for (key, value) in [
        ("resource", &event.resource),
        ("repo", &event.repo),
        ("commit", &event.commit),
    ] {
        if let Some(value) = value {
            line.push_str(&format!(" {key}={value}"));
        }
    }
    if !event.message.is_empty() {
        line.push(' ');
        line.push_str(&event.message);
    }
    line
}

/// Returns milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |duration| duration.as_millis())
}
