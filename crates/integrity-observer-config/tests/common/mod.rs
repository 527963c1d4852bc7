// crates/integrity-observer-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for the observer config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use integrity_observer_config::ConfigError;
use integrity_observer_config::ObserverConfig;

/// Result type for tests that report failures as messages.
pub type TestResult = Result<(), String>;

/// Parses and validates a TOML string.
pub fn config_from_toml(toml_str: &str) -> Result<ObserverConfig, ConfigError> {
    ObserverConfig::from_toml_str(toml_str)
}

/// Asserts that a config result is invalid with a message containing `needle`.
pub fn assert_invalid(result: Result<ObserverConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error '{message}' did not contain '{needle}'"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
