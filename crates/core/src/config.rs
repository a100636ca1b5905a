//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads environment variables; binaries
//! parse them with the `*_from_env_value` helpers below and build a [`CoreConfig`].

use crate::constants::{DEFAULT_CURRENT_WINDOW, DEFAULT_GENERATION_TIMEOUT_SECS};
use crate::digest::DigestLimits;
use crate::significance::SignificanceConfig;
use crate::{SummaryError, SummaryResult};
use std::path::PathBuf;
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    current_window: usize,
    generation_timeout: Duration,
    significance: SignificanceConfig,
    digest_limits: DigestLimits,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::InvalidConfig`] if the window or timeout is zero, or if the
    /// significance configuration fails validation.
    pub fn new(
        current_window: usize,
        generation_timeout: Duration,
        significance: SignificanceConfig,
        digest_limits: DigestLimits,
    ) -> SummaryResult<Self> {
        if current_window == 0 {
            return Err(SummaryError::InvalidConfig(
                "current summary window must be at least 1".into(),
            ));
        }
        if generation_timeout.is_zero() {
            return Err(SummaryError::InvalidConfig(
                "generation timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            current_window,
            generation_timeout,
            significance: significance.normalised()?,
            digest_limits,
        })
    }

    /// Number of trailing record entries used for current summaries.
    pub fn current_window(&self) -> usize {
        self.current_window
    }

    pub fn generation_timeout(&self) -> Duration {
        self.generation_timeout
    }

    pub fn significance(&self) -> &SignificanceConfig {
        &self.significance
    }

    pub fn digest_limits(&self) -> &DigestLimits {
        &self.digest_limits
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            current_window: DEFAULT_CURRENT_WINDOW,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            significance: SignificanceConfig::default(),
            digest_limits: DigestLimits::default(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the current summary window from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_CURRENT_WINDOW`].
pub fn current_window_from_env_value(value: Option<String>) -> SummaryResult<usize> {
    match non_blank(value) {
        None => Ok(DEFAULT_CURRENT_WINDOW),
        Some(v) => v.parse().map_err(|_| {
            SummaryError::InvalidConfig(format!("EHRSIM_CURRENT_WINDOW is not a count: '{v}'"))
        }),
    }
}

/// Parse the generation timeout (whole seconds) from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_GENERATION_TIMEOUT_SECS`].
pub fn generation_timeout_from_env_value(value: Option<String>) -> SummaryResult<Duration> {
    match non_blank(value) {
        None => Ok(Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS)),
        Some(v) => v.parse().map(Duration::from_secs).map_err(|_| {
            SummaryError::InvalidConfig(format!(
                "EHRSIM_GENERATION_TIMEOUT_SECS is not a number of seconds: '{v}'"
            ))
        }),
    }
}

/// Load the significance configuration from an optional YAML file path.
///
/// If `path` is `None` or empty/whitespace, returns the built-in defaults.
pub fn significance_config_from_env_value(
    path: Option<String>,
) -> SummaryResult<SignificanceConfig> {
    match non_blank(path) {
        None => Ok(SignificanceConfig::default()),
        Some(p) => SignificanceConfig::load(&PathBuf::from(p)),
    }
}
