//! Structured debug logging system

use crate::error::{DiagnosticsError, DiagnosticsResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Settings for the fmt subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `mediabuf_media=debug`
    pub directive: String,
    /// Prefer `RUST_LOG` over `directive` when it is set
    pub use_env: bool,
    /// Print the event target (module path)
    pub with_target: bool,
    /// Colorize output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directive: "info".to_string(),
            use_env: true,
            with_target: true,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose settings for debugging a single buffer
    pub fn verbose() -> Self {
        Self {
            directive: "mediabuf_core=debug,mediabuf_media=trace".to_string(),
            ..Self::default()
        }
    }
}

/// Debug logger for structured logging
#[derive(Debug, Default)]
pub struct DebugLogger {
    config: LoggingConfig,
}

impl DebugLogger {
    /// Create new debug logger
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Settings in effect
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Build the filter the subscriber would use
    pub fn env_filter(&self) -> DiagnosticsResult<EnvFilter> {
        if self.config.use_env {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }

        EnvFilter::try_new(&self.config.directive).map_err(|e| DiagnosticsError::InvalidFilter {
            directive: self.config.directive.clone(),
            reason: e.to_string(),
        })
    }

    /// Install the fmt subscriber as the global default
    pub fn init(&self) -> DiagnosticsResult<()> {
        let filter = self.env_filter()?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(self.config.with_target)
            .with_ansi(self.config.ansi)
            .try_init()
            .map_err(|e| DiagnosticsError::SubscriberInstall {
                reason: e.to_string(),
            })?;

        tracing::debug!(directive = %self.config.directive, "Logging initialized");
        Ok(())
    }

    /// Initialize logging system with default settings
    pub fn init_logging() -> DiagnosticsResult<()> {
        Self::default().init()
    }
}
