//! Configuration types and loading

use anyhow::{Context, Result};
use mediabuf_media::SourceBufferConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(feature = "diagnostics")]
use mediabuf_diagnostics::LoggingConfig;

/// Environment variable overriding [`SourceBufferConfig::maximum_buffer_size`]
pub const MAX_BUFFER_BYTES_ENV: &str = "MEDIABUF_MAX_BUFFER_BYTES";

/// Global mediabuf configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Install a tracing subscriber on init
    pub debug_logging: bool,
    /// Subscriber settings used when `debug_logging` is set
    #[cfg(feature = "diagnostics")]
    pub logging: LoggingConfig,
    /// Settings for every source buffer created through [`crate::MediaBuf`]
    pub source_buffer: SourceBufferConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            #[cfg(feature = "diagnostics")]
            logging: LoggingConfig::default(),
            source_buffer: SourceBufferConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse mediabuf configuration")
    }

    /// Read and parse a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(MAX_BUFFER_BYTES_ENV) {
            let bytes = value.trim().parse::<usize>().with_context(|| {
                format!("{MAX_BUFFER_BYTES_ENV} must be a byte count, got '{value}'")
            })?;
            tracing::debug!(
                maximum_buffer_size = bytes,
                "Buffer budget overridden from environment"
            );
            self.source_buffer.maximum_buffer_size = bytes;
        }
        Ok(self)
    }

    /// Render as indented JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize mediabuf configuration")
    }
}
