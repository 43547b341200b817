//! Terminal client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use visage_core::{ClientConfig, ServerInfo};

/// Top-level configuration for the terminal client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Server settings.
    pub server: ServerConfig,
    /// Streaming / protocol tuning.
    pub stream: StreamConfig,
    /// Frame source settings.
    pub source: SourceConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Recognition server address (IP:port).
    pub address: String,
    /// Display name shown in status lines.
    pub name: String,
}

/// Streaming / protocol tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Calibration probes per connection.
    pub probe_count: usize,
    /// Starting credit balance.
    pub initial_credits: u32,
    /// Frame capture cadence in milliseconds.
    pub frame_interval_ms: u64,
    /// Per-probe echo deadline in milliseconds.
    pub probe_timeout_ms: u64,
    /// Training auto-off delay in milliseconds.
    pub training_window_ms: u64,
}

/// Frame source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory of encoded frames to replay; empty = built-in test
    /// pattern.
    pub frames_dir: String,
    /// Media type of the files in `frames_dir`.
    pub media_type: String,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            stream: StreamConfig::default(),
            source: SourceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9000".into(),
            name: "Local".into(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            probe_count: 10,
            initial_credits: 5,
            frame_interval_ms: 250,
            probe_timeout_ms: 5000,
            training_window_ms: 10_000,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            frames_dir: String::new(),
            media_type: "image/jpeg".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CliConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Translate into the core client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig::new(ServerInfo::new(
            self.server.address.clone(),
            self.server.name.clone(),
        ))
        .with_probe_count(self.stream.probe_count)
        .with_initial_credits(self.stream.initial_credits)
        .with_frame_interval(Duration::from_millis(self.stream.frame_interval_ms))
        .with_probe_timeout(Duration::from_millis(self.stream.probe_timeout_ms))
        .with_training_window(Duration::from_millis(self.stream.training_window_ms))
    }
}

// ── Tests ────────────────────────────────────────────────────────
