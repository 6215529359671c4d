//! Configuration management for irck-rp
//!
//! A single TOML bootstrap file covers everything: hardware line numbers,
//! capture thresholds, playback carrier parameters, library location, and
//! logging. All fields default so a missing or sparse file still yields a
//! usable configuration.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--library)
//! 2. Environment variables (IRCK_CONFIG, IRCK_LIBRARY)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use std::path::{Path, PathBuf};

use irck_common::{Error, Result};
use serde::Deserialize;
use tracing::info;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to the persisted code library
    #[serde(default = "default_library_path")]
    pub library_path: PathBuf,

    /// Edge-monitored input line (BCM numbering)
    #[serde(default = "default_input_pin")]
    pub input_pin: u8,

    /// Waveform output line (BCM numbering)
    #[serde(default = "default_output_pin")]
    pub output_pin: u8,

    /// Capture thresholds
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Playback carrier and polling parameters
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Capture-side thresholds.
///
/// The defaults match the timing envelope of consumer remote controls:
/// codes are separated by well over 200 ms of idle line, and no legitimate
/// intra-code gap exceeds 130 ms.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CaptureConfig {
    /// Glitch filter pushed down to the edge source, microseconds
    #[serde(default = "default_glitch_us")]
    pub glitch_us: u32,

    /// Idle gap that starts a new code, milliseconds
    #[serde(default = "default_pre_gap_ms")]
    pub pre_gap_ms: u32,

    /// Watchdog window that ends a code, milliseconds
    #[serde(default = "default_post_gap_ms")]
    pub post_gap_ms: u32,

    /// Captures of this many pulses or fewer are repeats/bounce
    #[serde(default = "default_short_code")]
    pub short_code: usize,

    /// Pulse clustering tolerance, percent
    #[serde(default = "default_tolerance_pct")]
    pub tolerance_pct: f64,
}

impl CaptureConfig {
    /// Pre-gap threshold in microseconds.
    pub fn pre_gap_us(&self) -> u64 {
        self.pre_gap_ms as u64 * 1000
    }

    /// Post-gap threshold in microseconds.
    pub fn post_gap_us(&self) -> u64 {
        self.post_gap_ms as u64 * 1000
    }

    /// Clustering tolerance as a fraction.
    pub fn tolerance(&self) -> f64 {
        self.tolerance_pct / 100.0
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            glitch_us: default_glitch_us(),
            pre_gap_ms: default_pre_gap_ms(),
            post_gap_ms: default_post_gap_ms(),
            short_code: default_short_code(),
            tolerance_pct: default_tolerance_pct(),
        }
    }
}

/// Playback-side parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PlaybackConfig {
    /// Carrier frequency, kilohertz
    #[serde(default = "default_carrier_khz")]
    pub carrier_khz: f64,

    /// Busy-flag polling interval while a chain transmits, milliseconds
    #[serde(default = "default_busy_poll_ms")]
    pub busy_poll_ms: u64,
}

impl PlaybackConfig {
    pub fn busy_poll(&self) -> std::time::Duration {
        irck_common::time::millis_to_duration(self.busy_poll_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            carrier_khz: default_carrier_khz(),
            busy_poll_ms: default_busy_poll_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_library_path() -> PathBuf {
    PathBuf::from("codes.json")
}

fn default_input_pin() -> u8 {
    18
}

fn default_output_pin() -> u8 {
    17
}

fn default_glitch_us() -> u32 {
    100
}

fn default_pre_gap_ms() -> u32 {
    200
}

fn default_post_gap_ms() -> u32 {
    130
}

fn default_short_code() -> usize {
    10
}

fn default_tolerance_pct() -> f64 {
    15.0
}

fn default_carrier_khz() -> f64 {
    38.0
}

fn default_busy_poll_ms() -> u64 {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            library_path: default_library_path(),
            input_pin: default_input_pin(),
            output_pin: default_output_pin(),
            capture: CaptureConfig::default(),
            playback: PlaybackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from a TOML file.
    pub async fn load(path: &Path) -> Result<Self> {
        let toml_str = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        let config: TomlConfig = toml::from_str(&toml_str)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, falling back to built-in defaults when the file
    /// does not exist.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            info!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Apply command-line overrides.
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(library_path) = overrides.library_path {
            self.library_path = library_path;
        }
        self
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub library_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_capture_envelope() {
        let config = TomlConfig::default();
        assert_eq!(config.capture.glitch_us, 100);
        assert_eq!(config.capture.pre_gap_us(), 200_000);
        assert_eq!(config.capture.post_gap_us(), 130_000);
        assert_eq!(config.capture.short_code, 10);
        assert!((config.capture.tolerance() - 0.15).abs() < 1e-12);
        assert!((config.playback.carrier_khz - 38.0).abs() < 1e-12);
    }

    #[test]
    fn test_sparse_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            library_path = "/var/lib/irck/aircon.json"

            [capture]
            tolerance_pct = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(
            config.library_path,
            PathBuf::from("/var/lib/irck/aircon.json")
        );
        assert!((config.capture.tolerance() - 0.20).abs() < 1e-12);
        // Untouched fields keep their defaults
        assert_eq!(config.capture.pre_gap_ms, 200);
        assert_eq!(config.playback.busy_poll_ms, 2);
    }

    #[test]
    fn test_override_replaces_library_path() {
        let config = TomlConfig::default().apply(ConfigOverrides {
            library_path: Some(PathBuf::from("other.json")),
        });
        assert_eq!(config.library_path, PathBuf::from("other.json"));
    }
}
