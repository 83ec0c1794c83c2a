//! Configuration system using Figment.
//!
//! The original firmware-side capture tool hardcoded its device name, frame
//! layout, and storage sizes as top-level constants. Here they are collected
//! into one strongly-typed [`Settings`] value that is loaded from:
//!
//! 1. `voltacq.toml` (base configuration, optional; every field has a default
//!    matching the reference hardware), then
//! 2. environment variables prefixed with `VOLTACQ_`.
//!
//! After loading, call [`Settings::validate`] once; it performs the semantic
//! checks that parsing cannot (divisibility of the segment size by the slot
//! size, non-empty header, known log level). Derived storage quantities are
//! computed once via [`Settings::geometry`] and passed into the components
//! that need them.
//!
//! # Example
//! ```no_run
//! use voltacq::config::Settings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! settings.validate()?;
//! println!("capacity: {} samples", settings.geometry().capacity_samples);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationSettings,
    /// Serial link settings
    #[serde(default)]
    pub link: LinkSettings,
    /// Wire frame layout
    #[serde(default)]
    pub frame: FrameSettings,
    /// Segment storage settings
    #[serde(default)]
    pub storage: StorageSettings,
    /// Capture session settings
    #[serde(default)]
    pub capture: CaptureSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSettings {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Serial link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSettings {
    /// Serial device path (e.g. "/dev/ttyUSB0", "COM3")
    #[serde(default = "default_device")]
    pub device: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Bounded read timeout; expiry yields a short read, not an error
    #[serde(with = "humantime_serde", default = "default_read_timeout")]
    pub read_timeout: Duration,
    /// Maximum bytes requested per read call
    #[serde(default = "default_read_chunk")]
    pub read_chunk: usize,
}

/// Wire frame layout.
///
/// A frame is `header.len() + samples_per_frame * 4` bytes: the fixed header
/// pattern (which doubles as the packet's address field) followed by
/// little-endian `f32` samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSettings {
    /// Header byte pattern used both for synchronization and as the address
    #[serde(default = "default_header")]
    pub header: Vec<u8>,
    /// Number of 32-bit float samples per frame
    #[serde(default = "default_samples_per_frame")]
    pub samples_per_frame: usize,
}

impl FrameSettings {
    /// Bytes occupied by one decoded sample row (one storage slot).
    pub fn slot_bytes(&self) -> usize {
        self.samples_per_frame * 4
    }

    /// Total on-wire frame length in bytes.
    pub fn frame_len(&self) -> usize {
        self.header.len() + self.slot_bytes()
    }
}

/// Segment storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory receiving the `segment-<N>` files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Size of each memory-mapped segment file in bytes
    #[serde(default = "default_segment_bytes")]
    pub segment_bytes: u64,
    /// Number of segment files before the rotator terminates
    #[serde(default = "default_segment_count")]
    pub segment_count: u32,
}

/// Capture session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Total sample rows to acquire. If this exceeds the storage capacity,
    /// acquisition stops early at capacity exhaustion.
    #[serde(default = "default_sample_budget")]
    pub sample_budget: u64,
}

// Default value functions (reference hardware configuration)

fn default_log_level() -> String {
    "info".to_string()
}

fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_read_chunk() -> usize {
    2048
}

fn default_header() -> Vec<u8> {
    vec![0x00, 0x80, 0xE1, 0x12, 0x34, 0x56]
}

fn default_samples_per_frame() -> usize {
    128
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_segment_bytes() -> u64 {
    16 * 1024 * 1024
}

fn default_segment_count() -> u32 {
    32
}

fn default_sample_budget() -> u64 {
    9_999_872
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud_rate: default_baud_rate(),
            read_timeout: default_read_timeout(),
            read_chunk: default_read_chunk(),
        }
    }
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            header: default_header(),
            samples_per_frame: default_samples_per_frame(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            segment_bytes: default_segment_bytes(),
            segment_count: default_segment_count(),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            sample_budget: default_sample_budget(),
        }
    }
}

/// Storage quantities derived from [`Settings`], computed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageGeometry {
    /// Bytes per sample-row slot.
    pub slot_bytes: usize,
    /// Slots held by one segment file.
    pub slots_per_segment: u64,
    /// Size of each segment file in bytes.
    pub segment_bytes: u64,
    /// Number of segment files before termination.
    pub segment_count: u32,
    /// Total addressable samples across all segments.
    pub capacity_samples: u64,
}

impl Settings {
    /// Load configuration from `voltacq.toml` and environment variables.
    ///
    /// Environment variables can override configuration with prefix `VOLTACQ_`.
    /// Example: `VOLTACQ_APPLICATION_LOG_LEVEL=debug`
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("voltacq.toml")
    }

    /// Load configuration from a specific file path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("VOLTACQ_").split("_"))
            .extract()
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.frame.header.is_empty() {
            return Err("frame.header must not be empty".to_string());
        }

        if self.frame.samples_per_frame == 0 {
            return Err("frame.samples_per_frame must be at least 1".to_string());
        }

        if self.link.read_chunk == 0 {
            return Err("link.read_chunk must be at least 1".to_string());
        }

        if self.storage.segment_count == 0 {
            return Err("storage.segment_count must be at least 1".to_string());
        }

        let slot_bytes = self.frame.slot_bytes() as u64;
        if self.storage.segment_bytes == 0 || self.storage.segment_bytes % slot_bytes != 0 {
            return Err(format!(
                "storage.segment_bytes ({}) must be a positive multiple of the slot size ({})",
                self.storage.segment_bytes, slot_bytes
            ));
        }

        if usize::try_from(self.storage.segment_bytes).is_err() {
            return Err(format!(
                "storage.segment_bytes ({}) does not fit the address space",
                self.storage.segment_bytes
            ));
        }

        Ok(())
    }

    /// Compute the derived storage geometry.
    ///
    /// Call after [`Settings::validate`]; the divisibility of `segment_bytes`
    /// by the slot size has been checked there.
    pub fn geometry(&self) -> StorageGeometry {
        let slot_bytes = self.frame.slot_bytes();
        let slots_per_segment = self.storage.segment_bytes / slot_bytes as u64;
        StorageGeometry {
            slot_bytes,
            slots_per_segment,
            segment_bytes: self.storage.segment_bytes,
            segment_count: self.storage.segment_count,
            capacity_samples: slots_per_segment * u64::from(self.storage.segment_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn reference_geometry_matches_hardware() {
        let settings = Settings::default();
        let geometry = settings.geometry();

        assert_eq!(settings.frame.frame_len(), 518);
        assert_eq!(geometry.slot_bytes, 512);
        assert_eq!(geometry.slots_per_segment, 32_768);
        assert_eq!(geometry.capacity_samples, 1_048_576);
    }

    #[test]
    fn rejects_empty_header() {
        let mut settings = Settings::default();
        settings.frame.header.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_indivisible_segment_size() {
        let mut settings = Settings::default();
        settings.storage.segment_bytes = 1000; // not a multiple of 512
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_segment_count() {
        let mut settings = Settings::default();
        settings.storage.segment_count = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_invalid_log_level() {
        let mut settings = Settings::default();
        settings.application.log_level = "verbose".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn loads_overrides_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voltacq.toml");
        std::fs::write(
            &path,
            r#"
[link]
device = "/dev/ttyACM3"
baud_rate = 921600

[storage]
segment_count = 4
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.link.device, "/dev/ttyACM3");
        assert_eq!(settings.link.baud_rate, 921_600);
        assert_eq!(settings.storage.segment_count, 4);
        // Untouched sections keep their defaults.
        assert_eq!(settings.frame.samples_per_frame, 128);
        assert!(settings.validate().is_ok());
    }
}
