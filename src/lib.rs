//! # voltacq
//!
//! Serial voltage-packet acquisition into memory-mapped storage segments.
//!
//! A hardware device streams fixed-size packets (a 6-byte header doubling as
//! the device address, followed by 128 little-endian `f32` samples) over a
//! serial link that provides no frame boundary signal. This crate recovers
//! frame synchronization from the raw byte stream, decodes each packet, and
//! persists the sample rows into a bounded ring of fixed-size memory-mapped
//! segment files.
//!
//! ## Crate Structure
//!
//! - **`config`**: strongly-typed settings loaded via Figment (TOML +
//!   environment), with validation and derived storage geometry.
//! - **`source`**: the [`source::ByteSource`] seam plus the serial hardware
//!   implementation and a mock link for running without a device.
//! - **`sync`**: rolling-window frame synchronization with bounded memory.
//! - **`packet`**: frame decoding into address + sample row.
//! - **`storage`**: memory-mapped segment files and the rotation state
//!   machine.
//! - **`acquisition`**: the sequential pipeline driver and its exit report.
//! - **`cancel`**: cooperative cancellation token checked once per iteration.
//! - **`error`**: the crate-wide [`error::AcqError`] taxonomy.
//! - **`telemetry`**: tracing subscriber setup.
//!
//! The pipeline is deliberately single-threaded and blocking; only the serial
//! read may block, bounded by its timeout. See `Acquisition::run` for the
//! orchestration.

pub mod acquisition;
pub mod cancel;
pub mod config;
pub mod error;
pub mod packet;
pub mod source;
pub mod storage;
pub mod sync;
pub mod telemetry;

pub use error::{AcqError, AcqResult};
