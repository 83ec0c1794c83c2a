//! CLI entry point for voltacq.
//!
//! Provides a command-line interface for:
//! - Running an acquisition session against real hardware (or the mock link)
//! - Checking the configuration and derived storage geometry
//!
//! The acquisition pipeline itself is synchronous blocking I/O; it runs on
//! Tokio's blocking executor while the async side waits for Ctrl-C and feeds
//! the cancellation token, so an interrupted run still flushes and closes the
//! active segment.
//!
//! # Usage
//!
//! Capture with a config file:
//! ```bash
//! voltacq --config voltacq.toml run
//! ```
//!
//! Exercise the pipeline with no hardware attached:
//! ```bash
//! voltacq run --mock --samples 1000
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use voltacq::acquisition::{Acquisition, AcquisitionReport};
use voltacq::cancel::CancelToken;
use voltacq::config::Settings;
use voltacq::error::{AcqError, AcqResult};
use voltacq::source::MockLink;
use voltacq::telemetry;

#[derive(Parser)]
#[command(name = "voltacq")]
#[command(about = "Serial voltage-packet capture into memory-mapped segments", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (default: voltacq.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire packets until the sample budget or storage capacity is reached
    Run {
        /// Serial device path override (e.g. /dev/ttyUSB0, COM3)
        #[arg(long)]
        device: Option<String>,

        /// Output directory override for segment files
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Sample budget override
        #[arg(long)]
        samples: Option<u64>,

        /// Use the synthesized mock link instead of real hardware
        #[arg(long)]
        mock: bool,
    },

    /// Validate configuration and print the derived storage geometry
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    match cli.command {
        Commands::Run {
            device,
            output_dir,
            samples,
            mock,
        } => {
            if let Some(device) = device {
                settings.link.device = device;
            }
            if let Some(output_dir) = output_dir {
                settings.storage.output_dir = output_dir;
            }
            if let Some(samples) = samples {
                settings.capture.sample_budget = samples;
            }
            settings.validate().map_err(AcqError::Configuration)?;
            telemetry::init_from_settings(&settings).map_err(|e| anyhow!(e))?;

            run_capture(settings, mock).await
        }
        Commands::Check => {
            settings.validate().map_err(AcqError::Configuration)?;
            print_geometry(&settings);
            Ok(())
        }
    }
}

async fn run_capture(settings: Settings, mock: bool) -> Result<()> {
    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the packet in flight");
            interrupt.cancel();
        }
    });

    let report = tokio::task::spawn_blocking(move || -> AcqResult<AcquisitionReport> {
        if mock {
            let source = MockLink::new(&settings.frame, &settings.link);
            Acquisition::new(&settings, source, cancel)?.run()
        } else {
            run_serial(&settings, cancel)
        }
    })
    .await??;

    println!();
    println!("✅ Acquisition finished: {:?}", report.stop_reason);
    println!("   Samples written:    {}", report.samples_written);
    println!("   Segments completed: {}", report.segments_completed);
    Ok(())
}

#[cfg(feature = "serial")]
fn run_serial(settings: &Settings, cancel: CancelToken) -> AcqResult<AcquisitionReport> {
    let source = voltacq::source::SerialSource::open(&settings.link)?;
    Acquisition::new(settings, source, cancel)?.run()
}

#[cfg(not(feature = "serial"))]
fn run_serial(_settings: &Settings, _cancel: CancelToken) -> AcqResult<AcquisitionReport> {
    Err(AcqError::SerialFeatureDisabled)
}

fn print_geometry(settings: &Settings) {
    let geometry = settings.geometry();
    println!("🔧 voltacq configuration");
    println!("   Device:             {}", settings.link.device);
    println!("   Baud rate:          {}", settings.link.baud_rate);
    println!("   Frame length:       {} bytes", settings.frame.frame_len());
    println!("   Slot size:          {} bytes", geometry.slot_bytes);
    println!("   Slots per segment:  {}", geometry.slots_per_segment);
    println!("   Segment size:       {} bytes", geometry.segment_bytes);
    println!("   Segment count:      {}", geometry.segment_count);
    println!("   Capacity:           {} samples", geometry.capacity_samples);
    println!("   Sample budget:      {}", settings.capture.sample_budget);
    if settings.capture.sample_budget > geometry.capacity_samples {
        println!("   ⚠️  budget exceeds capacity; run will stop at capacity");
    }
}
