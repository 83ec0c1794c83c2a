//! Acquisition loop: serial bytes in, storage segments out.
//!
//! Drives the single-threaded pipeline
//! `ByteSource -> FrameSynchronizer -> PacketDecoder -> SegmentRotator`
//! until the sample budget is met, storage capacity is exhausted, or
//! cancellation is requested. All session counters live here; the exit
//! report says which condition ended the run.

use crate::cancel::CancelToken;
use crate::config::Settings;
use crate::error::AcqResult;
use crate::packet::PacketDecoder;
use crate::source::ByteSource;
use crate::storage::SegmentRotator;
use crate::sync::FrameSynchronizer;
use tracing::{debug, info, trace, warn};

/// Why the acquisition loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured sample budget was written.
    BudgetReached,
    /// Every configured segment filled before the budget was met.
    CapacityExhausted,
    /// An external cancellation request was honored.
    Cancelled,
}

/// Summary of a completed acquisition session.
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionReport {
    /// Sample rows written across all segments.
    pub samples_written: u64,
    /// Segments completely filled and released.
    pub segments_completed: u32,
    /// Condition that ended the run.
    pub stop_reason: StopReason,
}

/// The assembled pipeline, ready to run.
pub struct Acquisition<S: ByteSource> {
    synchronizer: FrameSynchronizer<S>,
    decoder: PacketDecoder,
    rotator: SegmentRotator,
    sample_budget: u64,
    cancel: CancelToken,
    samples_written: u64,
}

impl<S: ByteSource> Acquisition<S> {
    /// Assemble the pipeline from validated settings and a byte source.
    pub fn new(settings: &Settings, source: S, cancel: CancelToken) -> AcqResult<Self> {
        let geometry = settings.geometry();
        info!(
            frame_len = settings.frame.frame_len(),
            slots_per_segment = geometry.slots_per_segment,
            segment_count = geometry.segment_count,
            capacity_samples = geometry.capacity_samples,
            sample_budget = settings.capture.sample_budget,
            "acquisition configured"
        );
        if settings.capture.sample_budget > geometry.capacity_samples {
            warn!(
                budget = settings.capture.sample_budget,
                capacity = geometry.capacity_samples,
                "sample budget exceeds storage capacity; run will stop at capacity"
            );
        }

        Ok(Self {
            synchronizer: FrameSynchronizer::new(source, &settings.frame, settings.link.read_chunk),
            decoder: PacketDecoder::new(&settings.frame),
            rotator: SegmentRotator::new(&settings.storage.output_dir, geometry)?,
            sample_budget: settings.capture.sample_budget,
            cancel,
            samples_written: 0,
        })
    }

    /// Run the pipeline to completion.
    ///
    /// The active segment is flushed and released on every exit path,
    /// including a fatal error; segments completed earlier stay on disk
    /// untouched.
    pub fn run(mut self) -> AcqResult<AcquisitionReport> {
        let outcome = self.pump();

        if let Err(e) = self.rotator.close() {
            match outcome {
                Ok(_) => return Err(e),
                // The pump error is the primary failure; don't mask it.
                Err(_) => warn!(error = %e, "segment release failed during abort"),
            }
        }

        let stop_reason = outcome?;
        let report = AcquisitionReport {
            samples_written: self.samples_written,
            segments_completed: self.rotator.segments_completed(),
            stop_reason,
        };
        info!(
            samples = report.samples_written,
            segments = report.segments_completed,
            reason = ?report.stop_reason,
            "acquisition finished"
        );
        Ok(report)
    }

    fn pump(&mut self) -> AcqResult<StopReason> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }
            if self.samples_written >= self.sample_budget {
                return Ok(StopReason::BudgetReached);
            }
            if self.rotator.is_terminated() {
                return Ok(StopReason::CapacityExhausted);
            }

            let frame = match self.synchronizer.next_frame(&self.cancel)? {
                Some(frame) => frame,
                None => return Ok(StopReason::Cancelled),
            };
            let packet = self.decoder.decode(&frame);

            if self.samples_written == 0 {
                debug!(address = ?packet.address, "first packet decoded");
            }
            self.echo(&packet.samples);

            self.rotator.append(&packet.samples)?;
            self.samples_written += 1;
        }
    }

    /// Human-readable echo of one sample row, kept out of the hot path
    /// unless the `voltacq::echo` target is enabled at TRACE.
    fn echo(&self, samples: &[f32]) {
        if tracing::enabled!(target: "voltacq::echo", tracing::Level::TRACE) {
            let row = samples
                .iter()
                .map(|v| format!("{v:.4}"))
                .collect::<Vec<_>>()
                .join(" ");
            trace!(target: "voltacq::echo", sample = self.samples_written, "{row}");
        }
    }
}
