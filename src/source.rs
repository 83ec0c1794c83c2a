//! Byte sources feeding the frame synchronizer.
//!
//! The synchronizer only needs a blocking "give me up to N bytes" primitive;
//! [`ByteSource`] captures that seam so the pipeline runs identically against
//! real hardware ([`SerialSource`]) or a synthesized stream ([`MockLink`]) when
//! no device is attached.

use crate::config::{FrameSettings, LinkSettings};
use crate::error::AcqResult;
use crate::packet;

/// A blocking source of raw, unframed bytes.
pub trait ByteSource: Send {
    /// Read up to `buf.len()` bytes, blocking for at most the source's
    /// configured timeout.
    ///
    /// A timeout is reported as a short read (possibly `Ok(0)`), never as an
    /// error; the link provides no frame boundary signal, only bytes. An `Err`
    /// means the source has failed fatally and cannot produce further data.
    fn read_bytes(&mut self, buf: &mut [u8]) -> AcqResult<usize>;
}

#[cfg(feature = "serial")]
pub use self::serial::SerialSource;

#[cfg(feature = "serial")]
mod serial {
    use super::ByteSource;
    use crate::config::LinkSettings;
    use crate::error::{AcqError, AcqResult};
    use std::io::Read;
    use tracing::debug;

    /// Exclusive owner of the physical serial link.
    pub struct SerialSource {
        port: Box<dyn serialport::SerialPort>,
        device: String,
    }

    impl SerialSource {
        /// Open the configured device with 8N1 framing and no flow control.
        pub fn open(link: &LinkSettings) -> AcqResult<Self> {
            let port = serialport::new(&link.device, link.baud_rate)
                .data_bits(serialport::DataBits::Eight)
                .parity(serialport::Parity::None)
                .stop_bits(serialport::StopBits::One)
                .flow_control(serialport::FlowControl::None)
                .timeout(link.read_timeout)
                .open()
                .map_err(|e| {
                    AcqError::Link(format!(
                        "failed to open '{}' at {} baud: {e}",
                        link.device, link.baud_rate
                    ))
                })?;

            debug!(device = %link.device, baud = link.baud_rate, "serial port opened");

            Ok(Self {
                port,
                device: link.device.clone(),
            })
        }
    }

    impl ByteSource for SerialSource {
        fn read_bytes(&mut self, buf: &mut [u8]) -> AcqResult<usize> {
            match self.port.read(buf) {
                Ok(n) => Ok(n),
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    // Nothing arrived within the bounded timeout; the caller
                    // keeps accumulating.
                    Ok(0)
                }
                Err(e) => Err(AcqError::Link(format!(
                    "read from '{}' failed: {e}",
                    self.device
                ))),
            }
        }
    }
}

/// Synthesized byte source for running the pipeline without hardware.
///
/// Produces an endless stream in the device's wire format: well-formed frames
/// carrying generated sample rows, occasionally preceded by bursts of line
/// noise, delivered in irregular chunk sizes so the synchronizer sees the same
/// partial reads a real link would produce.
pub struct MockLink {
    frame: FrameSettings,
    chunk_limit: usize,
    pending: Vec<u8>,
    rng: rand::rngs::StdRng,
}

impl MockLink {
    /// Create a mock link emitting frames in the given layout.
    pub fn new(frame: &FrameSettings, link: &LinkSettings) -> Self {
        use rand::SeedableRng;

        let mut mock = Self {
            frame: frame.clone(),
            chunk_limit: link.read_chunk,
            pending: Vec::new(),
            rng: rand::rngs::StdRng::from_entropy(),
        };
        // Start mid-stream: an unsynchronized tail of a previous frame.
        mock.push_noise(frame.frame_len() / 2);
        mock
    }

    fn push_noise(&mut self, len: usize) {
        use rand::Rng;
        for _ in 0..len {
            self.pending.push(self.rng.gen());
        }
    }

    fn push_frame(&mut self) {
        use rand::Rng;

        if self.rng.gen_ratio(1, 8) {
            let burst = self.rng.gen_range(1..64);
            self.push_noise(burst);
        }
        let samples: Vec<f32> = (0..self.frame.samples_per_frame)
            .map(|_| self.rng.gen_range(-1.0..1.0))
            .collect();
        let bytes = packet::encode_frame(&self.frame, &samples);
        self.pending.extend_from_slice(&bytes);
    }
}

impl ByteSource for MockLink {
    fn read_bytes(&mut self, buf: &mut [u8]) -> AcqResult<usize> {
        use rand::Rng;

        if self.pending.is_empty() {
            self.push_frame();
        }

        // Deliver an irregular partial read, as a real UART would.
        let max = buf.len().min(self.pending.len()).min(self.chunk_limit);
        let n = self.rng.gen_range(1..=max.max(1)).min(max);
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn mock_link_eventually_carries_a_valid_frame() {
        let settings = Settings::default();
        let mut link = MockLink::new(&settings.frame, &settings.link);

        let mut stream = Vec::new();
        let mut buf = vec![0u8; 256];
        while stream.len() < 4 * settings.frame.frame_len() {
            let n = link.read_bytes(&mut buf).unwrap();
            stream.extend_from_slice(&buf[..n]);
        }

        let header = &settings.frame.header;
        let found = stream.windows(header.len()).any(|w| w == header.as_slice());
        assert!(found, "no header pattern in {} mock bytes", stream.len());
    }

    #[test]
    fn mock_link_respects_requested_length() {
        let settings = Settings::default();
        let mut link = MockLink::new(&settings.frame, &settings.link);

        let mut buf = vec![0u8; 16];
        for _ in 0..50 {
            let n = link.read_bytes(&mut buf).unwrap();
            assert!(n >= 1 && n <= buf.len());
        }
    }
}
