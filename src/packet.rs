//! Frame decoding.
//!
//! A complete frame is the fixed header pattern (which doubles as the device
//! address) followed by a row of little-endian `f32` samples. Decoding is a
//! pure function of the frame bytes; the synchronizer guarantees the length
//! precondition.

use crate::config::FrameSettings;
use bytes::{Buf, BufMut};

/// One decoded frame: the device address and its sample row.
///
/// Transient — consumed once by the storage rotator and not retained.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    /// Address bytes carried in the frame header.
    pub address: Vec<u8>,
    /// Sample row, in wire order.
    pub samples: Vec<f32>,
}

/// Splits complete frames into typed packets.
#[derive(Debug, Clone)]
pub struct PacketDecoder {
    header_len: usize,
    samples_per_frame: usize,
}

impl PacketDecoder {
    /// Build a decoder for the configured frame layout.
    pub fn new(frame: &FrameSettings) -> Self {
        Self {
            header_len: frame.header.len(),
            samples_per_frame: frame.samples_per_frame,
        }
    }

    /// Decode a complete frame.
    ///
    /// The input must be exactly one frame long; the synchronizer upholds
    /// this, so a violation is a caller bug.
    pub fn decode(&self, frame: &[u8]) -> DecodedPacket {
        debug_assert_eq!(frame.len(), self.header_len + self.samples_per_frame * 4);

        let address = frame[..self.header_len].to_vec();
        let mut payload = &frame[self.header_len..];
        let samples = (0..self.samples_per_frame)
            .map(|_| payload.get_f32_le())
            .collect();

        DecodedPacket { address, samples }
    }
}

/// Encode one frame in the device's wire format.
///
/// Used by the mock link and by tests; the header pattern is written as the
/// address, exactly as the hardware does.
pub fn encode_frame(frame: &FrameSettings, samples: &[f32]) -> Vec<u8> {
    debug_assert_eq!(samples.len(), frame.samples_per_frame);

    let mut out = Vec::with_capacity(frame.frame_len());
    out.put_slice(&frame.header);
    for sample in samples {
        out.put_f32_le(*sample);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> FrameSettings {
        FrameSettings::default()
    }

    #[test]
    fn decode_splits_address_and_samples() {
        let frame_cfg = layout();
        let samples = vec![0.25f32; frame_cfg.samples_per_frame];
        let wire = encode_frame(&frame_cfg, &samples);
        assert_eq!(wire.len(), 518);

        let packet = PacketDecoder::new(&frame_cfg).decode(&wire);
        assert_eq!(packet.address, frame_cfg.header);
        assert_eq!(packet.samples, samples);
    }

    #[test]
    fn round_trip_is_bit_exact() {
        // Values chosen to exercise the corners of the IEEE-754 layout;
        // compare bit patterns so NaN survives the assertion.
        let frame_cfg = FrameSettings {
            header: vec![0xAA, 0xBB],
            samples_per_frame: 8,
        };
        let samples = [
            0.0f32,
            -0.0,
            1.5,
            -3.25e-12,
            f32::MAX,
            f32::MIN_POSITIVE,
            f32::INFINITY,
            f32::NAN,
        ];

        let wire = encode_frame(&frame_cfg, &samples);
        let packet = PacketDecoder::new(&frame_cfg).decode(&wire);

        for (sent, got) in samples.iter().zip(&packet.samples) {
            assert_eq!(sent.to_bits(), got.to_bits());
        }
    }

    #[test]
    fn samples_are_little_endian_on_the_wire() {
        let frame_cfg = FrameSettings {
            header: vec![0x01],
            samples_per_frame: 1,
        };
        let wire = encode_frame(&frame_cfg, &[1.0f32]);
        assert_eq!(&wire[1..], &1.0f32.to_le_bytes());
    }

    #[test]
    fn zero_payload_decodes_to_zero_samples() {
        let frame_cfg = layout();
        let mut wire = frame_cfg.header.clone();
        wire.extend(std::iter::repeat(0u8).take(frame_cfg.slot_bytes()));

        let packet = PacketDecoder::new(&frame_cfg).decode(&wire);
        assert!(packet.samples.iter().all(|v| *v == 0.0));
    }
}
