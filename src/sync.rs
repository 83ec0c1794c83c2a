//! Frame recovery from an unsynchronized byte stream.
//!
//! The serial link delivers a raw byte stream with no frame boundary signal;
//! the only structure is the fixed header pattern that begins every frame.
//! [`FrameSynchronizer`] accumulates bytes into a rolling window, locates the
//! earliest header match, and yields complete frames.
//!
//! Window policy:
//!
//! - On a missed scan, only the trailing frame-length of the window is kept;
//!   older bytes cannot participate in a frame that has not yet been seen.
//! - When a match is found, the garbage ahead of it is dropped immediately,
//!   but the matched prefix is never discarded while the rest of the frame
//!   streams in.
//! - After a frame is extracted, at most one frame-length of the remaining
//!   bytes is kept as lookahead.
//!
//! Together these bound the retained window to one frame length regardless of
//! link speed. The known cost is that a header starting inside a trimmed
//! region is lost until the stream produces the next one; resynchronization
//! is automatic.

use crate::cancel::CancelToken;
use crate::config::FrameSettings;
use crate::error::AcqResult;
use crate::source::ByteSource;

/// Recovers fixed-length frames from a [`ByteSource`].
pub struct FrameSynchronizer<S: ByteSource> {
    source: S,
    header: Vec<u8>,
    frame_len: usize,
    window: Vec<u8>,
    chunk: Vec<u8>,
}

impl<S: ByteSource> FrameSynchronizer<S> {
    /// Create a synchronizer reading `read_chunk` bytes per request.
    pub fn new(source: S, frame: &FrameSettings, read_chunk: usize) -> Self {
        debug_assert!(!frame.header.is_empty());
        Self {
            source,
            header: frame.header.clone(),
            frame_len: frame.frame_len(),
            window: Vec::with_capacity(frame.frame_len() + read_chunk),
            chunk: vec![0u8; read_chunk],
        }
    }

    /// Block until one complete frame is available.
    ///
    /// Returns `Ok(None)` when cancellation is requested and no complete
    /// frame is already buffered. Read timeouts are absorbed here; only a
    /// fatal source failure surfaces as an error.
    pub fn next_frame(&mut self, cancel: &CancelToken) -> AcqResult<Option<Vec<u8>>> {
        loop {
            if let Some(frame) = self.try_extract() {
                return Ok(Some(frame));
            }
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let n = self.source.read_bytes(&mut self.chunk)?;
            self.window.extend_from_slice(&self.chunk[..n]);
        }
    }

    fn try_extract(&mut self) -> Option<Vec<u8>> {
        match self.find_header() {
            Some(offset) => {
                // Bytes ahead of the match can never belong to this frame.
                if offset > 0 {
                    self.window.drain(..offset);
                }
                if self.window.len() < self.frame_len {
                    return None;
                }
                let frame: Vec<u8> = self.window.drain(..self.frame_len).collect();
                self.trim_to_tail();
                Some(frame)
            }
            None => {
                self.trim_to_tail();
                None
            }
        }
    }

    /// Keep at most one frame-length of trailing bytes.
    fn trim_to_tail(&mut self) {
        if self.window.len() > self.frame_len {
            let excess = self.window.len() - self.frame_len;
            self.window.drain(..excess);
        }
    }

    /// Earliest offset whose next `header.len()` bytes equal the header.
    ///
    /// The earliest match must win: later bytes may be sample data that
    /// coincidentally matches the pattern.
    fn find_header(&self) -> Option<usize> {
        self.window
            .windows(self.header.len())
            .position(|w| w == self.header)
    }
}
