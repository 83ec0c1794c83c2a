//! Memory-mapped segment storage.
//!
//! Decoded sample rows are persisted into a bounded sequence of fixed-size
//! memory-mapped files, each divided into consecutive fixed-size slots holding
//! one row apiece. [`SegmentWriter`] owns a single mapping for its lifetime;
//! [`SegmentRotator`] drives the sequence:
//!
//! ```text
//! NoSegment -> SegmentOpen -> (SegmentFull -> SegmentOpen | Terminated)
//! ```
//!
//! A segment's backing file is created on the first append directed at it and
//! released (flushed, unmapped, closed) the moment it fills. Once the
//! configured segment count is exhausted the rotator is terminated for good;
//! completed segments are never deleted or rewritten, so the data captured up
//! to any failure remains valid on disk.

use crate::config::StorageGeometry;
use crate::error::{AcqError, AcqResult};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Writer for one memory-mapped segment file.
///
/// The mapping is exclusively owned; there is exactly one writer and one open
/// segment at a time.
pub struct SegmentWriter {
    mmap: MmapMut,
    path: PathBuf,
    slot_bytes: usize,
    capacity_slots: u64,
    cursor: u64,
    flushed: bool,
}

impl SegmentWriter {
    /// Create the backing file at exactly `segment_bytes`, zero-filled, and
    /// map it for writing.
    pub fn create(path: &Path, segment_bytes: u64, slot_bytes: usize) -> AcqResult<Self> {
        let storage_err = |source: std::io::Error| AcqError::StorageAllocation {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(storage_err)?;

        // set_len reserves the full extent and reads back as zeros.
        file.set_len(segment_bytes).map_err(storage_err)?;

        // SAFETY: the file was just created at the mapped length and this
        // process holds the only handle to it.
        let mmap = unsafe { MmapOptions::new().map_mut(&file) }.map_err(storage_err)?;

        debug!(path = %path.display(), bytes = segment_bytes, "segment mapped");

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
            slot_bytes,
            capacity_slots: segment_bytes / slot_bytes as u64,
            cursor: 0,
            flushed: false,
        })
    }

    /// Write one sample row into the slot at the cursor and advance.
    ///
    /// The caller must not write past capacity; the rotator rotates first.
    pub fn write_row(&mut self, samples: &[f32]) {
        debug_assert!(self.cursor < self.capacity_slots);
        debug_assert_eq!(samples.len() * 4, self.slot_bytes);

        let start = self.cursor as usize * self.slot_bytes;
        let slot = &mut self.mmap[start..start + self.slot_bytes];
        for (dst, sample) in slot.chunks_exact_mut(4).zip(samples) {
            dst.copy_from_slice(&sample.to_le_bytes());
        }
        self.cursor += 1;
    }

    /// Whether every slot has been written.
    pub fn is_full(&self) -> bool {
        self.cursor >= self.capacity_slots
    }

    /// Slots written so far.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Flush the mapping to disk. Dropping the writer afterwards unmaps and
    /// closes the file.
    pub fn finish(mut self) -> AcqResult<()> {
        self.mmap.flush().map_err(|source| AcqError::StorageAllocation {
            path: self.path.clone(),
            source,
        })?;
        self.flushed = true;
        Ok(())
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        // Abnormal exit path: flush whatever landed in the mapping so a
        // partially written segment survives the process.
        if !self.flushed {
            if let Err(e) = self.mmap.flush() {
                warn!(path = %self.path.display(), error = %e, "segment flush on drop failed");
            }
        }
    }
}

/// Owns the bounded sequence of storage segments.
pub struct SegmentRotator {
    dir: PathBuf,
    geometry: StorageGeometry,
    next_index: u32,
    active: Option<SegmentWriter>,
    segments_completed: u32,
}

impl SegmentRotator {
    /// Prepare a rotator writing `segment-<N>` files under `dir`.
    ///
    /// No segment file is created yet; allocation happens on first append.
    pub fn new(dir: &Path, geometry: StorageGeometry) -> AcqResult<Self> {
        std::fs::create_dir_all(dir).map_err(|source| AcqError::StorageAllocation {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            geometry,
            next_index: 0,
            active: None,
            segments_completed: 0,
        })
    }

    /// Append one sample row to the current segment, rotating as needed.
    ///
    /// Returns [`AcqError::SegmentsExhausted`] once terminated; termination
    /// is absorbing.
    pub fn append(&mut self, samples: &[f32]) -> AcqResult<()> {
        if self.is_terminated() {
            return Err(AcqError::SegmentsExhausted(self.geometry.segment_count));
        }

        if self.active.is_none() {
            let path = self.segment_path(self.next_index);
            info!(path = %path.display(), index = self.next_index + 1, "opening segment");
            self.active = Some(SegmentWriter::create(
                &path,
                self.geometry.segment_bytes,
                self.geometry.slot_bytes,
            )?);
        }

        // The writer is present on every path that reaches here.
        let full = match self.active.as_mut() {
            Some(writer) => {
                writer.write_row(samples);
                writer.is_full()
            }
            None => unreachable!("active segment opened above"),
        };

        if full {
            if let Some(writer) = self.active.take() {
                writer.finish()?;
            }
            self.segments_completed += 1;
            self.next_index += 1;
            if self.next_index >= self.geometry.segment_count {
                info!(
                    segments = self.segments_completed,
                    "all segments full, storage terminated"
                );
            }
        }

        Ok(())
    }

    /// Whether the configured segment count has been exhausted.
    pub fn is_terminated(&self) -> bool {
        self.active.is_none() && self.next_index >= self.geometry.segment_count
    }

    /// Segments completely filled and released so far.
    pub fn segments_completed(&self) -> u32 {
        self.segments_completed
    }

    /// Flush and release the active segment, if any.
    ///
    /// Called on every clean exit, including cancellation, so the last
    /// partially written segment reaches disk.
    pub fn close(&mut self) -> AcqResult<()> {
        if let Some(writer) = self.active.take() {
            debug!(slots = writer.cursor(), "releasing partial segment");
            writer.finish()?;
        }
        Ok(())
    }

    fn segment_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("segment-{}", index + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(slot_bytes: usize, slots_per_segment: u64, segment_count: u32) -> StorageGeometry {
        StorageGeometry {
            slot_bytes,
            slots_per_segment,
            segment_bytes: slots_per_segment * slot_bytes as u64,
            segment_count,
            capacity_samples: slots_per_segment * u64::from(segment_count),
        }
    }

    #[test]
    fn segment_file_has_exact_configured_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment-1");

        let writer = SegmentWriter::create(&path, 4096, 16).unwrap();
        drop(writer);

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
    }

    #[test]
    fn unwritten_slots_read_back_as_zeros() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment-1");

        let mut writer = SegmentWriter::create(&path, 64, 16).unwrap();
        writer.write_row(&[1.0, 2.0, 3.0, 4.0]);
        writer.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes[16..].iter().all(|b| *b == 0));
    }

    #[test]
    fn rows_land_in_consecutive_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment-1");

        let mut writer = SegmentWriter::create(&path, 64, 16).unwrap();
        for i in 0..3 {
            let v = i as f32;
            writer.write_row(&[v, v, v, v]);
        }
        writer.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        for i in 0..3u64 {
            let slot = &bytes[i as usize * 16..(i as usize + 1) * 16];
            let expected = (i as f32).to_le_bytes().repeat(4);
            assert_eq!(slot, &expected[..]);
        }
    }

    #[test]
    fn rotates_when_segment_fills() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotator = SegmentRotator::new(dir.path(), geometry(16, 2, 3)).unwrap();

        // Fill segment 1 exactly; segment 2 must not exist yet.
        rotator.append(&[0.0; 4]).unwrap();
        rotator.append(&[0.0; 4]).unwrap();
        assert_eq!(rotator.segments_completed(), 1);
        assert!(dir.path().join("segment-1").exists());
        assert!(!dir.path().join("segment-2").exists());

        // The next append opens segment 2.
        rotator.append(&[0.0; 4]).unwrap();
        assert!(dir.path().join("segment-2").exists());
        assert!(!rotator.is_terminated());
    }

    #[test]
    fn terminates_after_last_segment_and_rejects_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotator = SegmentRotator::new(dir.path(), geometry(16, 2, 2)).unwrap();

        for _ in 0..4 {
            rotator.append(&[0.5; 4]).unwrap();
        }
        assert!(rotator.is_terminated());
        assert_eq!(rotator.segments_completed(), 2);

        match rotator.append(&[0.5; 4]) {
            Err(AcqError::SegmentsExhausted(count)) => assert_eq!(count, 2),
            other => panic!("expected SegmentsExhausted, got {other:?}"),
        }
    }

    #[test]
    fn close_flushes_partial_segment() {
        let dir = tempfile::tempdir().unwrap();
        let mut rotator = SegmentRotator::new(dir.path(), geometry(16, 4, 1)).unwrap();

        rotator.append(&[9.0; 4]).unwrap();
        rotator.close().unwrap();

        let bytes = std::fs::read(dir.path().join("segment-1")).unwrap();
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[..4], &9.0f32.to_le_bytes());
        // Closing a partial segment does not terminate the rotator's sequence
        // accounting; only exhausting the count does.
        assert_eq!(rotator.segments_completed(), 0);
    }
}
