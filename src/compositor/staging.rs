use crate::browser::events::AcceleratedPaint;
use crate::render::dirty::DirtyRegionTracker;
use crate::render::geometry::{Rect, SurfaceSize, BYTES_PER_PIXEL};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// CPU copy of the browser's last painted frame.
///
/// Dimensions are rounded up to the configured alignment; only the top-left
/// `size` part holds picture data.
#[derive(Debug)]
pub struct StagingBuffer {
    size: SurfaceSize,
    aligned: SurfaceSize,
    bytes: Vec<u8>,
}

impl StagingBuffer {
    pub fn new(size: SurfaceSize, alignment: u32) -> Self {
        let aligned = size.aligned(alignment);
        Self {
            size,
            aligned,
            bytes: vec![0u8; aligned.byte_len()],
        }
    }

    /// Logical picture size.
    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn aligned_size(&self) -> SurfaceSize {
        self.aligned
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.aligned.row_bytes()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies a tightly packed `size` image into the buffer.
    fn write_rows(&mut self, data: &[u8]) {
        let row = self.size.row_bytes();
        let stride = self.stride();
        for (y, src) in data.chunks_exact(row).take(self.size.height as usize).enumerate() {
            let dst = y * stride;
            self.bytes[dst..dst + row].copy_from_slice(src);
        }
    }
}

/// Staging data guarded by the surface lock.
#[derive(Debug)]
pub struct StagingState {
    pub buffer: Option<StagingBuffer>,
    pub tracker: DirtyRegionTracker,
    pub generation: u64,
}

/// State shared between a compositor and the browser callbacks feeding it.
///
/// The browser writes from its own threads; the compositor reads on the
/// rendering thread. `valid` goes false once teardown starts and never
/// comes back.
#[derive(Debug)]
pub struct SharedSurface {
    valid: AtomicBool,
    dirty: AtomicBool,
    staging: Mutex<StagingState>,
    /// Newest shared texture paint per element that did not fit the paint queue.
    overflow: Mutex<Vec<AcceleratedPaint>>,
}

impl SharedSurface {
    pub fn new(tracker: DirtyRegionTracker) -> Self {
        Self {
            valid: AtomicBool::new(true),
            dirty: AtomicBool::new(false),
            staging: Mutex::new(StagingState {
                buffer: None,
                tracker,
                generation: 0,
            }),
            overflow: Mutex::new(Vec::new()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Returns whether the surface was dirty and clears the flag.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn lock(&self) -> MutexGuard<'_, StagingState> {
        self.staging.lock().unwrap_or_else(|poisoned| {
            log::warn!("staging lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn overflow(&self) -> MutexGuard<'_, Vec<AcceleratedPaint>> {
        self.overflow.lock().unwrap_or_else(|poisoned| {
            log::warn!("overflow lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Empties the overflow slots. Their paints are newer than anything still
    /// in the paint queue.
    pub fn take_overflow(&self) -> Vec<AcceleratedPaint> {
        std::mem::take(&mut *self.overflow())
    }

    /// Starts a new buffer generation at `size`. Pending rectangles belong to
    /// the old generation and are discarded.
    pub fn reset_staging(&self, size: SurfaceSize, alignment: u32, generation: u64) {
        let mut staging = self.lock();
        staging.buffer = Some(StagingBuffer::new(size, alignment));
        staging.tracker.clear();
        staging.generation = generation;
    }

    pub fn release_staging(&self) {
        let mut staging = self.lock();
        staging.buffer = None;
        staging.tracker.clear();
    }

    /// Records damage without pixel data (shared texture paths).
    pub fn add_damage(&self, rects: &[Rect]) {
        let mut staging = self.lock();
        for rect in rects {
            staging.tracker.add_rect(*rect);
        }
    }

    /// Copies a CPU paint into the staging buffer and queues its dirty rectangles.
    ///
    /// The paint is dropped if it does not match the current buffer size,
    /// which happens while the browser has not caught up with a resize.
    pub fn write_pixels(&self, data: &[u8], width: u32, height: u32, rects: &[Rect]) -> bool {
        let size = SurfaceSize::new(width, height);
        let mut staging = self.lock();
        let state = &mut *staging;

        let Some(buffer) = state.buffer.as_mut() else {
            log::trace!("no staging buffer yet, dropping {width}x{height} paint");
            return false;
        };
        if size.is_empty() || buffer.size() != size {
            log::trace!(
                "paint of {width}x{height} does not match staging size {:?}",
                buffer.size()
            );
            return false;
        }
        if data.len() < size.width as usize * size.height as usize * BYTES_PER_PIXEL {
            log::trace!("paint buffer too short: {} bytes", data.len());
            return false;
        }

        buffer.write_rows(data);
        for rect in rects {
            state.tracker.add_rect(*rect);
        }
        drop(staging);

        self.mark_dirty();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_dimensions_are_aligned() {
        let buffer = StagingBuffer::new(SurfaceSize::new(801, 600), 16);
        assert_eq!(buffer.size(), SurfaceSize::new(801, 600));
        assert_eq!(buffer.aligned_size(), SurfaceSize::new(816, 608));
        assert_eq!(buffer.stride(), 816 * 4);
        assert_eq!(buffer.bytes().len(), 816 * 608 * 4);
    }

    #[test]
    fn paints_of_the_wrong_size_are_dropped() {
        let surface = SharedSurface::new(DirtyRegionTracker::queued());
        let data = vec![1u8; 4 * 4 * 4];
        assert!(!surface.write_pixels(&data, 4, 4, &[Rect::new(0, 0, 4, 4)]));

        surface.reset_staging(SurfaceSize::new(8, 8), 16, 1);
        assert!(!surface.write_pixels(&data, 4, 4, &[Rect::new(0, 0, 4, 4)]));
        assert!(!surface.take_dirty());
    }

    #[test]
    fn paint_marks_dirty_and_queues_rects() {
        let surface = SharedSurface::new(DirtyRegionTracker::queued());
        surface.reset_staging(SurfaceSize::new(4, 2), 16, 1);

        let mut data = vec![0u8; 4 * 2 * 4];
        data[16..].fill(9);
        assert!(surface.write_pixels(&data, 4, 2, &[Rect::new(0, 1, 4, 1)]));
        assert!(surface.take_dirty());
        assert!(!surface.take_dirty());

        let staging = surface.lock();
        assert_eq!(staging.tracker.pending(), 1);
        let buffer = staging.buffer.as_ref().expect("buffer");
        let stride = buffer.stride();
        assert!(buffer.bytes()[stride..stride + 16].iter().all(|b| *b == 9));
        assert!(buffer.bytes()[..16].iter().all(|b| *b == 0));
    }

    #[test]
    fn reset_starts_a_new_generation() {
        let surface = SharedSurface::new(DirtyRegionTracker::queued());
        surface.reset_staging(SurfaceSize::new(4, 4), 16, 1);
        surface.add_damage(&[Rect::new(0, 0, 1, 1)]);

        surface.reset_staging(SurfaceSize::new(8, 8), 16, 2);
        let staging = surface.lock();
        assert!(staging.tracker.is_empty());
        assert_eq!(staging.generation, 2);
    }
}
