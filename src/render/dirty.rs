//! Dirty region tracking between consumption cycles.
//!
//! The browser reports which parts of its view changed in top-left-origin
//! coordinates. Depending on how a compositor transfers pixels, those
//! rectangles are either kept individually (CPU row copies, where every
//! rectangle is copied on its own) or folded into one bounding rectangle
//! (shared texture blits, which always copy the whole surface and only need
//! the damage bound for the host).
//!
//! Copies performed here flip the image vertically: source row `y` lands on
//! destination row `height - y - 1`.

use crate::render::geometry::{Rect, SurfaceSize, BYTES_PER_PIXEL};
use std::collections::VecDeque;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirtyRegionTracker {
    /// Single bounding rectangle, used for shared texture paths.
    Coalesced(Option<Rect>),
    /// Every rectangle in arrival order, used for the CPU path.
    Queued(VecDeque<Rect>),
}

/// Outcome of a drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub applied: usize,
    pub dropped: usize,
    /// Union of the applied rectangles, bottom-left origin.
    pub damage: Option<Rect>,
}

impl DirtyRegionTracker {
    pub fn coalesced() -> Self {
        Self::Coalesced(None)
    }

    pub fn queued() -> Self {
        Self::Queued(VecDeque::new())
    }

    /// Records a changed rectangle. Empty rectangles are ignored.
    pub fn add_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }

        match self {
            Self::Coalesced(bounds) => {
                *bounds = Some(bounds.map_or(rect, |existing| existing.union(&rect)));
            }
            Self::Queued(queue) => queue.push_back(rect),
        }
    }

    pub fn clear(&mut self) {
        match self {
            Self::Coalesced(bounds) => *bounds = None,
            Self::Queued(queue) => queue.clear(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Coalesced(bounds) => bounds.is_none(),
            Self::Queued(queue) => queue.is_empty(),
        }
    }

    /// Number of pending rectangles.
    pub fn pending(&self) -> usize {
        match self {
            Self::Coalesced(bounds) => usize::from(bounds.is_some()),
            Self::Queued(queue) => queue.len(),
        }
    }

    /// Bounding rectangle of everything pending, clipped to `image` and
    /// mapped to its bottom-left-origin space. Does not clear the tracker.
    pub fn bounds(&self, image: SurfaceSize) -> Option<Rect> {
        let clipped = |r: &Rect| r.clip_to(image);
        let bounds = match self {
            Self::Coalesced(bounds) => bounds.as_ref().and_then(clipped),
            Self::Queued(queue) => queue.iter().filter_map(clipped).reduce(|a, r| a.union(&r)),
        };

        bounds.map(|r| r.to_bottom_left(image.height))
    }

    /// Like [`bounds`](Self::bounds), but clears the tracker.
    pub fn take_bounds(&mut self, image: SurfaceSize) -> Option<Rect> {
        let bounds = self.bounds(image);
        self.clear();
        bounds
    }

    /// Copies every pending rectangle from `source` into `target`, flipping rows.
    ///
    /// `image` is the logical size of the picture in both buffers. Rectangles
    /// that do not lie fully inside the image, or that would index outside
    /// either buffer, are dropped and do not count towards the damage. The
    /// tracker is empty afterwards.
    pub fn drain_and_apply(
        &mut self,
        target: &mut [u8],
        target_pitch: usize,
        source: &[u8],
        source_stride: usize,
        image: SurfaceSize,
    ) -> DrainStats {
        let mut stats = DrainStats::default();

        let rects: Vec<Rect> = match self {
            Self::Coalesced(bounds) => bounds.take().into_iter().collect(),
            Self::Queued(queue) => queue.drain(..).collect(),
        };

        for rect in rects {
            if copy_rect_flipped(target, target_pitch, source, source_stride, image, rect) {
                stats.applied += 1;
                let flipped = rect.to_bottom_left(image.height);
                stats.damage = Some(stats.damage.map_or(flipped, |d| d.union(&flipped)));
            } else {
                log::trace!("dropping dirty rect {rect:?} outside of {image:?}");
                stats.dropped += 1;
            }
        }

        stats
    }

    /// Discards pending rectangles and copies the whole image, flipping rows.
    ///
    /// Used after a write-discard mapping, where the target's previous
    /// contents are undefined. Returns false when the buffers are too small.
    pub fn copy_full(
        &mut self,
        target: &mut [u8],
        target_pitch: usize,
        source: &[u8],
        source_stride: usize,
        image: SurfaceSize,
    ) -> bool {
        self.clear();
        if image.is_empty() {
            return true;
        }

        copy_rect_flipped(
            target,
            target_pitch,
            source,
            source_stride,
            image,
            Rect::full(image),
        )
    }
}

/// Copies one rectangle row by row into the vertically flipped position.
/// Returns false, without touching `target`, if any part is out of range.
fn copy_rect_flipped(
    target: &mut [u8],
    target_pitch: usize,
    source: &[u8],
    source_stride: usize,
    image: SurfaceSize,
    rect: Rect,
) -> bool {
    if rect.is_empty() || !rect.fits_within(image) {
        return false;
    }

    let row_len = rect.width as usize * BYTES_PER_PIXEL;
    let col = rect.x as usize * BYTES_PER_PIXEL;
    if col + row_len > target_pitch || col + row_len > source_stride {
        return false;
    }

    let first = rect.y as usize;
    let last = first + rect.height as usize - 1;
    let height = image.height as usize;

    // bottom-most source row lands lowest in the target, so it bounds both buffers
    let source_end = last * source_stride + col + row_len;
    let target_end = (height - first - 1) * target_pitch + col + row_len;
    if source_end > source.len() || target_end > target.len() {
        return false;
    }

    for y in first..=last {
        let src = y * source_stride + col;
        let dst = (height - y - 1) * target_pitch + col;
        target[dst..dst + row_len].copy_from_slice(&source[src..src + row_len]);
    }

    true
}
