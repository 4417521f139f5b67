//! Pixel geometry shared by the compositor and the resource broker.
//!
//! All rectangles delivered by the browser are in top-left-origin browser
//! space. The compositor converts them to bottom-left-origin GPU space with
//! [`Rect::to_bottom_left`] when they are consumed.
//!
//! ```
//! use gosub_compositor::render::geometry::{align_up, Rect, SurfaceSize};
//!
//! assert_eq!(align_up(800, 16), 800);
//! assert_eq!(align_up(801, 16), 816);
//!
//! let size = SurfaceSize::new(800, 600);
//! let r = Rect::new(10, 0, 20, 5);
//! assert!(r.fits_within(size));
//! assert_eq!(r.to_bottom_left(600), Rect::new(10, 595, 20, 5));
//! ```

use serde::{Deserialize, Serialize};

/// Bytes per pixel for every format handled by the compositor (BGRA8 / ARGB8).
pub const BYTES_PER_PIXEL: usize = 4;

/// Size of a surface in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Both dimensions rounded up to `alignment`.
    pub fn aligned(&self, alignment: u32) -> SurfaceSize {
        SurfaceSize {
            width: align_up(self.width, alignment),
            height: align_up(self.height, alignment),
        }
    }

    /// Tightly packed row length in bytes.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn byte_len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }
}

/// Rounds `value` up to the next multiple of `alignment`. An alignment of 0 or 1 is a no-op.
pub fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// Axis-aligned pixel rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole surface.
    pub const fn full(size: SurfaceSize) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge. Computed in 64 bits so hostile rectangles cannot overflow.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge (top-left origin).
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.width, self.height)
    }

    /// True when the rectangle lies entirely inside a surface of `size`.
    pub fn fits_within(&self, size: SurfaceSize) -> bool {
        self.right() <= size.width as u64 && self.bottom() <= size.height as u64
    }

    /// Part of the rectangle that lies inside a surface of `size`, if any.
    pub fn clip_to(&self, size: SurfaceSize) -> Option<Rect> {
        let right = self.right().min(size.width as u64);
        let bottom = self.bottom().min(size.height as u64);
        if self.x as u64 >= right || self.y as u64 >= bottom {
            return None;
        }

        Some(Rect {
            x: self.x,
            y: self.y,
            width: (right - self.x as u64) as u32,
            height: (bottom - self.y as u64) as u32,
        })
    }

    /// Smallest rectangle containing both. Empty rectangles do not contribute.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }

        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rect {
            x: left,
            y: top,
            width: (right - left as u64).min(u32::MAX as u64) as u32,
            height: (bottom - top as u64).min(u32::MAX as u64) as u32,
        }
    }

    /// Maps a top-left-origin rectangle into bottom-left-origin space of an image
    /// `image_height` rows tall.
    pub fn to_bottom_left(&self, image_height: u32) -> Rect {
        let bottom = self.bottom().min(image_height as u64) as u32;
        Rect {
            x: self.x,
            y: image_height - bottom,
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiples() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 16), 32);
        assert_eq!(align_up(600, 16), 608);
        assert_eq!(align_up(123, 1), 123);
        assert_eq!(align_up(123, 0), 123);
    }

    #[test]
    fn aligned_size_keeps_exact_dimensions_when_already_aligned() {
        let size = SurfaceSize::new(1024, 768).aligned(16);
        assert_eq!(size, SurfaceSize::new(1024, 768));

        let size = SurfaceSize::new(1366, 601).aligned(16);
        assert_eq!(size, SurfaceSize::new(1376, 608));
    }

    #[test]
    fn union_ignores_empty_rects() {
        let a = Rect::new(10, 10, 5, 5);
        assert_eq!(a.union(&Rect::default()), a);
        assert_eq!(Rect::default().union(&a), a);

        let b = Rect::new(0, 20, 2, 2);
        assert_eq!(a.union(&b), Rect::new(0, 10, 15, 12));
    }

    #[test]
    fn fits_within_handles_overflowing_rects() {
        let size = SurfaceSize::new(100, 100);
        assert!(Rect::new(0, 0, 100, 100).fits_within(size));
        assert!(!Rect::new(1, 0, 100, 100).fits_within(size));
        assert!(!Rect::new(u32::MAX, 0, u32::MAX, 1).fits_within(size));
    }

    #[test]
    fn clipping_keeps_only_the_visible_part() {
        let size = SurfaceSize::new(8, 4);
        assert_eq!(Rect::new(7, 0, 2, 1).clip_to(size), Some(Rect::new(7, 0, 1, 1)));
        assert_eq!(Rect::new(0, 0, 8, 4).clip_to(size), Some(Rect::new(0, 0, 8, 4)));
        assert_eq!(Rect::new(8, 0, 2, 1).clip_to(size), None);
        assert_eq!(Rect::new(0, 2, 0, 1).clip_to(size), None);
        assert_eq!(Rect::new(2, 2, u32::MAX, u32::MAX).clip_to(size), Some(Rect::new(2, 2, 6, 2)));
    }

    #[test]
    fn bottom_left_mapping_flips_rows() {
        // a rect touching the top edge ends up touching the bottom edge
        assert_eq!(Rect::new(0, 0, 4, 2).to_bottom_left(10), Rect::new(0, 8, 4, 2));
        assert_eq!(Rect::new(0, 8, 4, 2).to_bottom_left(10), Rect::new(0, 0, 4, 2));
    }
}
