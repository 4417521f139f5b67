//! Rasterizer viewport definition.
//!
//! A [`Viewport`] is the region of the bound render target that a draw call
//! rasterizes into. It is part of the [`PipelineState`](crate::render::broker::PipelineState)
//! snapshot taken around the flip pass, so it must round-trip exactly.
//!
//! ```
//! use gosub_compositor::render::Viewport;
//! use gosub_compositor::render::geometry::SurfaceSize;
//!
//! let vp = Viewport::covering(SurfaceSize::new(1920, 1080));
//! assert_eq!(vp.width, 1920);
//! assert_eq!(vp.aspect_ratio(), 1920.0 / 1080.0);
//! ```

use crate::render::geometry::SurfaceSize;

/// Represents the viewport for rasterization.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct Viewport {
    /// Horizontal offset in pixels from the origin.
    pub x: i32,

    /// Vertical offset in pixels from the origin.
    pub y: i32,

    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Viewport {{ x: {}, y: {}, width: {}, height: {} }}",
            self.x, self.y, self.width, self.height
        )
    }
}

impl Viewport {
    /// Creates a new [`Viewport`] with the given position and size.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Viewport covering a whole surface starting at the origin.
    pub fn covering(size: SurfaceSize) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Returns the aspect ratio (`width / height`) as `f32`.
    ///
    /// Returns `0.0` if `height` is `0` to avoid division by zero.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Converts this viewport to a [`SurfaceSize`].
    pub fn as_size(&self) -> SurfaceSize {
        SurfaceSize::new(self.width, self.height)
    }
}
