//! Frame storage: the textures the host draws from.

use crate::render::geometry::SurfaceSize;
use bitflags::bitflags;
use std::fmt::{Display, Formatter};

/// Opaque identifier for a device resource created by a [`ResourceBroker`](crate::render::broker::ResourceBroker).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// Pixel layouts a frame target can be created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bits per channel, byte order B, G, R, A. What the browser paints in.
    Bgra8,
    /// Packed 32 bit ARGB as used by the host's UI textures.
    Argb8,
}

bitflags! {
    /// How a texture will be used by the device.
    pub struct TextureUsage: u8 {
        const SHADER_RESOURCE = 0b0001;
        const RENDER_TARGET   = 0b0010;
        const CPU_WRITE       = 0b0100;
        const COPY_DST        = 0b1000;
    }
}

/// Where the pixels of a [`FrameTarget`] live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameBacking {
    /// GPU-only texture, written by blits or copies.
    Gpu,
    /// Texture that can be mapped for CPU writes (fallback path).
    CpuMappable,
}

/// A texture the host samples from when drawing the overlay.
///
/// Frame targets are cheap to clone: they only carry the device id and
/// metadata. The generation counter increases every time a compositor
/// recreates its target (initial creation, resize, popup re-layout), so a host
/// can tell whether a cached handle still refers to the current surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameTarget {
    id: ResourceId,
    size: SurfaceSize,
    format: PixelFormat,
    backing: FrameBacking,
    generation: u64,
}

impl FrameTarget {
    pub fn new(
        id: ResourceId,
        size: SurfaceSize,
        format: PixelFormat,
        backing: FrameBacking,
    ) -> Self {
        Self {
            id,
            size,
            format,
            backing,
            generation: 0,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.size.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn backing(&self) -> FrameBacking {
        self.backing
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_carried_on_clone() {
        let target = FrameTarget::new(
            ResourceId(7),
            SurfaceSize::new(64, 32),
            PixelFormat::Bgra8,
            FrameBacking::Gpu,
        )
        .with_generation(3);

        let copy = target.clone();
        assert_eq!(copy.generation(), 3);
        assert_eq!(copy.id(), ResourceId(7));
        assert_eq!(copy.width(), 64);
        assert_eq!(copy.height(), 32);
    }

    #[test]
    fn usage_flags_combine() {
        let usage = TextureUsage::SHADER_RESOURCE | TextureUsage::CPU_WRITE;
        assert!(usage.contains(TextureUsage::CPU_WRITE));
        assert!(!usage.contains(TextureUsage::RENDER_TARGET));
    }
}
