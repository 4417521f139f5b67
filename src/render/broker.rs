//! Device abstraction boundary.
//!
//! The compositor never talks to a GPU API directly. Everything it needs from
//! the host device (texture creation, shared texture import, mapping, the flip
//! pass and pipeline state capture) goes through a [`ResourceBroker`].
//! Calls occur on the host's rendering thread.

use crate::render::frame::{FrameTarget, PixelFormat, ResourceId, TextureUsage};
use crate::render::geometry::{Rect, SurfaceSize};
use crate::render::Viewport;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Cross-process handle to a texture exported by the browser's GPU process.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SharedHandle(pub u64);

impl Display for SharedHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "shared#{:#x}", self.0)
    }
}

/// A shared texture opened on the host device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedTextureRef {
    pub id: ResourceId,
    pub handle: SharedHandle,
    pub size: SurfaceSize,
}

/// Shader resource view over an imported shared texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderViewRef {
    pub id: ResourceId,
    pub texture: ResourceId,
}

/// Intermediate render target used by the flip pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetRef {
    pub id: ResourceId,
    pub size: SurfaceSize,
}

/// How a CPU-mappable frame target is opened for writing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MapMode {
    /// Prior contents are preserved; partial updates are possible.
    Write,
    /// Prior contents are undefined; the caller must rewrite the whole surface.
    WriteDiscard,
}

/// A frame target mapped for CPU writes. Dropping the value unmaps it.
pub trait MappedSurface {
    /// Row pitch of the mapping in bytes. At least `width * 4`.
    fn pitch(&self) -> usize;

    /// Mapped bytes, `pitch * height` long.
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// Primitive topology bound to the input assembler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Topology {
    #[default]
    Undefined,
    TriangleList,
    TriangleStrip,
}

/// Snapshot of the device pipeline bindings the flip pass touches.
///
/// Ids are opaque to the compositor. `None` means "nothing bound".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineState {
    pub render_target: Option<ResourceId>,
    pub depth_stencil: Option<ResourceId>,
    pub blend_state: Option<ResourceId>,
    pub sampler: Option<ResourceId>,
    pub pixel_shader: Option<ResourceId>,
    pub vertex_shader: Option<ResourceId>,
    pub shader_resource: Option<ResourceId>,
    pub input_layout: Option<ResourceId>,
    pub topology: Topology,
    pub viewport: Viewport,
    pub scissor: Rect,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("device not ready")]
    DeviceNotReady,

    #[error("device lost")]
    DeviceLost,

    #[error("out of device memory")]
    OutOfMemory,

    #[error("unknown resource: {0}")]
    UnknownResource(ResourceId),

    #[error("invalid shared handle: {0}")]
    InvalidSharedHandle(SharedHandle),

    #[error("mapping with {0:?} failed")]
    MapFailed(MapMode),

    #[error("zero-sized resource requested")]
    ZeroSized,
}

/// Host device interface used by the compositor.
///
/// All creation calls may fail transiently. The compositor treats a failed
/// creation as "not available this frame" and retries on the next `consume`.
pub trait ResourceBroker: Send + Sync {
    /// Returns the name of the broker, used in log output.
    fn name(&self) -> &str;

    /// Creates a texture the host can draw from.
    fn create_frame_target(
        &self,
        size: SurfaceSize,
        format: PixelFormat,
        usage: TextureUsage,
        generation: u64,
    ) -> Result<FrameTarget, BrokerError>;

    /// Creates the intermediate render target used by the flip pass.
    fn create_render_target(&self, size: SurfaceSize) -> Result<RenderTargetRef, BrokerError>;

    /// Opens a texture exported by another process.
    fn import_shared_handle(
        &self,
        handle: SharedHandle,
        size: SurfaceSize,
    ) -> Result<SharedTextureRef, BrokerError>;

    /// Creates a shader resource view over an imported texture.
    fn create_shader_view(&self, texture: &SharedTextureRef) -> Result<ShaderViewRef, BrokerError>;

    /// Releases any resource created by this broker. Unknown ids are ignored.
    fn release(&self, id: ResourceId);

    /// Maps a CPU-mappable frame target. The mapping is released when the
    /// returned value is dropped.
    fn map<'a>(
        &'a self,
        target: &FrameTarget,
        mode: MapMode,
    ) -> Result<Box<dyn MappedSurface + 'a>, BrokerError>;

    /// Copies a shared texture into a frame target without any shader pass.
    fn blit(&self, dst: &FrameTarget, src: &SharedTextureRef) -> Result<(), BrokerError>;

    /// Binds render target, shader view, flip shaders, sampler, blend state,
    /// viewport and topology for a full-screen flip draw.
    fn bind_flip_pass(
        &self,
        target: &RenderTargetRef,
        view: &ShaderViewRef,
        size: SurfaceSize,
    ) -> Result<(), BrokerError>;

    /// Issues a non-indexed draw with the currently bound pipeline.
    fn draw(&self, vertex_count: u32) -> Result<(), BrokerError>;

    /// Copies a whole render target into a frame target.
    fn copy_resource(&self, dst: &FrameTarget, src: &RenderTargetRef) -> Result<(), BrokerError>;

    /// Captures the pipeline bindings the flip pass is going to change.
    fn capture_pipeline_state(&self) -> PipelineState;

    /// Restores a previously captured pipeline state.
    fn apply_pipeline_state(&self, state: &PipelineState);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_errors_render_readable_messages() {
        assert_eq!(
            BrokerError::UnknownResource(ResourceId(4)).to_string(),
            "unknown resource: res#4"
        );
        assert_eq!(
            BrokerError::InvalidSharedHandle(SharedHandle(0x10)).to_string(),
            "invalid shared handle: shared#0x10"
        );
        assert_eq!(
            BrokerError::MapFailed(MapMode::WriteDiscard).to_string(),
            "mapping with WriteDiscard failed"
        );
    }
}
