use crate::config::CompositorConfig;
use serde::{Deserialize, Serialize};

/// Lifecycle of a compositor. This is a state machine driven by `consume`,
/// `resize` and `destroy`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositorState {
    /// Created, session not requested yet (deferred compositors only)
    #[default]
    Uninitialized,
    /// Session requested, waiting for the browser to deliver it
    Initializing,
    /// Session available, frames are being composited
    Active,
    /// Surfaces are being recreated for a new size
    Resizing,
    /// Destroyed; nothing will be composited anymore
    TornDown,
}

impl CompositorState {
    pub fn is_torn_down(&self) -> bool {
        matches!(self, CompositorState::TornDown)
    }
}

/// How the host draws the compositor's output.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaintType {
    /// Nothing is drawn.
    #[default]
    Dummy,
    /// The frame target is drawn as-is.
    RawBlit,
    /// The frame target is composited through a host shader.
    ShaderComposited,
    /// Drawn after the host's own frame; the browser is not paced by begin-frames.
    PostRender,
}

impl PaintType {
    pub fn from_config(config: &CompositorConfig) -> Self {
        if config.raw_blit {
            PaintType::RawBlit
        } else {
            PaintType::ShaderComposited
        }
    }
}

/// Pixel transfer path, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeMode {
    /// Shared texture copied straight into the frame target.
    SharedTextureRaw,
    /// Shared texture drawn upside down through the flip pass, then copied.
    SharedTextureFlipped,
    /// Browser pixels copied row by row on the CPU.
    CpuBuffer,
}

impl CompositeMode {
    pub fn from_config(config: &CompositorConfig) -> Self {
        match (config.shared_texture_enabled(), config.raw_blit) {
            (false, _) => CompositeMode::CpuBuffer,
            (true, true) => CompositeMode::SharedTextureRaw,
            (true, false) => CompositeMode::SharedTextureFlipped,
        }
    }

    pub fn uses_shared_textures(&self) -> bool {
        !matches!(self, CompositeMode::CpuBuffer)
    }
}
