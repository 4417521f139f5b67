use crate::render::geometry::SurfaceSize;

/// What the compositor needs to know about the host engine each frame.
pub trait HostEnvironment: Send + Sync {
    /// True once the host's renderer has a usable device.
    fn renderer_ready(&self) -> bool;

    /// Current output resolution of the host's swap chain.
    fn output_resolution(&self) -> SurfaceSize;

    /// Whether browser audio should currently be muted (e.g. game window unfocused).
    fn should_mute(&self) -> bool;
}
