//! Browser frame compositor.
//!
//! Bridges an embedded browser's asynchronous paint events into a host
//! engine's per-frame render step. Each overlay window gets a
//! [`WindowCompositor`]; the browser feeds it through a
//! [`PaintSink`](browser::PaintSink) from any thread, and the host pulls
//! finished frame targets with [`WindowCompositor::consume`] on its rendering
//! thread.

pub mod browser;
pub mod compositor;
pub mod config;
pub mod errors;
pub mod host;
pub mod logging;
pub mod render;

pub use compositor::{
    CompositedFrame, CompositorHandle, CompositorServices, WindowCompositor, WindowRegistry,
};
pub use config::CompositorConfig;
pub use errors::CompositorError;
