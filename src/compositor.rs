//! Per-window compositing.
//!
//! A [`WindowCompositor`] owns one browser session's output surfaces and turns
//! the browser's asynchronous paint notifications into frame targets the
//! host can draw, one `consume` at a time.

mod handle;
mod registry;
mod staging;
pub mod state;
mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use handle::{CompositorHandle, CompositorId};
pub use registry::{CloseTicket, WindowRegistry};
pub(crate) use staging::SharedSurface;
pub use state::{CompositeMode, CompositorState, PaintType};
pub use window::{CompositedFrame, CompositorServices, PopupFrame, WindowCompositor};
