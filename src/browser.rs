//! Boundary to the embedded browser engine.
//!
//! The compositor drives a browser through [`BrowserHost`] and
//! [`BrowserSession`]; the browser reports back through a [`PaintSink`].

pub mod events;
pub mod session;

pub use events::{AcceleratedPaint, ControlNotification, ElementType, PaintSink, PaintSource};
pub use session::{BrowserHost, BrowserSession, BrowserTask, SessionRequest};
