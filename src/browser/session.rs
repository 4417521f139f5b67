use crate::browser::events::{ElementType, PaintSink};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parameters for a new windowless browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub windowless: bool,
    pub shared_texture_enabled: bool,
    pub external_begin_frame_enabled: bool,
    pub width: u32,
    pub height: u32,
    pub url: String,
    pub windowless_frame_rate: u32,
    /// Per-context cache directory. `None` uses the browser's global context.
    pub cache_path: Option<PathBuf>,
}

/// A live browser instance rendering offscreen for one compositor.
///
/// Methods may be called from the host's rendering thread; implementations
/// forward them to the browser as needed.
pub trait BrowserSession: Send + Sync {
    /// Tells the browser to query the view size again.
    fn was_resized(&self);

    /// Asks the browser to produce a frame now.
    fn send_external_begin_frame(&self);

    fn set_audio_muted(&self, muted: bool);

    /// Delivers a poll message to the page.
    fn send_poll(&self, argument: &str);

    /// Requests a full repaint of an element.
    fn invalidate(&self, element: ElementType);

    /// Requests the browser to close. Must be called on the browser thread.
    fn close(&self, force: bool);
}

/// Work item run on the browser's UI thread.
pub type BrowserTask = Box<dyn FnOnce() + Send + 'static>;

/// The browser engine as seen by the compositor.
pub trait BrowserHost: Send + Sync {
    /// Starts asynchronous creation of a session. The session is handed back
    /// through [`PaintSink::session_created`] once it exists.
    fn create_session(&self, request: SessionRequest, sink: PaintSink) -> anyhow::Result<()>;

    /// True when called on the browser's UI thread.
    fn on_browser_thread(&self) -> bool;

    /// Runs `task` on the browser's UI thread at some later point.
    fn post_task(&self, task: BrowserTask);
}
