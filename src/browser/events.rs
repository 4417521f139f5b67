//! Notifications flowing from the browser into a compositor.
//!
//! Browser callbacks arrive on arbitrary threads. Everything that needs the
//! device is queued and picked up by the next `consume` on the rendering
//! thread; CPU pixel buffers are only valid for the duration of the callback,
//! so they are copied into the staging buffer right away.

use crate::browser::session::BrowserSession;
use crate::compositor::{CompositorId, SharedSurface};
use crate::render::broker::SharedHandle;
use crate::render::geometry::{Rect, SurfaceSize};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Which surface of a browser a paint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// The main page view.
    View,
    /// A popup widget (e.g. an open `<select>`), drawn on top of the view.
    Popup,
}

/// Pixel data of a paint callback.
#[derive(Debug, Clone, Copy)]
pub enum PaintSource<'a> {
    /// GPU texture shared by the browser process.
    Shared {
        handle: SharedHandle,
        size: SurfaceSize,
    },
    /// Tightly packed BGRA pixels, only valid for the duration of the call.
    Pixels {
        data: &'a [u8],
        width: u32,
        height: u32,
    },
}

/// A shared texture paint waiting for the rendering thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratedPaint {
    pub element: ElementType,
    pub handle: SharedHandle,
    pub size: SurfaceSize,
    pub dirty: Vec<Rect>,
}

impl AcceleratedPaint {
    /// Replaces this paint with a newer one of the same element. The newer
    /// texture contains every change, so damage of the same size accumulates.
    pub fn supersede(&mut self, newer: AcceleratedPaint) {
        if newer.size == self.size {
            self.dirty.extend(newer.dirty);
        } else {
            self.dirty = newer.dirty;
        }
        self.handle = newer.handle;
        self.size = newer.size;
    }
}

pub enum ControlNotification {
    SessionCreated(Arc<dyn BrowserSession>),
    PopupShown(bool),
    PopupRect(Rect),
}

impl Debug for ControlNotification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionCreated(_) => write!(f, "SessionCreated"),
            Self::PopupShown(shown) => write!(f, "PopupShown({shown})"),
            Self::PopupRect(rect) => write!(f, "PopupRect({rect:?})"),
        }
    }
}

/// Entry point for browser callbacks into one compositor. Cheap to clone and
/// safe to use from any thread.
#[derive(Clone)]
pub struct PaintSink {
    compositor: CompositorId,
    surface: Arc<SharedSurface>,
    paints: mpsc::Sender<AcceleratedPaint>,
    control: mpsc::UnboundedSender<ControlNotification>,
}

impl PaintSink {
    pub(crate) fn new(
        compositor: CompositorId,
        surface: Arc<SharedSurface>,
        paints: mpsc::Sender<AcceleratedPaint>,
        control: mpsc::UnboundedSender<ControlNotification>,
    ) -> Self {
        Self {
            compositor,
            surface,
            paints,
            control,
        }
    }

    pub fn compositor_id(&self) -> CompositorId {
        self.compositor
    }

    /// False once the compositor started tearing down.
    pub fn is_valid(&self) -> bool {
        self.surface.is_valid() && !self.control.is_closed()
    }

    /// Hands a browser paint to the compositor.
    ///
    /// Returns whether the paint was accepted. Paints are dropped after
    /// teardown began and for CPU popups. When the paint queue is full the
    /// newest shared texture paint of each element is kept aside, and the
    /// compositor applies it after the queued ones.
    pub fn record_paint_event(
        &self,
        source: PaintSource<'_>,
        dirty_rects: &[Rect],
        element: ElementType,
    ) -> bool {
        if !self.surface.is_valid() {
            log::trace!("compositor {} torn down, dropping paint", self.compositor);
            return false;
        }

        match source {
            PaintSource::Shared { handle, size } => {
                let paint = AcceleratedPaint {
                    element,
                    handle,
                    size,
                    dirty: dirty_rects.to_vec(),
                };

                // once an element overflowed, its later paints must not overtake it
                let mut overflow = self.surface.overflow();
                if let Some(pending) = overflow.iter_mut().find(|p| p.element == element) {
                    pending.supersede(paint);
                    return true;
                }

                match self.paints.try_send(paint) {
                    Ok(()) => true,
                    Err(TrySendError::Full(paint)) => {
                        log::debug!(
                            "paint queue of compositor {} is full, holding {} aside",
                            self.compositor,
                            paint.handle
                        );
                        overflow.push(paint);
                        true
                    }
                    Err(TrySendError::Closed(_)) => {
                        log::trace!("compositor {} gone, dropping paint", self.compositor);
                        false
                    }
                }
            }
            PaintSource::Pixels {
                data,
                width,
                height,
            } => {
                if element == ElementType::Popup {
                    log::debug!("CPU popup paints are not composited, dropping");
                    return false;
                }
                self.surface.write_pixels(data, width, height, dirty_rects)
            }
        }
    }

    /// Delivers a newly created session. If the compositor is already gone
    /// the session is closed right away.
    pub fn session_created(&self, session: Arc<dyn BrowserSession>) {
        if !self.surface.is_valid() {
            log::info!(
                "session for compositor {} arrived after teardown, closing",
                self.compositor
            );
            session.close(true);
            return;
        }

        if let Err(mpsc::error::SendError(ControlNotification::SessionCreated(session))) =
            self.control.send(ControlNotification::SessionCreated(session))
        {
            log::info!("compositor {} gone, closing late session", self.compositor);
            session.close(true);
        }
    }

    pub fn popup_shown(&self, shown: bool) {
        self.send_control(ControlNotification::PopupShown(shown));
    }

    /// New position and size of the popup, in view coordinates.
    pub fn popup_rect(&self, rect: Rect) {
        self.send_control(ControlNotification::PopupRect(rect));
    }

    fn send_control(&self, notification: ControlNotification) {
        if !self.surface.is_valid() {
            return;
        }
        if self.control.send(notification).is_err() {
            log::trace!("compositor {} gone, dropping notification", self.compositor);
        }
    }
}

impl Debug for PaintSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaintSink")
            .field("compositor", &self.compositor)
            .field("valid", &self.surface.is_valid())
            .finish()
    }
}
