use crate::browser::PaintSink;
use crate::compositor::WindowCompositor;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Unique identifier of a compositor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositorId(Uuid);

impl CompositorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CompositorId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CompositorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owning handle to a compositor.
///
/// The registry only keeps weak references, so the compositor lives as long
/// as at least one handle does. Dropping the last handle tears it down.
#[derive(Clone)]
pub struct CompositorHandle {
    id: CompositorId,
    inner: Arc<Mutex<WindowCompositor>>,
    sink: PaintSink,
}

impl CompositorHandle {
    pub(crate) fn new(id: CompositorId, inner: Arc<Mutex<WindowCompositor>>, sink: PaintSink) -> Self {
        Self { id, inner, sink }
    }

    pub fn id(&self) -> CompositorId {
        self.id
    }

    /// Sink to give to browser callbacks.
    pub fn sink(&self) -> PaintSink {
        self.sink.clone()
    }

    /// Locks the compositor for a render-thread operation.
    pub fn lock(&self) -> MutexGuard<'_, WindowCompositor> {
        lock_compositor(&self.inner)
    }
}

pub(crate) fn lock_compositor(inner: &Mutex<WindowCompositor>) -> MutexGuard<'_, WindowCompositor> {
    inner.lock().unwrap_or_else(|poisoned| {
        log::warn!("compositor lock poisoned, recovering");
        poisoned.into_inner()
    })
}
