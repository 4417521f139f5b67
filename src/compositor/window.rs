use crate::browser::events::{AcceleratedPaint, ControlNotification, ElementType, PaintSink};
use crate::browser::session::{BrowserHost, BrowserSession, SessionRequest};
use crate::compositor::handle::{lock_compositor, CompositorHandle, CompositorId};
use crate::compositor::registry::{CloseTicket, WindowRegistry};
use crate::compositor::staging::SharedSurface;
use crate::compositor::state::{CompositeMode, CompositorState, PaintType};
use crate::config::CompositorConfig;
use crate::errors::CompositorError;
use crate::host::HostEnvironment;
use crate::render::broker::{
    BrokerError, MapMode, RenderTargetRef, ResourceBroker, ShaderViewRef, SharedHandle,
    SharedTextureRef,
};
use crate::render::dirty::DirtyRegionTracker;
use crate::render::frame::{FrameTarget, PixelFormat, ResourceId, TextureUsage};
use crate::render::geometry::{Rect, SurfaceSize};
use crate::render::pipeline::PipelineStateGuard;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;

/// Vertices of the full-screen triangle strip drawn by the flip pass.
const FLIP_QUAD_VERTICES: u32 = 4;

/// Collaborators a compositor works with.
#[derive(Clone)]
pub struct CompositorServices {
    pub broker: Arc<dyn ResourceBroker>,
    pub host: Arc<dyn HostEnvironment>,
    pub browser: Arc<dyn BrowserHost>,
    pub registry: Arc<WindowRegistry>,
}

/// Popup surface as handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupFrame {
    pub target: FrameTarget,
    /// Position of the popup over the view, top-left origin.
    pub rect: Rect,
}

/// Result of a [`WindowCompositor::consume`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositedFrame {
    /// Primary surface.
    pub target: FrameTarget,
    pub popup: Option<PopupFrame>,
    /// Area changed by this call, bottom-left origin.
    pub damage: Option<Rect>,
    /// Whether any pixels were transferred by this call.
    pub updated: bool,
}

/// An imported shared texture and the view sampling it.
#[derive(Debug)]
struct SharedBinding {
    texture: SharedTextureRef,
    view: ShaderViewRef,
    /// Set when the surface it was bound for has been resized away.
    stale: bool,
}

impl SharedBinding {
    fn handle(&self) -> SharedHandle {
        self.texture.handle
    }

    fn resources(&self) -> [ResourceId; 2] {
        [self.view.id, self.texture.id]
    }
}

#[derive(Debug, Default)]
struct Popup {
    rect: Rect,
    visible: bool,
    target: Option<FrameTarget>,
    binding: Option<SharedBinding>,
}

/// Composites one browser session into frame targets for the host.
///
/// Created with [`WindowCompositor::create`], which registers it and returns a
/// [`CompositorHandle`]. All methods are meant to be called on the host's
/// rendering thread; browser callbacks go through the [`PaintSink`].
pub struct WindowCompositor {
    id: CompositorId,
    config: CompositorConfig,
    services: CompositorServices,
    state: CompositorState,
    mode: CompositeMode,
    paint_type: PaintType,
    size: SurfaceSize,
    generation: u64,

    surface: Arc<SharedSurface>,
    sink: PaintSink,
    paint_rx: mpsc::Receiver<AcceleratedPaint>,
    control_rx: mpsc::UnboundedReceiver<ControlNotification>,

    session: Option<Arc<dyn BrowserSession>>,
    primary: Option<FrameTarget>,
    binding: Option<SharedBinding>,
    flip_target: Option<RenderTargetRef>,
    popup: Popup,

    resize_notify_pending: bool,
    poll_queue: Vec<String>,
    muted: bool,
    focused: bool,
    last_frame_time: Option<Instant>,
    last_message_time: Option<Instant>,
}

impl WindowCompositor {
    /// Creates and registers a compositor.
    ///
    /// Unless the config is `deferred`, the browser session is requested right
    /// away; otherwise that happens on the first [`consume`](Self::consume).
    pub fn create(
        config: CompositorConfig,
        services: CompositorServices,
    ) -> Result<CompositorHandle, CompositorError> {
        config.validate()?;

        let id = CompositorId::new();
        let mode = CompositeMode::from_config(&config);
        let tracker = match mode {
            CompositeMode::CpuBuffer => DirtyRegionTracker::queued(),
            _ => DirtyRegionTracker::coalesced(),
        };
        let surface = Arc::new(SharedSurface::new(tracker));
        let (paint_tx, paint_rx) = mpsc::channel(config.paint_queue_capacity);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let sink = PaintSink::new(id, Arc::clone(&surface), paint_tx, control_tx);

        let compositor = WindowCompositor {
            id,
            size: SurfaceSize::new(config.width, config.height),
            paint_type: PaintType::from_config(&config),
            mode,
            config,
            services: services.clone(),
            state: CompositorState::Uninitialized,
            generation: 0,
            surface,
            sink: sink.clone(),
            paint_rx,
            control_rx,
            session: None,
            primary: None,
            binding: None,
            flip_target: None,
            popup: Popup::default(),
            resize_notify_pending: false,
            poll_queue: Vec::new(),
            muted: false,
            focused: false,
            last_frame_time: None,
            last_message_time: None,
        };

        let deferred = compositor.config.deferred;
        let inner = Arc::new(Mutex::new(compositor));
        services.registry.add(id, &inner);
        log::info!("compositor {id} created ({mode:?}) on {}", services.broker.name());

        if !deferred {
            lock_compositor(&inner).initialize()?;
        }

        Ok(CompositorHandle::new(id, inner, sink))
    }

    /// Requests the browser session and, if the renderer is ready, creates the
    /// initial frame target. Does nothing once initialized.
    pub fn initialize(&mut self) -> Result<(), CompositorError> {
        match self.state {
            CompositorState::Uninitialized => {}
            CompositorState::TornDown => return Err(CompositorError::TornDown),
            _ => return Ok(()),
        }

        self.state = CompositorState::Initializing;
        self.start_generation();

        let cache_path = self.config.cache_path();
        if let Some(path) = &cache_path {
            if let Err(source) = std::fs::create_dir_all(path) {
                self.state = CompositorState::Uninitialized;
                return Err(CompositorError::CachePath {
                    path: path.clone(),
                    source,
                });
            }
        }

        let request = SessionRequest {
            windowless: true,
            shared_texture_enabled: self.config.shared_texture_enabled(),
            external_begin_frame_enabled: self.config.external_begin_frame_enabled(),
            width: self.size.width,
            height: self.size.height,
            url: self.config.url.clone(),
            windowless_frame_rate: self.config.windowless_frame_rate,
            cache_path,
        };

        if let Err(e) = self
            .services
            .browser
            .create_session(request, self.sink.clone())
        {
            log::warn!("compositor {}: session creation failed: {e:#}", self.id);
            self.state = CompositorState::Uninitialized;
            return Err(CompositorError::SessionCreate(e));
        }

        if self.services.host.renderer_ready() {
            self.ensure_targets();
        }

        log::debug!("compositor {}: session requested", self.id);
        Ok(())
    }

    /// Per-frame pull from the host's render step.
    ///
    /// Applies everything the browser delivered since the last call and
    /// returns the current frame, or `None` while no frame target exists yet
    /// or after teardown. Failures degrade to a stale frame; nothing is
    /// returned as an error.
    pub fn consume(&mut self) -> Option<CompositedFrame> {
        if self.state.is_torn_down() {
            return None;
        }

        self.services.registry.reap_retired();

        if self.state == CompositorState::Uninitialized {
            if let Err(e) = self.initialize() {
                log::warn!("compositor {}: deferred initialization failed: {e}", self.id);
            }
        }

        self.drain_control();
        self.sync_mute();

        // not gated on input focus: unfocused overlays keep animating
        if self.paint_type != PaintType::PostRender {
            self.request_begin_frame();
        }

        if self.services.host.renderer_ready() {
            self.ensure_targets();
        }
        self.primary.as_ref()?;

        if self.config.raw_blit {
            self.track_output_resolution();
        }

        self.flush_polls();

        let painted = self.drain_paints();
        let (updated, damage) = match self.mode {
            CompositeMode::SharedTextureRaw => self.composite_raw(painted),
            CompositeMode::SharedTextureFlipped => self.composite_flipped(painted),
            CompositeMode::CpuBuffer => self.composite_cpu(),
        };

        let target = self.primary.clone()?;
        let popup = match (&self.popup.target, self.popup.visible) {
            (Some(target), true) => Some(PopupFrame {
                target: target.clone(),
                rect: self.popup.rect,
            }),
            _ => None,
        };

        Some(CompositedFrame {
            target,
            popup,
            damage,
            updated,
        })
    }

    /// Changes the surface size. Identical dimensions are a no-op.
    ///
    /// The frame target and CPU buffer are recreated, the current shared
    /// texture binding is marked stale, and the session is told about the new
    /// size (or will be, once it exists).
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), CompositorError> {
        if self.state.is_torn_down() {
            return Err(CompositorError::TornDown);
        }

        let size = SurfaceSize::new(width, height);
        if size.is_empty() {
            log::debug!("compositor {}: ignoring resize to {width}x{height}", self.id);
            return Ok(());
        }
        if size == self.size {
            return Ok(());
        }

        let previous = self.state;
        self.state = CompositorState::Resizing;
        log::debug!(
            "compositor {}: resizing {}x{} -> {width}x{height}",
            self.id,
            self.size.width,
            self.size.height
        );

        self.size = size;
        if let Some(target) = self.primary.take() {
            self.services.broker.release(target.id());
        }
        if let Some(rt) = self.flip_target.take() {
            self.services.broker.release(rt.id);
        }
        if let Some(binding) = self.binding.as_mut() {
            binding.stale = true;
        }

        if previous != CompositorState::Uninitialized {
            self.start_generation();
            if self.services.host.renderer_ready() {
                self.ensure_targets();
            }

            match &self.session {
                Some(session) => session.was_resized(),
                None => self.resize_notify_pending = true,
            }
        }

        self.state = previous;
        Ok(())
    }

    /// Asks the browser for a frame. Returns whether the request was sent;
    /// it is not when begin-frame pacing is off or there is no session yet.
    /// Focus is not consulted.
    pub fn request_begin_frame(&mut self) -> bool {
        if !self.config.external_begin_frame_enabled() {
            return false;
        }
        let Some(session) = &self.session else {
            return false;
        };

        session.send_external_begin_frame();
        self.last_frame_time = Some(Instant::now());
        true
    }

    /// Records whether the host gave this window input focus. Gaining focus
    /// asks for a frame right away.
    pub fn signal_focus_request(&mut self, focused: bool) {
        let gained = focused && !self.focused;
        self.focused = focused;
        if gained && self.paint_type != PaintType::PostRender {
            self.request_begin_frame();
        }
    }

    /// Queues a poll message for the page. Duplicate arguments are merged.
    pub fn signal_poll(&mut self, argument: impl Into<String>) {
        let argument = argument.into();
        if !self.poll_queue.contains(&argument) {
            self.poll_queue.push(argument);
        }
    }

    /// Asks the session to repaint `element` entirely. Returns false without a session.
    pub fn invalidate(&mut self, element: ElementType) -> bool {
        match &self.session {
            Some(session) => {
                session.invalidate(element);
                true
            }
            None => false,
        }
    }

    pub fn touch_message(&mut self) {
        self.last_message_time = Some(Instant::now());
    }

    pub fn set_paint_type(&mut self, paint_type: PaintType) {
        self.paint_type = paint_type;
    }

    /// Tears the compositor down.
    ///
    /// The session close is requested first (posted to the browser thread when
    /// called elsewhere). Frame targets are released afterwards; shared texture
    /// bindings the session may still use are retired to the registry until
    /// the close is acknowledged. Finally the compositor deregisters.
    pub fn destroy(&mut self) {
        if self.state.is_torn_down() {
            return;
        }
        self.state = CompositorState::TornDown;
        self.surface.invalidate();
        self.services.registry.reap_retired();

        // a session may have been delivered without being picked up yet
        self.control_rx.close();
        while let Ok(notification) = self.control_rx.try_recv() {
            if let ControlNotification::SessionCreated(session) = notification {
                if self.session.is_none() {
                    self.session = Some(session);
                } else {
                    session.close(true);
                }
            }
        }
        self.paint_rx.close();
        while self.paint_rx.try_recv().is_ok() {}
        self.surface.take_overflow();

        let ticket = CloseTicket::new();
        match self.session.take() {
            Some(session) if self.services.browser.on_browser_thread() => {
                session.close(true);
                ticket.acknowledge();
            }
            Some(session) => {
                let posted = ticket.clone();
                self.services.browser.post_task(Box::new(move || {
                    session.close(true);
                    posted.acknowledge();
                }));
            }
            None => ticket.acknowledge(),
        }

        let broker = Arc::clone(&self.services.broker);
        if let Some(target) = self.primary.take() {
            broker.release(target.id());
        }
        if let Some(target) = self.popup.target.take() {
            broker.release(target.id());
        }
        if let Some(rt) = self.flip_target.take() {
            broker.release(rt.id);
        }

        let session_resources: Vec<ResourceId> = self
            .binding
            .take()
            .into_iter()
            .chain(self.popup.binding.take())
            .flat_map(|b| b.resources())
            .collect();
        if ticket.is_acknowledged() {
            for id in session_resources {
                broker.release(id);
            }
        } else {
            self.services
                .registry
                .retire(self.id, ticket, broker, session_resources);
        }

        self.surface.release_staging();
        self.poll_queue.clear();
        self.services.registry.remove(self.id);
        log::info!("compositor {} torn down", self.id);
    }

    pub fn id(&self) -> CompositorId {
        self.id
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn state(&self) -> CompositorState {
        self.state
    }

    pub fn mode(&self) -> CompositeMode {
        self.mode
    }

    pub fn paint_type(&self) -> PaintType {
        self.paint_type
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Generation of the current surfaces; bumped on every recreation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn frame_target(&self) -> Option<&FrameTarget> {
        self.primary.as_ref()
    }

    pub fn popup_rect(&self) -> Option<Rect> {
        self.popup.visible.then_some(self.popup.rect)
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// True if the primary shared texture binding belongs to a previous size.
    pub fn is_binding_stale(&self) -> Option<bool> {
        self.binding.as_ref().map(|b| b.stale)
    }

    pub fn pending_polls(&self) -> &[String] {
        &self.poll_queue
    }

    pub fn last_frame_time(&self) -> Option<Instant> {
        self.last_frame_time
    }

    pub fn last_message_time(&self) -> Option<Instant> {
        self.last_message_time
    }

    pub fn sink(&self) -> PaintSink {
        self.sink.clone()
    }

    fn start_generation(&mut self) {
        self.generation += 1;
        match self.mode {
            CompositeMode::CpuBuffer => {
                self.surface
                    .reset_staging(self.size, self.config.row_alignment, self.generation)
            }
            _ => self.surface.lock().tracker.clear(),
        }
    }

    fn frame_usage(&self) -> TextureUsage {
        match self.mode {
            CompositeMode::CpuBuffer => TextureUsage::SHADER_RESOURCE | TextureUsage::CPU_WRITE,
            _ => TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
        }
    }

    /// Creates missing frame targets. Failures leave them absent until the next call.
    fn ensure_targets(&mut self) {
        let broker = Arc::clone(&self.services.broker);
        let usage = self.frame_usage();

        if self.primary.is_none() {
            match broker.create_frame_target(self.size, PixelFormat::Argb8, usage, self.generation) {
                Ok(target) => {
                    log::debug!(
                        "compositor {}: frame target {} ({}x{}, generation {})",
                        self.id,
                        target.id(),
                        target.width(),
                        target.height(),
                        target.generation()
                    );
                    self.primary = Some(target);
                    if self.state == CompositorState::Initializing && self.session.is_some() {
                        self.state = CompositorState::Active;
                    }
                }
                Err(e) => log::debug!("compositor {}: frame target unavailable: {e}", self.id),
            }
        }

        if self.popup.visible
            && !self.popup.rect.is_empty()
            && self.popup.target.is_none()
            && self.mode == CompositeMode::SharedTextureRaw
        {
            match broker.create_frame_target(self.popup.rect.size(), PixelFormat::Argb8, usage, self.generation) {
                Ok(target) => self.popup.target = Some(target),
                Err(e) => log::debug!("compositor {}: popup target unavailable: {e}", self.id),
            }
        }
    }

    fn drain_control(&mut self) {
        while let Ok(notification) = self.control_rx.try_recv() {
            match notification {
                ControlNotification::SessionCreated(session) => self.attach_session(session),
                ControlNotification::PopupShown(true) => self.popup.visible = true,
                ControlNotification::PopupShown(false) => self.drop_popup(),
                ControlNotification::PopupRect(rect) => self.layout_popup(rect),
            }
        }
    }

    fn attach_session(&mut self, session: Arc<dyn BrowserSession>) {
        if self.session.is_some() {
            log::warn!("compositor {}: second session delivered, closing it", self.id);
            session.close(true);
            return;
        }

        log::info!("compositor {}: browser session attached", self.id);
        if self.resize_notify_pending {
            session.was_resized();
            self.resize_notify_pending = false;
        }
        self.session = Some(session);
        self.state = CompositorState::Active;
    }

    fn layout_popup(&mut self, rect: Rect) {
        if rect.is_empty() {
            self.drop_popup();
            return;
        }

        let resized = self.popup.rect.size() != rect.size();
        self.popup.rect = rect;
        self.popup.visible = true;
        if !resized {
            return;
        }

        if let Some(target) = self.popup.target.take() {
            self.services.broker.release(target.id());
        }
        if let Some(binding) = self.popup.binding.as_mut() {
            binding.stale = true;
        }
        if self.mode != CompositeMode::SharedTextureRaw {
            log::debug!("compositor {}: popups are only composited in raw blit mode", self.id);
            return;
        }
        if self.services.host.renderer_ready() {
            self.ensure_targets();
        }
    }

    fn drop_popup(&mut self) {
        let popup = std::mem::take(&mut self.popup);
        if let Some(target) = popup.target {
            self.services.broker.release(target.id());
        }
        if let Some(binding) = popup.binding {
            for id in binding.resources() {
                self.services.broker.release(id);
            }
        }
    }

    fn sync_mute(&mut self) {
        let Some(session) = &self.session else {
            return;
        };

        let should_mute = self.services.host.should_mute();
        if should_mute != self.muted {
            session.set_audio_muted(should_mute);
            self.muted = should_mute;
        }
    }

    fn track_output_resolution(&mut self) {
        let resolution = self.services.host.output_resolution();
        if !resolution.is_empty() && resolution != self.size {
            // resize only fails once torn down, which consume already ruled out
            let _ = self.resize(resolution.width, resolution.height);
        }
    }

    fn flush_polls(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        for argument in self.poll_queue.drain(..) {
            session.send_poll(&argument);
        }
    }

    /// Applies queued shared texture paints in arrival order, then the paints
    /// held aside while the queue was full. Returns which elements received a
    /// new texture.
    fn drain_paints(&mut self) -> Painted {
        let mut painted = Painted::default();

        while let Ok(paint) = self.paint_rx.try_recv() {
            self.apply_paint(paint, &mut painted);
        }
        for paint in self.surface.take_overflow() {
            self.apply_paint(paint, &mut painted);
        }

        painted
    }

    fn apply_paint(&mut self, paint: AcceleratedPaint, painted: &mut Painted) {
        let broker = Arc::clone(&self.services.broker);
        match paint.element {
            ElementType::View => {
                if paint.size != self.size {
                    log::trace!(
                        "compositor {}: dropping {:?} paint for old size",
                        self.id,
                        paint.size
                    );
                    return;
                }
                match rebind(broker.as_ref(), &mut self.binding, paint.handle, paint.size) {
                    Ok(()) => {
                        self.surface.add_damage(&paint.dirty);
                        painted.view = true;
                    }
                    Err(e) => log::debug!(
                        "compositor {}: cannot bind {}: {e}",
                        self.id,
                        paint.handle
                    ),
                }
            }
            ElementType::Popup => {
                if self.mode != CompositeMode::SharedTextureRaw || !self.popup.visible {
                    log::debug!("compositor {}: dropping popup paint", self.id);
                    return;
                }
                match rebind(broker.as_ref(), &mut self.popup.binding, paint.handle, paint.size) {
                    Ok(()) => painted.popup = true,
                    Err(e) => log::debug!(
                        "compositor {}: cannot bind popup {}: {e}",
                        self.id,
                        paint.handle
                    ),
                }
            }
        }
    }

    fn take_damage(&self) -> Option<Rect> {
        self.surface.lock().tracker.take_bounds(self.size)
    }

    fn composite_raw(&mut self, painted: Painted) -> (bool, Option<Rect>) {
        let broker = self.services.broker.as_ref();
        let mut updated = false;

        if painted.view {
            if let (Some(target), Some(binding)) = (&self.primary, &self.binding) {
                match broker.blit(target, &binding.texture) {
                    Ok(()) => updated = true,
                    Err(e) => log::debug!("compositor {}: blit failed: {e}", self.id),
                }
            }
        }

        if painted.popup {
            if let (Some(target), Some(binding)) = (&self.popup.target, &self.popup.binding) {
                match broker.blit(target, &binding.texture) {
                    Ok(()) => updated = true,
                    Err(e) => log::debug!("compositor {}: popup blit failed: {e}", self.id),
                }
            }
        }

        (updated, self.take_damage())
    }

    fn composite_flipped(&mut self, painted: Painted) -> (bool, Option<Rect>) {
        if !painted.view {
            return (false, None);
        }

        match self.flip_pass() {
            Ok(()) => (true, self.take_damage()),
            Err(e) => {
                log::debug!("compositor {}: flip pass failed: {e}", self.id);
                (false, None)
            }
        }
    }

    /// Draws the bound shared texture upside down into the intermediate
    /// render target and copies the result into the frame target. The host's
    /// pipeline state is restored however this returns.
    fn flip_pass(&mut self) -> Result<(), BrokerError> {
        let broker = Arc::clone(&self.services.broker);
        let (Some(target), Some(binding)) = (&self.primary, &self.binding) else {
            return Ok(());
        };

        if self.flip_target.is_none() {
            self.flip_target = Some(broker.create_render_target(self.size)?);
        }
        let Some(rt) = &self.flip_target else {
            return Ok(());
        };

        let _guard = PipelineStateGuard::capture(broker.as_ref());
        broker.bind_flip_pass(rt, &binding.view, self.size)?;
        broker.draw(FLIP_QUAD_VERTICES)?;
        broker.copy_resource(target, rt)?;
        Ok(())
    }

    fn composite_cpu(&mut self) -> (bool, Option<Rect>) {
        if !self.surface.take_dirty() {
            return (false, None);
        }
        let Some(target) = self.primary.clone() else {
            return (false, None);
        };

        let broker = Arc::clone(&self.services.broker);
        let mut staging = self.surface.lock();
        let state = &mut *staging;
        let Some(buffer) = state.buffer.as_ref() else {
            return (false, None);
        };
        let image = buffer.size();
        if image != target.size() {
            log::trace!("compositor {}: staging and frame target sizes differ", self.id);
            return (false, None);
        }

        // the mapping borrows `broker`, so the match must not be the tail expression
        let result = match broker.map(&target, MapMode::Write) {
            Ok(mut mapped) => {
                let pitch = mapped.pitch();
                let stats = state.tracker.drain_and_apply(
                    mapped.bytes_mut(),
                    pitch,
                    buffer.bytes(),
                    buffer.stride(),
                    image,
                );
                if stats.dropped > 0 {
                    log::trace!("compositor {}: {} dirty rects dropped", self.id, stats.dropped);
                }
                (stats.applied > 0, stats.damage)
            }
            Err(e) => {
                log::debug!("compositor {}: {e}, retrying with discard", self.id);
                match broker.map(&target, MapMode::WriteDiscard) {
                    Ok(mut mapped) => {
                        let pitch = mapped.pitch();
                        let copied = state.tracker.copy_full(
                            mapped.bytes_mut(),
                            pitch,
                            buffer.bytes(),
                            buffer.stride(),
                            image,
                        );
                        (copied, copied.then_some(Rect::full(image)))
                    }
                    Err(e) => {
                        log::debug!("compositor {}: {e}, keeping frame dirty", self.id);
                        drop(staging);
                        self.surface.mark_dirty();
                        (false, None)
                    }
                }
            }
        };
        result
    }
}

impl Drop for WindowCompositor {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Elements that received new shared textures during one drain.
#[derive(Debug, Default, Clone, Copy)]
struct Painted {
    view: bool,
    popup: bool,
}

/// Points `slot` at `handle`, importing it if it differs from the current
/// binding. The previous texture and view are released only after the new
/// pair exists, so the slot always holds exactly one live view.
fn rebind(
    broker: &dyn ResourceBroker,
    slot: &mut Option<SharedBinding>,
    handle: SharedHandle,
    size: SurfaceSize,
) -> Result<(), BrokerError> {
    if let Some(current) = slot {
        if current.handle() == handle && current.texture.size == size && !current.stale {
            return Ok(());
        }
    }

    let texture = broker.import_shared_handle(handle, size)?;
    let view = match broker.create_shader_view(&texture) {
        Ok(view) => view,
        Err(e) => {
            broker.release(texture.id);
            return Err(e);
        }
    };

    if let Some(old) = slot.replace(SharedBinding {
        texture,
        view,
        stale: false,
    }) {
        for id in old.resources() {
            broker.release(id);
        }
    }
    Ok(())
}
