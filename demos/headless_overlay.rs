use gosub_compositor::browser::{
    BrowserHost, BrowserSession, BrowserTask, ElementType, PaintSink, PaintSource, SessionRequest,
};
use gosub_compositor::compositor::{CompositorServices, WindowCompositor, WindowRegistry};
use gosub_compositor::logging::{self, LogLevel};
use gosub_compositor::render::backends::software::{SoftwareBroker, SoftwareHost};
use gosub_compositor::render::broker::SharedHandle;
use gosub_compositor::render::geometry::{Rect, SurfaceSize};
use gosub_compositor::CompositorConfig;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Browser stand-in: produces one solid frame per begin-frame request,
/// double buffered through shared handles.
struct DemoSession {
    broker: Arc<SoftwareBroker>,
    sink: PaintSink,
    size: Mutex<SurfaceSize>,
    in_flight: Mutex<VecDeque<SharedHandle>>,
    frame: Mutex<u32>,
}

impl BrowserSession for DemoSession {
    fn was_resized(&self) {
        log::info!("page resized");
    }

    fn send_external_begin_frame(&self) {
        let size = *self.size.lock().unwrap();
        let mut frame = self.frame.lock().unwrap();
        *frame += 1;

        // fade the green channel in over the first frames
        let green = (*frame * 25).min(255);
        let handle = self.broker.export_solid(size, 0xFF00_0000 | (green << 8));
        self.sink.record_paint_event(
            PaintSource::Shared { handle, size },
            &[Rect::full(size)],
            ElementType::View,
        );

        let mut in_flight = self.in_flight.lock().unwrap();
        in_flight.push_back(handle);
        while in_flight.len() > 2 {
            if let Some(old) = in_flight.pop_front() {
                self.broker.revoke_shared(old);
            }
        }
    }

    fn set_audio_muted(&self, muted: bool) {
        log::info!("audio muted: {muted}");
    }

    fn send_poll(&self, argument: &str) {
        log::info!("poll: {argument}");
    }

    fn invalidate(&self, _element: ElementType) {}

    fn close(&self, _force: bool) {
        log::info!("session closed");
    }
}

struct DemoBrowser {
    broker: Arc<SoftwareBroker>,
}

impl BrowserHost for DemoBrowser {
    fn create_session(&self, request: SessionRequest, sink: PaintSink) -> anyhow::Result<()> {
        log::info!("opening {} at {}x{}", request.url, request.width, request.height);
        let session = Arc::new(DemoSession {
            broker: Arc::clone(&self.broker),
            sink: sink.clone(),
            size: Mutex::new(SurfaceSize::new(request.width, request.height)),
            in_flight: Mutex::new(VecDeque::new()),
            frame: Mutex::new(0),
        });
        sink.session_created(session);
        Ok(())
    }

    fn on_browser_thread(&self) -> bool {
        true
    }

    fn post_task(&self, task: BrowserTask) {
        task();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(LogLevel::Info);

    let broker = Arc::new(SoftwareBroker::new());
    let services = CompositorServices {
        broker: broker.clone(),
        host: Arc::new(SoftwareHost::new(SurfaceSize::new(320, 180))),
        browser: Arc::new(DemoBrowser {
            broker: Arc::clone(&broker),
        }),
        registry: Arc::new(WindowRegistry::new()),
    };

    let config = CompositorConfig::builder()
        .size(320, 180)
        .url("nui://demo/overlay.html")
        .raw_blit(true)
        .build()?;
    let overlay = WindowCompositor::create(config, services.clone())?;
    overlay.lock().signal_poll("hello");

    let mut ticker = tokio::time::interval(Duration::from_millis(16));
    for tick in 0..12 {
        ticker.tick().await;

        // the host's render step pulls every registered window
        services.registry.for_each(|compositor| {
            if let Some(frame) = compositor.consume() {
                let first = broker
                    .read_pixels_u32(frame.target.id())
                    .and_then(|px| px.first().copied())
                    .unwrap_or_default();
                log::info!(
                    "tick {tick}: {}x{} generation {} updated={} pixel={first:#010x}",
                    frame.target.width(),
                    frame.target.height(),
                    frame.target.generation(),
                    frame.updated
                );
            }
        });
    }

    overlay.lock().destroy();
    services.registry.reap_retired();
    log::info!("resources left: {}", broker.stats().live_resources);
    Ok(())
}
