//! Fake browser collaborators for compositor tests.

use crate::browser::events::{ElementType, PaintSink};
use crate::browser::session::{BrowserHost, BrowserSession, BrowserTask, SessionRequest};
use crate::compositor::{CompositorHandle, CompositorServices, WindowCompositor, WindowRegistry};
use crate::config::CompositorConfig;
use crate::render::backends::software::{SoftwareBroker, SoftwareHost, SoftwareStats};
use crate::render::geometry::SurfaceSize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Session that records every call made on it.
pub(crate) struct FakeSession {
    broker: Arc<SoftwareBroker>,
    pub resized: AtomicUsize,
    pub begin_frames: AtomicUsize,
    pub closed: AtomicUsize,
    pub muted: Mutex<Vec<bool>>,
    pub polls: Mutex<Vec<String>>,
    pub invalidated: Mutex<Vec<ElementType>>,
    /// Device counters at the moment `close` was called.
    pub stats_at_close: Mutex<Option<SoftwareStats>>,
}

impl FakeSession {
    fn new(broker: Arc<SoftwareBroker>) -> Self {
        Self {
            broker,
            resized: AtomicUsize::new(0),
            begin_frames: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            muted: Mutex::new(Vec::new()),
            polls: Mutex::new(Vec::new()),
            invalidated: Mutex::new(Vec::new()),
            stats_at_close: Mutex::new(None),
        }
    }

    pub fn resized(&self) -> usize {
        self.resized.load(Ordering::SeqCst)
    }

    pub fn begin_frames(&self) -> usize {
        self.begin_frames.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl BrowserSession for FakeSession {
    fn was_resized(&self) {
        self.resized.fetch_add(1, Ordering::SeqCst);
    }

    fn send_external_begin_frame(&self) {
        self.begin_frames.fetch_add(1, Ordering::SeqCst);
    }

    fn set_audio_muted(&self, muted: bool) {
        self.muted.lock().unwrap().push(muted);
    }

    fn send_poll(&self, argument: &str) {
        self.polls.lock().unwrap().push(argument.to_string());
    }

    fn invalidate(&self, element: ElementType) {
        self.invalidated.lock().unwrap().push(element);
    }

    fn close(&self, _force: bool) {
        *self.stats_at_close.lock().unwrap() = Some(self.broker.stats());
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Browser host that hands out [`FakeSession`]s.
pub(crate) struct FakeBrowser {
    broker: Arc<SoftwareBroker>,
    /// Deliver the session from inside `create_session`.
    pub auto_deliver: AtomicBool,
    pub on_thread: AtomicBool,
    pub fail_create: AtomicBool,
    pub requests: Mutex<Vec<SessionRequest>>,
    sinks: Mutex<Vec<PaintSink>>,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    tasks: Mutex<Vec<BrowserTask>>,
}

impl FakeBrowser {
    pub fn new(broker: Arc<SoftwareBroker>) -> Self {
        Self {
            broker,
            auto_deliver: AtomicBool::new(true),
            on_thread: AtomicBool::new(true),
            fail_create: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            sinks: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Creates a session for the most recent request and hands it to its sink.
    pub fn deliver_session(&self) -> Arc<FakeSession> {
        let session = Arc::new(FakeSession::new(Arc::clone(&self.broker)));
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        let sink = self.sink().expect("no session requested");
        sink.session_created(session.clone() as Arc<dyn BrowserSession>);
        session
    }

    pub fn session(&self) -> Option<Arc<FakeSession>> {
        self.sessions.lock().unwrap().last().cloned()
    }

    pub fn sink(&self) -> Option<PaintSink> {
        self.sinks.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn posted_tasks(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Runs every posted task, as the browser's UI thread would.
    pub fn run_posted_tasks(&self) -> usize {
        let tasks: Vec<BrowserTask> = std::mem::take(&mut *self.tasks.lock().unwrap());
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }
}

impl BrowserHost for FakeBrowser {
    fn create_session(&self, request: SessionRequest, sink: PaintSink) -> anyhow::Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            anyhow::bail!("browser process unavailable");
        }

        self.requests.lock().unwrap().push(request);
        self.sinks.lock().unwrap().push(sink);
        if self.auto_deliver.load(Ordering::SeqCst) {
            self.deliver_session();
        }
        Ok(())
    }

    fn on_browser_thread(&self) -> bool {
        self.on_thread.load(Ordering::SeqCst)
    }

    fn post_task(&self, task: BrowserTask) {
        self.tasks.lock().unwrap().push(task);
    }
}

/// Everything a compositor needs, backed by the software device.
pub(crate) struct Harness {
    pub broker: Arc<SoftwareBroker>,
    pub host: Arc<SoftwareHost>,
    pub browser: Arc<FakeBrowser>,
    pub registry: Arc<WindowRegistry>,
}

impl Harness {
    pub fn new() -> Self {
        let broker = Arc::new(SoftwareBroker::new());
        Self {
            browser: Arc::new(FakeBrowser::new(Arc::clone(&broker))),
            host: Arc::new(SoftwareHost::new(SurfaceSize::new(800, 600))),
            registry: Arc::new(WindowRegistry::new()),
            broker,
        }
    }

    pub fn services(&self) -> CompositorServices {
        CompositorServices {
            broker: self.broker.clone(),
            host: self.host.clone(),
            browser: self.browser.clone(),
            registry: Arc::clone(&self.registry),
        }
    }

    pub fn create(&self, config: CompositorConfig) -> CompositorHandle {
        WindowCompositor::create(config, self.services()).expect("compositor")
    }
}
