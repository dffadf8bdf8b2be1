//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)
//!
//! Each `launch` starts a fresh headless Chrome process with a single tab.
//! Two CDP channels feed the session:
//!
//! - `Page.lifecycleEvent` notifications, used to detect network idle after
//!   navigation
//! - a `Runtime` binding exposed before navigation; the viewer check only
//!   attaches a `load` listener that calls it, and the session waits for that
//!   call on the Rust side

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Emulation, Page, DOM};
use headless_chrome::{Browser, LaunchOptions};
use log::debug;

use crate::{Error, ModelLoad, RenderBackend, RenderSession, Result, ThumbnailConfig, Viewport};

/// Binding the page calls once the viewer reports `load`
const LOAD_BINDING: &str = "__thumbnailModelLoaded";

/// Resolves synchronously to `missing`, `visible` or `pending`. Checking
/// `modelIsVisible` and attaching the listener happen in one task, so a load
/// cannot slip in between.
const VIEWER_CHECK_SCRIPT: &str = r#"(function() {
    const viewer = document.querySelector('model-viewer');
    if (!viewer) return 'missing';
    if (viewer.modelIsVisible) return 'visible';
    viewer.addEventListener('load', function() {
        window.__thumbnailModelLoaded('loaded');
    }, { once: true });
    return 'pending';
})()"#;

/// Headroom on top of the render budgets before Chrome's idle watchdog fires
const IDLE_MARGIN: Duration = Duration::from_secs(30);

/// Launches one headless Chrome process per render
#[derive(Debug, Clone)]
pub struct ChromeBackend {
    chrome_path: Option<PathBuf>,
    disable_sandbox: bool,
    idle_timeout: Duration,
}

impl ChromeBackend {
    pub fn from_config(config: &ThumbnailConfig) -> Self {
        // The watchdog must outlive the longest legitimate render
        let load = config
            .load_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(3600));
        Self {
            chrome_path: config.chrome_path.clone(),
            disable_sandbox: config.disable_sandbox,
            idle_timeout: Duration::from_millis(config.navigation_timeout_ms) + load + IDLE_MARGIN,
        }
    }

    fn launch_options(&self, viewport: Viewport) -> Result<LaunchOptions<'static>> {
        let mut args: Vec<&'static OsStr> = vec![
            OsStr::new("--hide-scrollbars"),
            OsStr::new("--disable-dev-shm-usage"),
            // model-viewer needs WebGL; fall back to software GL when no GPU
            OsStr::new("--enable-unsafe-swiftshader"),
        ];
        if self.disable_sandbox {
            args.push(OsStr::new("--disable-setuid-sandbox"));
        }

        LaunchOptions::default_builder()
            .headless(true)
            .sandbox(!self.disable_sandbox)
            .window_size(Some((viewport.width, viewport.height)))
            .path(self.chrome_path.clone())
            .idle_browser_timeout(self.idle_timeout)
            .args(args)
            .build()
            .map_err(|e| Error::Launch(format!("Failed to build launch options: {}", e)))
    }
}

impl RenderBackend for ChromeBackend {
    fn launch(&self, viewport: Viewport) -> Result<Box<dyn RenderSession>> {
        let launch_options = self.launch_options(viewport)?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Launch(format!("Failed to launch browser: {}", e)))?;
        debug!(target: "thumbnail", "Browser launched ({}x{})", viewport.width, viewport.height);

        // From here on `browser` is dropped (and the process killed) on error
        let tab = browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("Failed to create tab: {}", e)))?;

        // No background fill so the canvas alpha survives into the PNG
        tab.call_method(Emulation::SetDefaultBackgroundColorOverride {
            color: Some(DOM::RGBA {
                r: 0,
                g: 0,
                b: 0,
                a: Some(0.0),
            }),
        })
        .map_err(|e| Error::Launch(format!("Failed to clear page background: {}", e)))?;

        tab.call_method(Page::SetLifecycleEventsEnabled { enabled: true })
            .map_err(|e| Error::Launch(format!("Failed to enable lifecycle events: {}", e)))?;

        let (lifecycle_tx, lifecycle_rx) = mpsc::channel::<(String, String)>();
        tab.add_event_listener(Arc::new(move |event: &Event| {
            if let Event::PageLifecycleEvent(lifecycle) = event {
                let _ = lifecycle_tx.send((lifecycle.params.frame_id.clone(), lifecycle.params.name.clone()));
            }
        }))
        .map_err(|e| Error::Launch(format!("Failed to subscribe to lifecycle events: {}", e)))?;

        let (loaded_tx, loaded_rx) = mpsc::channel::<()>();
        tab.expose_function(
            LOAD_BINDING,
            Arc::new(move |_payload: serde_json::Value| {
                let _ = loaded_tx.send(());
            }),
        )
        .map_err(|e| Error::Launch(format!("Failed to expose load binding: {}", e)))?;

        // A page target's main frame shares the target's id
        let main_frame = tab.get_target_id().clone();

        Ok(Box::new(ChromeSession {
            browser,
            tab,
            main_frame,
            viewport,
            lifecycle: lifecycle_rx,
            model_loaded: loaded_rx,
        }))
    }
}

/// Follows lifecycle events of one frame until its new document goes idle.
/// Iframes report their own `init`/`networkIdle` and are ignored.
struct IdleTracker<'a> {
    main_frame: &'a str,
    document_started: bool,
}

impl<'a> IdleTracker<'a> {
    fn new(main_frame: &'a str) -> Self {
        Self {
            main_frame,
            document_started: false,
        }
    }

    /// Returns true once the main frame is idle after its `init`
    fn observe(&mut self, frame_id: &str, name: &str) -> bool {
        if frame_id != self.main_frame {
            return false;
        }
        match name {
            "init" => {
                self.document_started = true;
                false
            }
            "networkIdle" => self.document_started,
            _ => false,
        }
    }
}

/// A running Chrome process and its only tab
pub struct ChromeSession {
    browser: Browser,
    tab: Arc<Tab>,
    main_frame: String,
    viewport: Viewport,
    lifecycle: Receiver<(String, String)>,
    model_loaded: Receiver<()>,
}

impl ChromeSession {
    fn timed_out(timeout: Duration) -> Error {
        Error::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    }

    /// Block until the main document reports `networkIdle`
    fn wait_for_network_idle(&self, started: Instant, timeout: Duration) -> Result<()> {
        let mut idle = IdleTracker::new(&self.main_frame);
        loop {
            let remaining = timeout
                .checked_sub(started.elapsed())
                .ok_or_else(|| Self::timed_out(timeout))?;
            match self.lifecycle.recv_timeout(remaining) {
                Ok((frame_id, name)) => {
                    if idle.observe(&frame_id, &name) {
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Err(Self::timed_out(timeout)),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Navigation("browser connection closed".into()))
                }
            }
        }
    }
}

impl RenderSession for ChromeSession {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();

        // Discard lifecycle noise from the blank start page
        while self.lifecycle.try_recv().is_ok() {}

        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::Navigation(format!("{}: {}", url, e)))?;

        self.tab.wait_until_navigated().map_err(|e| {
            if started.elapsed() >= timeout {
                Self::timed_out(timeout)
            } else {
                Error::Navigation(format!("Wait for navigation failed: {}", e))
            }
        })?;

        self.wait_for_network_idle(started, timeout)
    }

    fn wait_for_model(&mut self, timeout: Option<Duration>) -> Result<ModelLoad> {
        while self.model_loaded.try_recv().is_ok() {}

        let check = self
            .tab
            .evaluate(VIEWER_CHECK_SCRIPT, false)
            .map_err(|e| Error::LoadWait(format!("Viewer check failed: {}", e)))?;

        match check.value.as_ref().and_then(|v| v.as_str()) {
            Some("visible") => return Ok(ModelLoad::AlreadyVisible),
            Some("pending") => {}
            _ => return Ok(ModelLoad::NoViewer),
        }

        match timeout {
            Some(limit) => match self.model_loaded.recv_timeout(limit) {
                Ok(()) => Ok(ModelLoad::Loaded),
                Err(RecvTimeoutError::Timeout) => Ok(ModelLoad::TimedOut),
                Err(RecvTimeoutError::Disconnected) => {
                    Err(Error::LoadWait("load binding disconnected".into()))
                }
            },
            None => self
                .model_loaded
                .recv()
                .map(|()| ModelLoad::Loaded)
                .map_err(|_| Error::LoadWait("load binding disconnected".into())),
        }
    }

    fn capture_png(&mut self) -> Result<Vec<u8>> {
        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.viewport.width as f64,
            height: self.viewport.height as f64,
            scale: 1.0,
        };

        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::Screenshot(format!("Capture failed: {}", e)))
    }

    fn close(self: Box<Self>) -> Result<()> {
        let ChromeSession { browser, tab, .. } = *self;
        let closed = tab.close(true);
        drop(tab);
        // Dropping the browser kills the child process
        drop(browser);
        closed
            .map(|_| ())
            .map_err(|e| Error::Teardown(format!("Failed to close tab: {}", e)))
    }
}
