//! Scripted backend shared by the pipeline and service tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use model_thumbnailer::{
    Error, ModelLoad, RenderBackend, RenderEvent, RenderEvents, RenderSession, Result, Viewport,
};

pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// How a scripted session behaves
#[derive(Debug, Clone)]
pub struct Script {
    pub fail_launch: bool,
    pub fail_navigation: bool,
    pub model_load: ModelLoad,
    pub fail_capture: bool,
    pub fail_close: bool,
    pub render_delay: Duration,
    /// Extra bytes appended after the PNG magic, to tell outputs apart
    pub payload: Vec<u8>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_launch: false,
            fail_navigation: false,
            model_load: ModelLoad::Loaded,
            fail_capture: false,
            fail_close: false,
            render_delay: Duration::ZERO,
            payload: Vec::new(),
        }
    }
}

/// Counts launched and still-open sessions
#[derive(Default)]
pub struct ProcessTable {
    pub launched: AtomicUsize,
    pub running: AtomicUsize,
    pub peak: AtomicUsize,
}

impl ProcessTable {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct ScriptedBackend {
    pub script: Script,
    pub processes: Arc<ProcessTable>,
    pub navigations: Arc<Mutex<Vec<String>>>,
    pub viewports: Arc<Mutex<Vec<Viewport>>>,
    pub load_timeouts: Arc<Mutex<Vec<Option<Duration>>>>,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            processes: Arc::new(ProcessTable::default()),
            navigations: Arc::new(Mutex::new(Vec::new())),
            viewports: Arc::new(Mutex::new(Vec::new())),
            load_timeouts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl RenderBackend for ScriptedBackend {
    fn launch(&self, viewport: Viewport) -> Result<Box<dyn RenderSession>> {
        if self.script.fail_launch {
            return Err(Error::Launch("chrome not found".into()));
        }
        self.viewports.lock().unwrap().push(viewport);
        self.processes.launched.fetch_add(1, Ordering::SeqCst);
        let now = self.processes.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.processes.peak.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            processes: self.processes.clone(),
            navigations: self.navigations.clone(),
            load_timeouts: self.load_timeouts.clone(),
        }))
    }
}

pub struct ScriptedSession {
    script: Script,
    processes: Arc<ProcessTable>,
    navigations: Arc<Mutex<Vec<String>>>,
    load_timeouts: Arc<Mutex<Vec<Option<Duration>>>>,
}

impl RenderSession for ScriptedSession {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.navigations.lock().unwrap().push(url.to_string());
        if self.script.fail_navigation {
            return Err(Error::Timeout(timeout.as_millis() as u64));
        }
        std::thread::sleep(self.script.render_delay);
        Ok(())
    }

    fn wait_for_model(&mut self, timeout: Option<Duration>) -> Result<ModelLoad> {
        self.load_timeouts.lock().unwrap().push(timeout);
        Ok(self.script.model_load)
    }

    fn capture_png(&mut self) -> Result<Vec<u8>> {
        if self.script.fail_capture {
            return Err(Error::Screenshot("target closed".into()));
        }
        let mut png = PNG_MAGIC.to_vec();
        png.extend_from_slice(&self.script.payload);
        Ok(png)
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.processes.running.fetch_sub(1, Ordering::SeqCst);
        if self.script.fail_close {
            return Err(Error::Teardown("tab already gone".into()));
        }
        Ok(())
    }
}

/// Event sink that keeps every record for assertions
#[derive(Default)]
pub struct RecordingEvents {
    pub events: Mutex<Vec<RenderEvent>>,
}

impl RecordingEvents {
    pub fn snapshot(&self) -> Vec<RenderEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<RenderEvent> {
        self.snapshot()
            .into_iter()
            .filter(|e| matches!(e, RenderEvent::Failed { .. }))
            .collect()
    }
}

impl RenderEvents for RecordingEvents {
    fn record(&self, event: RenderEvent) {
        self.events.lock().unwrap().push(event);
    }
}
