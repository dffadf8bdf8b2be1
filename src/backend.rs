//! Rendering backend seam
//!
//! A backend launches one isolated browser process per render and hands back
//! a session that owns that process and a single page. The pipeline drives
//! the session through its stages and always closes it.

use std::time::Duration;

use crate::{Result, Viewport};

/// Outcome of waiting for the viewer's model to finish loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLoad {
    /// The load event fired while we were waiting
    Loaded,
    /// The model was already visible when the listener was attached
    AlreadyVisible,
    /// The page has no viewer element; capture whatever is on screen
    NoViewer,
    /// The load signal did not arrive within the budget
    TimedOut,
}

/// Launches isolated browser sessions
pub trait RenderBackend: Send + Sync {
    /// Start one browser process with one page sized to `viewport`
    fn launch(&self, viewport: Viewport) -> Result<Box<dyn RenderSession>>;
}

/// One browser process plus its only page
pub trait RenderSession {
    /// Navigate and wait for network idle, failing after `timeout`
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait for the viewer element's one-shot load signal.
    /// `None` waits without bound.
    fn wait_for_model(&mut self, timeout: Option<Duration>) -> Result<ModelLoad>;

    /// Capture the viewport as a PNG with a transparent background
    fn capture_png(&mut self) -> Result<Vec<u8>>;

    /// Terminate the browser process
    fn close(self: Box<Self>) -> Result<()>;
}
