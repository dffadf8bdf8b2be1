//! Render event sink
//!
//! The pipeline reports what it does through a `RenderEvents` capability
//! instead of logging directly, so callers can route or capture the records.
//! `LogEvents` forwards everything to the `log` facade.

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::Stage;

/// Something noteworthy that happened during one render
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// The owner's thumbnail directory did not exist and was created
    DirectoryCreated { path: PathBuf },
    /// About to navigate the page
    Navigating { viewer_url: String },
    /// The page had no viewer element
    ViewerMissing { viewer_url: String },
    /// The model did not report loaded within the budget
    LoadTimedOut { viewer_url: String, after: Duration },
    /// A thumbnail was written
    Generated { output_path: PathBuf, relative_path: String },
    /// The render was abandoned
    Failed { model_url: String, stage: Stage, message: String },
    /// Closing the browser reported an error
    TeardownFailed { message: String },
}

/// Receives render events
pub trait RenderEvents: Send + Sync {
    fn record(&self, event: RenderEvent);
}

/// Default sink that writes to the `log` facade under the `thumbnail` target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEvents;

impl RenderEvents for LogEvents {
    fn record(&self, event: RenderEvent) {
        match event {
            RenderEvent::DirectoryCreated { path } => {
                info!(target: "thumbnail", "Created thumbnail directory: {}", path.display())
            }
            RenderEvent::Navigating { viewer_url } => {
                debug!(target: "thumbnail", "Navigating to: {}", viewer_url)
            }
            RenderEvent::ViewerMissing { viewer_url } => {
                warn!(target: "thumbnail", "No model-viewer element on {}; capturing as-is", viewer_url)
            }
            RenderEvent::LoadTimedOut { viewer_url, after } => {
                warn!(target: "thumbnail", "Model on {} not loaded after {:?}; capturing as-is", viewer_url, after)
            }
            RenderEvent::Generated { output_path, .. } => {
                info!(target: "thumbnail", "Thumbnail generated: {}", output_path.display())
            }
            RenderEvent::Failed { model_url, stage, message } => {
                error!(target: "thumbnail", "Failed to generate thumbnail for {} ({} stage): {}", model_url, stage, message)
            }
            RenderEvent::TeardownFailed { message } => {
                warn!(target: "thumbnail", "Failed to close browser: {}", message)
            }
        }
    }
}
