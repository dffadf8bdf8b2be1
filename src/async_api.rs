use std::sync::Arc;
use std::thread;

use log::error;
use tokio::sync::{oneshot, Semaphore};

use crate::{RenderRequest, ThumbnailPipeline};

/// An async-friendly thumbnail service backed by one worker thread per render.
///
/// The pipeline blocks while it drives the browser, so each render runs on
/// its own thread and reports back over a oneshot channel. A semaphore caps
/// how many renders (and so how many browser processes) run at once; every
/// render still gets its own process.
#[derive(Clone)]
pub struct ThumbnailService {
    pipeline: Arc<ThumbnailPipeline>,
    permits: Arc<Semaphore>,
}

impl ThumbnailService {
    pub fn new(pipeline: ThumbnailPipeline) -> Self {
        let permits = Arc::new(Semaphore::new(pipeline.config().max_concurrent_renders.max(1)));
        Self {
            pipeline: Arc::new(pipeline),
            permits,
        }
    }

    /// Service backed by headless Chrome
    #[cfg(feature = "cdp")]
    pub fn with_chrome(config: crate::ThumbnailConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self::new(ThumbnailPipeline::with_chrome(config)))
    }

    pub fn pipeline(&self) -> &ThumbnailPipeline {
        &self.pipeline
    }

    /// Renders currently allowed to start without waiting
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Render a thumbnail without blocking the runtime.
    ///
    /// Resolves to `<owner>/thumbnails/<file>` or `None`; a failed render
    /// never surfaces as an error.
    pub async fn generate(&self, request: RenderRequest) -> Option<String> {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(p) => p,
            Err(e) => {
                error!(target: "thumbnail", "Render slots closed: {}", e);
                return None;
            }
        };

        let (tx, rx) = oneshot::channel();
        let pipeline = self.pipeline.clone();
        let model_url = request.model_url.clone();

        let spawned = thread::Builder::new()
            .name("thumbnail-render".to_string())
            .spawn(move || {
                // Held until the browser is gone, even if the caller stopped waiting
                let res = pipeline.generate(&request);
                drop(permit);
                let _ = tx.send(res);
            });

        if let Err(e) = spawned {
            error!(target: "thumbnail", "Failed to spawn render worker for {}: {}", model_url, e);
            return None;
        }

        match rx.await {
            Ok(res) => res,
            Err(e) => {
                error!(target: "thumbnail", "Render worker for {} exited without a result: {}", model_url, e);
                None
            }
        }
    }
}
