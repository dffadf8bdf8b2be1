//! Thumbnail render pipeline
//!
//! One call runs the stages strictly in order:
//! prepare directory → launch → navigate → wait for model → screenshot → close.
//! The browser session is closed on every path once it has been launched,
//! and every failure collapses into `None` at `ThumbnailPipeline::generate`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::events::{LogEvents, RenderEvent, RenderEvents};
use crate::{viewer, Error, ModelLoad, RenderBackend, RenderSession, Result, ThumbnailConfig, UploadsLayout};

/// Everything needed for one render; lives only for the duration of the call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Absolute URL of the stored model, reachable by the browser
    pub model_url: String,
    /// Base name of the PNG to write, used verbatim
    pub output_filename: String,
    /// Namespaces the output directory
    pub owner_id: String,
    /// Origin serving the isolated viewer
    pub base_url: String,
}

impl RenderRequest {
    pub fn new(
        model_url: impl Into<String>,
        output_filename: impl Into<String>,
        owner_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            model_url: model_url.into(),
            output_filename: output_filename.into(),
            owner_id: owner_id.into(),
            base_url: base_url.into(),
        }
    }
}

/// Renders thumbnails through a `RenderBackend`
pub struct ThumbnailPipeline {
    config: ThumbnailConfig,
    layout: UploadsLayout,
    backend: Arc<dyn RenderBackend>,
    events: Arc<dyn RenderEvents>,
}

impl ThumbnailPipeline {
    /// Pipeline over `backend` that logs through the `log` facade
    pub fn new(config: ThumbnailConfig, backend: Arc<dyn RenderBackend>) -> Self {
        Self {
            layout: config.layout(),
            config,
            backend,
            events: Arc::new(LogEvents),
        }
    }

    /// Pipeline backed by headless Chrome
    #[cfg(feature = "cdp")]
    pub fn with_chrome(config: ThumbnailConfig) -> Self {
        let backend = crate::cdp::ChromeBackend::from_config(&config);
        Self::new(config, Arc::new(backend))
    }

    /// Route render events to `events` instead of the log
    pub fn with_events(mut self, events: Arc<dyn RenderEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    pub fn layout(&self) -> &UploadsLayout {
        &self.layout
    }

    pub fn events(&self) -> &Arc<dyn RenderEvents> {
        &self.events
    }

    /// Render a thumbnail, returning `<owner>/thumbnails/<file>` or `None`.
    ///
    /// Failures are reported to the event sink and never returned; callers
    /// treat `None` as "no preview available".
    pub fn generate(&self, request: &RenderRequest) -> Option<String> {
        match self.try_generate(request) {
            Ok(relative) => Some(relative),
            Err(e) => {
                self.events.record(RenderEvent::Failed {
                    model_url: request.model_url.clone(),
                    stage: e.stage(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    /// Like `generate`, but hands back the error that aborted the render
    pub fn try_generate(&self, request: &RenderRequest) -> Result<String> {
        let (dir, created) = self.layout.ensure_thumbnail_dir(&request.owner_id)?;
        if created {
            self.events.record(RenderEvent::DirectoryCreated { path: dir.clone() });
        }
        let output_path = dir.join(&request.output_filename);
        let relative = self
            .layout
            .relative_thumbnail_path(&request.owner_id, &request.output_filename);

        let viewer_url = viewer::isolated_viewer_url(&request.model_url, &request.base_url)?;

        // Nothing to tear down if this fails
        let mut session = self.backend.launch(self.config.viewport)?;

        let rendered = self.render(session.as_mut(), &viewer_url, &output_path);

        if let Err(e) = session.close() {
            self.events.record(RenderEvent::TeardownFailed { message: e.to_string() });
        }

        rendered?;
        self.events.record(RenderEvent::Generated {
            output_path,
            relative_path: relative.clone(),
        });
        Ok(relative)
    }

    fn render(&self, session: &mut dyn RenderSession, viewer_url: &str, output_path: &Path) -> Result<()> {
        self.events.record(RenderEvent::Navigating {
            viewer_url: viewer_url.to_string(),
        });
        session.navigate(viewer_url, Duration::from_millis(self.config.navigation_timeout_ms))?;

        let load_timeout = self.config.load_timeout_ms.map(Duration::from_millis);
        match session.wait_for_model(load_timeout)? {
            ModelLoad::Loaded | ModelLoad::AlreadyVisible => {}
            ModelLoad::NoViewer => self.events.record(RenderEvent::ViewerMissing {
                viewer_url: viewer_url.to_string(),
            }),
            ModelLoad::TimedOut => self.events.record(RenderEvent::LoadTimedOut {
                viewer_url: viewer_url.to_string(),
                after: load_timeout.unwrap_or_default(),
            }),
        }

        let png = session.capture_png()?;
        std::fs::write(output_path, &png)
            .map_err(|e| Error::Screenshot(format!("{}: {}", output_path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Viewport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticBackend {
        closed: Arc<AtomicUsize>,
    }

    struct StaticSession {
        closed: Arc<AtomicUsize>,
    }

    impl RenderBackend for StaticBackend {
        fn launch(&self, _viewport: Viewport) -> Result<Box<dyn RenderSession>> {
            Ok(Box::new(StaticSession { closed: self.closed.clone() }))
        }
    }

    impl RenderSession for StaticSession {
        fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        fn wait_for_model(&mut self, _timeout: Option<Duration>) -> Result<ModelLoad> {
            Ok(ModelLoad::Loaded)
        }

        fn capture_png(&mut self) -> Result<Vec<u8>> {
            Ok(b"\x89PNG\r\n\x1a\n".to_vec())
        }

        fn close(self: Box<Self>) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn writes_into_owner_thumbnail_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let closed = Arc::new(AtomicUsize::new(0));
        let config = ThumbnailConfig {
            uploads_root: tmp.path().join("uploads"),
            ..Default::default()
        };
        let pipeline = ThumbnailPipeline::new(config, Arc::new(StaticBackend { closed: closed.clone() }));

        let request = RenderRequest::new(
            "http://localhost:3000/uploads/alice/dino.glb",
            "dino_thumbnail.png",
            "alice",
            "http://localhost:3000",
        );
        let relative = pipeline.generate(&request);

        assert_eq!(relative.as_deref(), Some("alice/thumbnails/dino_thumbnail.png"));
        assert!(tmp.path().join("uploads/alice/thumbnails/dino_thumbnail.png").is_file());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bad_model_url_never_launches() {
        let tmp = tempfile::tempdir().unwrap();
        let closed = Arc::new(AtomicUsize::new(0));
        let config = ThumbnailConfig {
            uploads_root: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let pipeline = ThumbnailPipeline::new(config, Arc::new(StaticBackend { closed: closed.clone() }));

        let request = RenderRequest::new("http://localhost:3000/files/dino.glb", "d.png", "alice", "http://localhost:3000");
        assert!(matches!(pipeline.try_generate(&request), Err(Error::InvalidModelUrl(_))));
        assert_eq!(pipeline.generate(&request), None);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }
}
