//! Model thumbnailer
//!
//! Renders PNG previews of uploaded 3D models by loading each model in an
//! isolated viewer page inside a headless browser and capturing a fixed-size
//! screenshot.
//!
//! # Features
//!
//! - **CDP Backend** (default): drives headless Chrome over the DevTools Protocol
//! - **Best effort**: every failure degrades to "no thumbnail" instead of an error
//! - **Process isolation**: one browser process per render, always torn down
//!
//! # Example
//!
//! ```no_run
//! use model_thumbnailer::{RenderRequest, ThumbnailConfig, ThumbnailService};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ThumbnailConfig {
//!     uploads_root: "public/uploads".into(),
//!     ..Default::default()
//! };
//!
//! let service = ThumbnailService::with_chrome(config)?;
//! let thumbnail = service
//!     .generate(RenderRequest::new(
//!         "http://localhost:3000/uploads/alice/dino.glb",
//!         "dino_thumbnail.png",
//!         "alice",
//!         "http://localhost:3000",
//!     ))
//!     .await;
//! println!("thumbnail: {:?}", thumbnail);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub mod error;
pub use error::{Error, Result, Stage};

pub mod backend;
pub use backend::{ModelLoad, RenderBackend, RenderSession};

pub mod events;
pub use events::{LogEvents, RenderEvent, RenderEvents};

pub mod pipeline;
pub use pipeline::{RenderRequest, ThumbnailPipeline};

pub mod uploads;
pub use uploads::{ModelFormat, UploadsLayout};

pub mod viewer;

// Async-friendly service (worker thread per render)
pub mod async_api;
pub use async_api::ThumbnailService;

#[cfg(feature = "cdp")]
pub mod cdp;

/// Name of the per-owner directory that holds generated thumbnails
pub const THUMBNAIL_DIR_NAME: &str = "thumbnails";

/// Configuration for thumbnail rendering
///
/// The defaults match what the upload flow expects: a 400×300 transparent
/// PNG, a 30 second navigation budget and a 15 second budget for the model
/// itself to finish loading.
///
/// # Examples
///
/// ```
/// let cfg = model_thumbnailer::ThumbnailConfig::default();
/// assert_eq!(cfg.viewport.width, 400);
/// assert_eq!(cfg.navigation_timeout_ms, 30000);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Root of the uploads tree (`<root>/<owner>/thumbnails/<file>`)
    pub uploads_root: PathBuf,
    /// Output resolution of every thumbnail
    pub viewport: Viewport,
    /// Hard limit for navigation to settle (network idle)
    pub navigation_timeout_ms: u64,
    /// Limit for the model load signal; `None` waits without bound
    pub load_timeout_ms: Option<u64>,
    /// Pass `--no-sandbox` / `--disable-setuid-sandbox` to the browser
    pub disable_sandbox: bool,
    /// Explicit browser binary, otherwise auto-detected
    pub chrome_path: Option<PathBuf>,
    /// Upper bound on simultaneously running renders
    pub max_concurrent_renders: usize,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            uploads_root: PathBuf::from("public/uploads"),
            viewport: Viewport::default(),
            navigation_timeout_ms: 30000,
            load_timeout_ms: Some(15000),
            disable_sandbox: true,
            chrome_path: None,
            max_concurrent_renders: num_cpus::get().max(1),
        }
    }
}

impl ThumbnailConfig {
    /// Defaults overlaid with `THUMBNAIL_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Load a JSON config file; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("THUMBNAIL_UPLOADS_ROOT") {
            self.uploads_root = PathBuf::from(root);
        }
        if let Some(ms) = lookup("THUMBNAIL_NAVIGATION_TIMEOUT_MS") {
            self.navigation_timeout_ms = parse_var("THUMBNAIL_NAVIGATION_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("THUMBNAIL_LOAD_TIMEOUT_MS") {
            self.load_timeout_ms = match ms.trim() {
                "none" | "unbounded" => None,
                other => Some(parse_var("THUMBNAIL_LOAD_TIMEOUT_MS", other)?),
            };
        }
        if let Some(flag) = lookup("THUMBNAIL_DISABLE_SANDBOX") {
            self.disable_sandbox = parse_var("THUMBNAIL_DISABLE_SANDBOX", &flag)?;
        }
        if let Some(path) = lookup("THUMBNAIL_CHROME_PATH") {
            self.chrome_path = Some(PathBuf::from(path));
        }
        if let Some(n) = lookup("THUMBNAIL_MAX_CONCURRENT") {
            self.max_concurrent_renders = parse_var("THUMBNAIL_MAX_CONCURRENT", &n)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject settings no render could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::Config(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.navigation_timeout_ms == 0 {
            return Err(Error::Config("navigation_timeout_ms must be positive".into()));
        }
        if self.load_timeout_ms == Some(0) {
            return Err(Error::Config("load_timeout_ms must be positive (omit it to wait without bound)".into()));
        }
        if self.max_concurrent_renders == 0 {
            return Err(Error::Config("max_concurrent_renders must be at least 1".into()));
        }
        Ok(())
    }

    /// Filesystem layout rooted at `uploads_root`
    pub fn layout(&self) -> UploadsLayout {
        UploadsLayout::new(self.uploads_root.clone())
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {} value '{}': {}", key, raw, e)))
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 400,
            height: 300,
        }
    }
}
