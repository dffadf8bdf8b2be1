//! Isolated viewer URL construction

use url::Url;

use crate::{Error, Result};

/// Marker separating the public origin from the stored model path
pub const UPLOADS_MARKER: &str = "/uploads/";

/// Route of the isolated viewer page
pub const VIEWER_ROUTE: &str = "/isolated-viewer";

/// The path after the first `/uploads/` in `model_url` (e.g. `alice/dino.glb`)
pub fn model_path_segment(model_url: &str) -> Result<&str> {
    model_url
        .split_once(UPLOADS_MARKER)
        .map(|(_, rest)| rest)
        .ok_or_else(|| Error::InvalidModelUrl(model_url.to_string()))
}

/// `<base_url>/isolated-viewer?model=<segment>`
///
/// The segment is passed through verbatim; the viewer resolves it against
/// its own uploads route.
///
/// ```
/// let url = model_thumbnailer::viewer::isolated_viewer_url(
///     "http://localhost:3000/uploads/alice/dino.glb",
///     "http://localhost:3000",
/// ).unwrap();
/// assert_eq!(url, "http://localhost:3000/isolated-viewer?model=alice/dino.glb");
/// ```
pub fn isolated_viewer_url(model_url: &str, base_url: &str) -> Result<String> {
    let segment = model_path_segment(model_url)?;
    let viewer = format!("{}{}?model={}", base_url.trim_end_matches('/'), VIEWER_ROUTE, segment);

    // Catch a bad origin here rather than as an opaque navigation error
    Url::parse(&viewer).map_err(|e| Error::Setup(format!("Invalid viewer URL {}: {}", viewer, e)))?;

    Ok(viewer)
}
