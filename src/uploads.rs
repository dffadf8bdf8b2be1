//! Uploads tree layout
//!
//! Models live at `<root>/<owner>/<file>` and thumbnails at
//! `<root>/<owner>/thumbnails/<file>`. Paths handed back to callers are
//! relative to the root and always use `/` so they can be composed into
//! public URLs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::{Error, Result, THUMBNAIL_DIR_NAME};

/// Accepted model upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Glb,
    Gltf,
    Obj,
    Fbx,
}

impl ModelFormat {
    /// Detect the format from a file name's extension (case-insensitive)
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "glb" => Some(ModelFormat::Glb),
            "gltf" => Some(ModelFormat::Gltf),
            "obj" => Some(ModelFormat::Obj),
            "fbx" => Some(ModelFormat::Fbx),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ModelFormat::Glb => "glb",
            ModelFormat::Gltf => "gltf",
            ModelFormat::Obj => "obj",
            ModelFormat::Fbx => "fbx",
        }
    }
}

/// Public URL of a stored model: `<base_url>/uploads/<owner>/<file>`
pub fn model_url(base_url: &str, owner: &str, stored_filename: &str) -> String {
    format!("{}/uploads/{}/{}", base_url.trim_end_matches('/'), owner, stored_filename)
}

/// Thumbnail name for a stored model: `<stem>_thumbnail.png`
pub fn thumbnail_filename(stored_filename: &str) -> String {
    let stem = Path::new(stored_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(stored_filename);
    format!("{}_thumbnail.png", stem)
}

/// Filesystem layout of the uploads tree
#[derive(Debug, Clone)]
pub struct UploadsLayout {
    root: PathBuf,
}

impl UploadsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn owner_dir(&self, owner: &str) -> PathBuf {
        self.root.join(owner)
    }

    pub fn thumbnail_dir(&self, owner: &str) -> PathBuf {
        self.owner_dir(owner).join(THUMBNAIL_DIR_NAME)
    }

    pub fn thumbnail_path(&self, owner: &str, filename: &str) -> PathBuf {
        self.thumbnail_dir(owner).join(filename)
    }

    /// `<owner>/thumbnails/<filename>`
    pub fn relative_thumbnail_path(&self, owner: &str, filename: &str) -> String {
        format!("{}/{}/{}", owner, THUMBNAIL_DIR_NAME, filename)
    }

    /// Create the owner's thumbnail directory (and parents) if needed.
    /// Returns the directory and whether it had to be created.
    pub fn ensure_thumbnail_dir(&self, owner: &str) -> Result<(PathBuf, bool)> {
        let dir = self.thumbnail_dir(owner);
        let existed = dir.is_dir();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Setup(format!("{}: {}", dir.display(), e)))?;
        Ok((dir, !existed))
    }

    /// Absolute path of a root-relative path such as a stored thumbnail path
    pub fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Delete a stored file by its root-relative path.
    ///
    /// A file that is already gone is only worth a warning; deleting a model
    /// record must not fail because its thumbnail never got written.
    pub fn remove(&self, relative: &str) -> Result<bool> {
        if relative.split('/').any(|part| part == "..") {
            return Err(Error::Setup(format!("Refusing to delete outside uploads root: {}", relative)));
        }
        let path = self.resolve(relative);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("File deleted: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Attempted to delete non-existent file: {}", path.display());
                Ok(false)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}
