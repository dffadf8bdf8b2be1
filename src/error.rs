//! Error types for the thumbnail pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage an error (or event) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Launch,
    Navigation,
    LoadWait,
    Screenshot,
    Teardown,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Launch => "launch",
            Stage::Navigation => "navigation",
            Stage::LoadWait => "load-wait",
            Stage::Screenshot => "screenshot",
            Stage::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while rendering a thumbnail
#[derive(Error, Debug)]
pub enum Error {
    /// The output directory could not be prepared
    #[error("Failed to prepare output directory: {0}")]
    Setup(String),

    /// The model URL does not point into the uploads tree
    #[error("Model URL has no '/uploads/' segment: {0}")]
    InvalidModelUrl(String),

    /// The browser process could not be started
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Navigation to the viewer page failed
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Navigation did not settle in time
    #[error("Navigation timed out after {0}ms")]
    Timeout(u64),

    /// The page could not be checked for the viewer element
    #[error("Waiting for model load failed: {0}")]
    LoadWait(String),

    /// Capturing or writing the screenshot failed
    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    /// Closing the browser reported an error
    #[error("Browser teardown failed: {0}")]
    Teardown(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Filesystem error outside the render stages
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The stage this error aborted
    pub fn stage(&self) -> Stage {
        match self {
            Error::Setup(_) | Error::InvalidModelUrl(_) | Error::Config(_) | Error::Io(_) => Stage::Setup,
            Error::Launch(_) => Stage::Launch,
            Error::Navigation(_) | Error::Timeout(_) => Stage::Navigation,
            Error::LoadWait(_) => Stage::LoadWait,
            Error::Screenshot(_) => Stage::Screenshot,
            Error::Teardown(_) => Stage::Teardown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_their_stage() {
        assert_eq!(Error::Setup("denied".into()).stage(), Stage::Setup);
        assert_eq!(Error::InvalidModelUrl("x".into()).stage(), Stage::Setup);
        assert_eq!(Error::Launch("no chrome".into()).stage(), Stage::Launch);
        assert_eq!(Error::Timeout(30000).stage(), Stage::Navigation);
        assert_eq!(Error::Screenshot("disk full".into()).stage(), Stage::Screenshot);
    }

    #[test]
    fn late_stage_errors_keep_their_stage() {
        assert_eq!(Error::Navigation("refused".into()).stage(), Stage::Navigation);
        assert_eq!(Error::LoadWait("binding gone".into()).stage(), Stage::LoadWait);
        assert_eq!(Error::Teardown("tab gone".into()).stage(), Stage::Teardown);
        assert_eq!(Error::Config("bad".into()).stage(), Stage::Setup);

        let io: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(io.stage(), Stage::Setup);
    }

    #[test]
    fn timeout_message_names_the_budget() {
        assert_eq!(Error::Timeout(30000).to_string(), "Navigation timed out after 30000ms");
        assert_eq!(Stage::LoadWait.to_string(), "load-wait");
    }
}
