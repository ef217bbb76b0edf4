pub use anyhow::{anyhow, bail, Context, Error, Result};
pub use log::{debug, error, info, trace, warn};

/// Stage-specific failures of the pinning pipeline. All of these are
/// terminal: the run aborts at the failing stage, nothing is retried.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum PinError {
    #[error("Failed to fetch branch {branch:?} of {url:?}")]
    Fetch { url: String, branch: String },
    #[error("No operator manifest found: {0}")]
    ManifestNotFound(String),
    #[error("Version directories {0:?} and {1:?} compare equal")]
    AmbiguousVersion(String, String),
    #[error("Image reference is already pinned to a digest: {0:?}")]
    AlreadyPinned(String),
    #[error("Failed to pull image: {0:?}")]
    Pull(String),
    #[error("Container engine reported no digest for image: {0:?}")]
    DigestUnavailable(String),
    #[error("Image reference expected in manifest but not found: {0:?}")]
    ReferenceNotFound(String),
    #[error("Failed to build index image: {0:?}")]
    Build(String),
}
