use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote listing could not be fetched; aborts the run.
    #[error("Remote listing failed: {0}")]
    Transport(String),

    #[error("Malformed sidecar record {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: BridgeError,
    },

    #[error("Sidecar record already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether the error must abort the whole run rather than a single task.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }

    /// Wrap a bridge failure on `path`, keeping create races distinguishable.
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: BridgeError) -> Self {
        match source {
            BridgeError::AlreadyExists(existing) => SyncError::AlreadyExists(existing),
            source => SyncError::Filesystem {
                path: path.into(),
                source,
            },
        }
    }
}

impl From<core_runtime::Error> for SyncError {
    fn from(err: core_runtime::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
