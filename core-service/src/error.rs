use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Storage provider error: {0}")]
    Provider(#[from] provider_azure_blob::AzureBlobError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),
}

impl CoreError {
    /// Whether the process should exit with a failure status.
    ///
    /// Per-object sync failures are reported in the run summary and are not
    /// fatal; everything that prevents a run from starting or finishing is.
    pub fn is_fatal(&self) -> bool {
        match self {
            CoreError::Sync(e) => e.is_fatal() || matches!(e, core_sync::SyncError::Config(_)),
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use core_sync::SyncError;
    use std::path::PathBuf;

    #[test]
    fn test_fatality() {
        assert!(CoreError::InitializationFailed("no tls".into()).is_fatal());
        assert!(CoreError::Sync(SyncError::Transport("403".into())).is_fatal());
        assert!(CoreError::Sync(SyncError::Config("bad".into())).is_fatal());
        assert!(!CoreError::Sync(SyncError::AlreadyExists(PathBuf::from("a.json"))).is_fatal());
    }
}
