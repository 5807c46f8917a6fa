//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! clock) into the sync engine. Desktop hosts enable the `desktop-shims`
//! feature, which supplies `bridge-desktop` and the `blob-sidecar` binary.
//!
//! ```ignore
//! use core_runtime::config::SidecarConfig;
//!
//! let config = SidecarConfig::from_json_file("config.json")?;
//! let service = core_service::bootstrap_desktop(config)?;
//! let summary = service.sync().await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{
    http::HttpClient,
    storage::{FileSystemAccess, StorageProvider},
    time::Clock,
};
use core_runtime::config::SidecarConfig;
use core_runtime::events::EventBus;
use core_sync::{PendingRecord, RunSummary, SidecarStore, SyncCoordinator};
use provider_azure_blob::AzureBlobConnector;

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub filesystem: Arc<dyn FileSystemAccess>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        filesystem: Arc<dyn FileSystemAccess>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http_client,
            filesystem,
            clock,
        }
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    deps: Arc<CoreDependencies>,
    config: Arc<SidecarConfig>,
    events: EventBus,
}

impl CoreService {
    /// Create a new service; the configuration is validated up front.
    pub fn new(deps: CoreDependencies, config: SidecarConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            deps: Arc::new(deps),
            config: Arc::new(config),
            events: EventBus::default(),
        })
    }

    /// Access the bridge dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<CoreDependencies> {
        Arc::clone(&self.deps)
    }

    pub fn config(&self) -> &SidecarConfig {
        &self.config
    }

    /// Progress events of every run started through this service.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Listing provider for the configured container.
    pub fn provider(&self) -> Result<Arc<dyn StorageProvider>> {
        let connector = AzureBlobConnector::new(
            Arc::clone(&self.deps.http_client),
            &self.config.container_url,
            &self.config.sas_token,
        )?;
        Ok(Arc::new(connector))
    }

    /// Coordinator over an explicit provider.
    pub fn coordinator_with(&self, provider: Arc<dyn StorageProvider>) -> Result<SyncCoordinator> {
        Ok(SyncCoordinator::new(
            Arc::clone(&self.config),
            provider,
            Arc::clone(&self.deps.filesystem),
            Arc::clone(&self.deps.clock),
            self.events.clone(),
        )?)
    }

    /// Run one full sync of the configured container.
    ///
    /// # Errors
    ///
    /// Only fatal errors; per-object failures are in the summary.
    pub async fn sync(&self) -> Result<RunSummary> {
        let coordinator = self.coordinator_with(self.provider()?)?;
        Ok(coordinator.run().await?)
    }

    /// Records whose `status` is still empty.
    pub async fn pending(&self) -> Result<Vec<PendingRecord>> {
        let store = SidecarStore::new(
            Arc::clone(&self.deps.filesystem),
            &self.config.sidecar_root,
            self.config.container_name(),
        )?;
        Ok(core_sync::find_unprocessed(&store).await?)
    }
}

/// Convenience bootstrapper for desktop hosts.
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: SidecarConfig) -> Result<CoreService> {
    use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
    use bridge_traits::time::SystemClock;

    let http_client = ReqwestHttpClient::new()
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

    CoreService::new(
        CoreDependencies::new(
            Arc::new(http_client),
            Arc::new(TokioFileSystem::new()),
            Arc::new(SystemClock),
        ),
        config,
    )
}
