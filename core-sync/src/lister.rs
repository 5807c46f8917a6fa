//! # Remote Lister
//!
//! Turns the provider's paginated listing into a lazy stream of
//! [`RemoteObject`]s filtered by extension.
//!
//! The stream fetches one page at a time as it is polled and cannot be
//! restarted; call [`RemoteLister::list_matching`] again for a fresh pass. A
//! page that cannot be fetched ends the stream with `SyncError::Transport`.

use bridge_traits::storage::{RemoteFile, StorageProvider};
use core_runtime::config::{extension_of, SidecarConfig};
use futures::stream::{self, Stream, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{Result, SyncError};

/// An object observed in the remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Slash-delimited key, unique within the container
    pub key: String,
    /// Address of the object without credentials
    pub url: String,
}

impl RemoteObject {
    /// Final extension, lowercased with a leading dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.key)
    }

    /// Directory part of the key; empty for objects at the container root.
    pub fn prefix(&self) -> &str {
        self.key.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }
}

enum Page {
    First,
    Next(String),
    Done,
}

/// Lists one container through a [`StorageProvider`].
#[derive(Clone)]
pub struct RemoteLister {
    provider: Arc<dyn StorageProvider>,
    extensions: Arc<[String]>,
}

impl RemoteLister {
    /// `extensions` must already be lowercase with a leading dot.
    pub fn new(provider: Arc<dyn StorageProvider>, extensions: Vec<String>) -> Self {
        Self {
            provider,
            extensions: extensions.into(),
        }
    }

    pub fn from_config(provider: Arc<dyn StorageProvider>, config: &SidecarConfig) -> Self {
        Self::new(provider, config.extensions.clone())
    }

    fn matches(extensions: &[String], key: &str) -> bool {
        extension_of(key)
            .map(|ext| extensions.iter().any(|allowed| *allowed == ext))
            .unwrap_or(false)
    }

    /// Lazily stream every object whose extension is on the allow-list.
    pub fn list_matching(&self) -> impl Stream<Item = Result<RemoteObject>> + Send + 'static {
        let provider = self.provider.clone();
        let extensions = self.extensions.clone();

        let pages = stream::try_unfold(Page::First, move |page| {
            let provider = provider.clone();
            async move {
                let cursor = match page {
                    Page::First => None,
                    Page::Next(marker) => Some(marker),
                    Page::Done => return Ok(None),
                };

                let (files, next) = provider.list_objects(cursor).await.map_err(|e| {
                    error!(error = %e, "Remote listing failed");
                    SyncError::Transport(e.to_string())
                })?;

                debug!(count = files.len(), has_more = next.is_some(), "Fetched listing page");

                let following = match next {
                    Some(marker) => Page::Next(marker),
                    None => Page::Done,
                };
                Ok::<_, SyncError>(Some((files, following)))
            }
        });

        let url_provider = self.provider.clone();
        pages
            .map_ok(|files| stream::iter(files.into_iter().map(Ok::<RemoteFile, SyncError>)))
            .try_flatten()
            .try_filter_map(move |file| {
                let object = Self::matches(&extensions, &file.key).then(|| RemoteObject {
                    url: url_provider.object_url(&file.key),
                    key: file.key,
                });
                async move { Ok::<_, SyncError>(object) }
            })
    }

    /// Drain a fresh listing to count matching objects. Advisory only.
    pub async fn count_matching(&self) -> Result<u64> {
        self.list_matching()
            .try_fold(0u64, |count, _| async move { Ok::<_, SyncError>(count + 1) })
            .await
    }
}

impl std::fmt::Debug for RemoteLister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLister")
            .field("container", &self.provider.container_name())
            .field("extensions", &self.extensions)
            .finish()
    }
}
