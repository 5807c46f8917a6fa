//! Storage and File System Abstractions
//!
//! Provides the two storage seams the sync engine depends on: the local file
//! system holding sidecar records, and the remote object store being mirrored.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File system access trait
///
/// Abstracts file I/O so the sidecar store can run against the real disk on
/// desktop and an in-memory tree in tests.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn touch(fs: &dyn FileSystemAccess, path: &Path) -> Result<()> {
///     fs.write_file(path, Bytes::from_static(b"{}")).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating parent directories and replacing any
    /// previous contents. The replacement is atomic: readers see either the
    /// old or the new contents, never a truncated file.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Write data to a file that must not exist yet
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AlreadyExists`](crate::error::BridgeError::AlreadyExists)
    /// when the path is already present, including when another task created
    /// it concurrently.
    async fn create_new_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Recursively list regular files under `root` whose extension equals
    /// `extension` (without the dot). A missing root yields an empty list.
    async fn list_files_recursive(&self, root: &Path, extension: &str) -> Result<Vec<PathBuf>>;
}

/// A single object as reported by a remote listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Slash-delimited object key, unique within the container
    pub key: String,
}

impl RemoteFile {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Remote object storage provider
///
/// Abstracts a paginated, flat listing of a single container. Implementations
/// perform no extension filtering; callers decide which keys matter.
///
/// # Example
///
/// ```ignore
/// let mut cursor = None;
/// loop {
///     let (files, next) = provider.list_objects(cursor).await?;
///     handle(files);
///     match next {
///         Some(marker) => cursor = Some(marker),
///         None => break,
///     }
/// }
/// ```
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Fetch one listing page starting at `cursor`.
    ///
    /// Returns the objects on the page and the cursor for the next page, or
    /// `None` once the listing is exhausted.
    async fn list_objects(&self, cursor: Option<String>) -> Result<(Vec<RemoteFile>, Option<String>)>;

    /// Name of the container being listed
    fn container_name(&self) -> &str;

    /// Public address of an object, without credentials
    fn object_url(&self, key: &str) -> String;
}
