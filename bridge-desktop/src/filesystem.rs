//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Tokio-based file system implementation
///
/// All paths are used as given; callers root them under their own namespace.
#[derive(Debug, Default, Clone)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Hidden sibling used to stage a replacement of `path`.
    fn staging_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        path.with_file_name(format!(".{}.{}-{}.tmp", name, std::process::id(), unique))
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await?)
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        Self::ensure_parent(path).await?;

        let staging = Self::staging_path(path);
        let staged = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(data.as_ref()).await?;
            file.sync_all().await?;
            fs::rename(&staging, path).await
        }
        .await;

        if let Err(e) = staged {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn create_new_file(&self, path: &Path, data: Bytes) -> Result<()> {
        Self::ensure_parent(path).await?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => BridgeError::AlreadyExists(path.to_path_buf()),
                _ => BridgeError::Io(e),
            })?;

        file.write_all(data.as_ref()).await?;
        file.flush().await?;

        debug!(path = ?path, size = data.len(), "Created file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn list_files_recursive(&self, root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = match fs::read_dir(&dir).await {
                Ok(read_dir) => read_dir,
                Err(e) if e.kind() == ErrorKind::NotFound && dir == root => {
                    debug!(path = ?root, "Listing root does not exist");
                    return Ok(files);
                }
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = read_dir.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(extension)
                {
                    files.push(path);
                }
            }
        }

        files.sort();
        debug!(path = ?root, count = files.len(), "Listed files recursively");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();
        let test_file = dir.path().join("nested").join("test-file.json");

        let data = Bytes::from("Hello, World!");
        fs.write_file(&test_file, data.clone()).await.unwrap();

        assert!(fs.exists(&test_file).await.unwrap());
        assert_eq!(fs.read_file(&test_file).await.unwrap(), data);

        fs.delete_file(&test_file).await.unwrap();
        assert!(!fs.exists(&test_file).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_replaces_without_leaving_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();
        let path = dir.path().join("a").join("1.json");

        fs.write_file(&path, Bytes::from("first")).await.unwrap();
        fs.write_file(&path, Bytes::from("second")).await.unwrap();

        assert_eq!(fs.read_file(&path).await.unwrap(), Bytes::from("second"));
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("a"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("1.json")]);
    }

    #[tokio::test]
    async fn test_create_new_rejects_existing() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();
        let path = dir.path().join("a").join("1.json");

        fs.create_new_file(&path, Bytes::from("first")).await.unwrap();
        let err = fs
            .create_new_file(&path, Bytes::from("second"))
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::AlreadyExists(p) if p == path));
        assert_eq!(fs.read_file(&path).await.unwrap(), Bytes::from("first"));
    }

    #[tokio::test]
    async fn test_delete_missing_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();

        let err = fs.delete_file(&dir.path().join("missing.json")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_files_recursive_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();
        let root = dir.path().join("container");

        for name in ["a/1.json", "a/b/2.json", "3.json", "a/notes.txt"] {
            fs.write_file(&root.join(name), Bytes::from("{}")).await.unwrap();
        }

        let files = fs.list_files_recursive(&root, "json").await.unwrap();
        let mut relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(&root).unwrap().to_path_buf())
            .collect();
        relative.sort();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("3.json"),
                PathBuf::from("a/1.json"),
                PathBuf::from("a/b/2.json"),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::new();

        let files = fs
            .list_files_recursive(&dir.path().join("nope"), "json")
            .await
            .unwrap();
        assert!(files.is_empty());
    }
}
