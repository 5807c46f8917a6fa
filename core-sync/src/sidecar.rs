//! # Sidecar Store
//!
//! Reads, writes and deletes the per-object JSON records kept under
//! `<sidecar_root>/<container>/`.
//!
//! ## Record format
//!
//! ```json
//! {
//!   "data": "",
//!   "status": "",
//!   "bolo_link": "https://acct.blob.core.windows.net/recordings/a/1.wav",
//!   "init_blob_time": 1700000000000
//! }
//! ```
//!
//! `status == ""` means the object has not been annotated yet. `data`,
//! `status` and `bolo_link` belong to the annotation workflow and may hold any
//! JSON value; only `init_blob_time` is interpreted here. Fields other than
//! these four belong to downstream tools and survive a restamp.
//!
//! ## Paths
//!
//! Object `a/b/1.wav` in container `recordings` maps to
//! `<root>/recordings/a/b/1.json`. Only the final extension is replaced.

use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::job::RunStamp;

/// Extension of sidecar files, without the dot.
pub const SIDECAR_EXTENSION: &str = "json";

/// JSON field holding the run stamp.
pub const STAMP_FIELD: &str = "init_blob_time";

/// Records read ahead while listing.
const READ_AHEAD: usize = 16;

/// Parsed sidecar record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarRecord {
    /// Annotation payload; owned by the downstream workflow
    #[serde(default = "empty_string")]
    pub data: Value,

    /// Annotation state; the empty string until processed
    #[serde(default = "empty_string")]
    pub status: Value,

    /// Address of the backing object
    #[serde(rename = "bolo_link", default = "empty_string")]
    pub link: Value,

    /// Stamp of the last run that confirmed the backing object; `None` when
    /// missing or not an integer
    #[serde(
        rename = "init_blob_time",
        default,
        deserialize_with = "lenient_stamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub run_stamp: Option<RunStamp>,

    /// Fields written by other tools
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn empty_string() -> Value {
    Value::String(String::new())
}

fn lenient_stamp<'de, D>(deserializer: D) -> std::result::Result<Option<RunStamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_i64).map(RunStamp::new))
}

/// Run stamp of a raw record object.
pub fn stamp_of(object: &Map<String, Value>) -> Option<RunStamp> {
    object.get(STAMP_FIELD).and_then(Value::as_i64).map(RunStamp::new)
}

impl SidecarRecord {
    /// A fresh, unprocessed record.
    pub fn new(link: impl Into<String>, run_stamp: RunStamp) -> Self {
        Self {
            data: empty_string(),
            status: empty_string(),
            link: Value::String(link.into()),
            run_stamp: Some(run_stamp),
            extra: Map::new(),
        }
    }

    pub fn is_unprocessed(&self) -> bool {
        self.status.as_str() == Some("")
    }

    /// The backing object's address, when it is a string.
    pub fn link_url(&self) -> Option<&str> {
        self.link.as_str()
    }

    /// Parse raw file contents.
    pub fn from_slice(path: &Path, raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| SyncError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn to_pretty_bytes(&self, path: &Path) -> Result<Bytes> {
        serde_json::to_vec_pretty(self)
            .map(Bytes::from)
            .map_err(|e| SyncError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

/// Derive the record path of `object_key`, relative to the container root.
///
/// Pure and deterministic: the same key always yields the same path.
///
/// # Errors
///
/// `SyncError::InvalidKey` for empty keys, absolute keys, empty segments and
/// `.`/`..` segments.
pub fn sidecar_relative_path(object_key: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| SyncError::InvalidKey(format!("{}: {}", object_key, reason));

    if object_key.is_empty() {
        return Err(invalid("empty key"));
    }
    if object_key.starts_with('/') || object_key.contains('\\') {
        return Err(invalid("not a relative key"));
    }

    let segments: Vec<&str> = object_key.split('/').collect();
    if segments
        .iter()
        .any(|segment| segment.is_empty() || *segment == "." || *segment == "..")
    {
        return Err(invalid("empty or relative path segment"));
    }

    let (file_name, directories) = match segments.split_last() {
        Some(parts) => parts,
        None => return Err(invalid("empty key")),
    };

    let stem = match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    };

    let mut path: PathBuf = directories.iter().collect();
    path.push(format!("{}.{}", stem, SIDECAR_EXTENSION));
    Ok(path)
}

/// Sidecar records of one container.
#[derive(Clone)]
pub struct SidecarStore {
    fs: Arc<dyn FileSystemAccess>,
    root: PathBuf,
}

impl SidecarStore {
    /// Store rooted at `<sidecar_root>/<container>`.
    pub fn new(fs: Arc<dyn FileSystemAccess>, sidecar_root: impl AsRef<Path>, container: &str) -> Result<Self> {
        if container.is_empty() || container.contains('/') || container == "." || container == ".." {
            return Err(SyncError::Config(format!(
                "Invalid container name for sidecar namespace: '{}'",
                container
            )));
        }

        Ok(Self {
            fs,
            root: sidecar_root.as_ref().join(container),
        })
    }

    /// Directory holding every record of the container.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute record path for `object_key`.
    pub fn path_for(&self, object_key: &str) -> Result<PathBuf> {
        Ok(self.root.join(sidecar_relative_path(object_key)?))
    }

    pub async fn exists(&self, path: &Path) -> Result<bool> {
        self.fs
            .exists(path)
            .await
            .map_err(|e| SyncError::filesystem(path, e))
    }

    pub async fn read(&self, path: &Path) -> Result<SidecarRecord> {
        let raw = self.read_raw(path).await?;
        SidecarRecord::from_slice(path, &raw)
    }

    /// Unparsed file contents.
    pub async fn read_raw(&self, path: &Path) -> Result<Bytes> {
        self.fs
            .read_file(path)
            .await
            .map_err(|e| SyncError::filesystem(path, e))
    }

    /// Write a fresh record; fails with `AlreadyExists` if one is present.
    pub async fn create(&self, path: &Path, link: &str, run_stamp: RunStamp) -> Result<SidecarRecord> {
        let record = SidecarRecord::new(link, run_stamp);
        let bytes = record.to_pretty_bytes(path)?;

        self.fs
            .create_new_file(path, bytes)
            .await
            .map_err(|e| SyncError::filesystem(path, e))?;

        debug!(path = ?path, run_stamp = %run_stamp, "Created sidecar record");
        Ok(record)
    }

    /// Set the stamp of an existing record, leaving every other field as is.
    ///
    /// The file is replaced atomically, so an interrupted restamp leaves the
    /// previous contents in place.
    pub async fn restamp(&self, path: &Path, run_stamp: RunStamp) -> Result<()> {
        let raw = self.read_raw(path).await?;

        let mut object: Map<String, Value> =
            serde_json::from_slice(&raw).map_err(|e| SyncError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        object.insert(STAMP_FIELD.to_string(), Value::from(run_stamp.value()));

        let bytes = serde_json::to_vec_pretty(&object).map_err(|e| SyncError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        self.fs
            .write_file(path, Bytes::from(bytes))
            .await
            .map_err(|e| SyncError::filesystem(path, e))?;

        debug!(path = ?path, run_stamp = %run_stamp, "Restamped sidecar record");
        Ok(())
    }

    /// Remove a record. Missing records are not an error.
    pub async fn delete(&self, path: &Path) -> Result<()> {
        match self.fs.delete_file(path).await {
            Ok(()) => {
                debug!(path = ?path, "Deleted sidecar record");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(SyncError::filesystem(path, e)),
        }
    }

    /// Every record file under the container root.
    pub async fn list_paths(&self) -> Result<Vec<PathBuf>> {
        self.fs
            .list_files_recursive(&self.root, SIDECAR_EXTENSION)
            .await
            .map_err(|e| SyncError::filesystem(&self.root, e))
    }

    /// Lazily read every record, yielding the path with its raw contents in
    /// path order.
    ///
    /// Directory traversal happens up front; file contents are read as the
    /// stream is polled, a few files ahead of the consumer.
    pub async fn list_all(&self) -> Result<impl Stream<Item = (PathBuf, Result<Bytes>)> + Send + 'static> {
        let paths = self.list_paths().await?;
        let store = self.clone();

        Ok(stream::iter(paths)
            .map(move |path| {
                let store = store.clone();
                async move {
                    let raw = store.read_raw(&path).await;
                    (path, raw)
                }
            })
            .buffered(READ_AHEAD))
    }
}

impl std::fmt::Debug for SidecarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidecarStore")
            .field("root", &self.root)
            .finish()
    }
}
