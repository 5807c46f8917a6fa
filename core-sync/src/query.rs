//! Read-only lookup of records still waiting for annotation.

use futures::StreamExt;
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

use crate::error::Result;
use crate::sidecar::{SidecarRecord, SidecarStore};

/// A record whose `status` is still the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRecord {
    pub path: PathBuf,
    /// `None` when the record's `bolo_link` is not a string
    pub link: Option<String>,
}

/// List every record whose `status` is exactly `""`, ordered by path.
///
/// Records that are unreadable or not a JSON object are skipped with a
/// warning; nothing is modified.
pub async fn find_unprocessed(store: &SidecarStore) -> Result<Vec<PendingRecord>> {
    let mut records = Box::pin(store.list_all().await?);
    let mut pending = Vec::new();

    while let Some((path, raw)) = records.next().await {
        let record = match raw.and_then(|raw| SidecarRecord::from_slice(&path, &raw)) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = ?path, error = %e, "Skipping unreadable sidecar record");
                continue;
            }
        };

        if record.is_unprocessed() {
            pending.push(PendingRecord {
                path,
                link: record.link_url().map(str::to_string),
            });
        }
    }

    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::RunStamp;
    use bridge_desktop::TokioFileSystem;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_find_unprocessed() {
        let dir = tempfile::tempdir().unwrap();
        let store = SidecarStore::new(Arc::new(TokioFileSystem::new()), dir.path(), "c").unwrap();

        let fresh = store.path_for("a/1.wav").unwrap();
        store.create(&fresh, "link-1", RunStamp::new(1)).await.unwrap();

        let done = store.path_for("a/2.wav").unwrap();
        std::fs::write(&done, r#"{"data":"x","status":"done","bolo_link":"link-2","init_blob_time":1}"#).unwrap();

        let broken = store.path_for("a/3.wav").unwrap();
        std::fs::write(&broken, "garbage").unwrap();

        let staged = store.path_for("a/4.wav").unwrap();
        std::fs::write(&staged, r#"{"data":"","status":{"stage":2},"bolo_link":"link-4","init_blob_time":1}"#).unwrap();

        let unlinked = store.path_for("a/5.wav").unwrap();
        std::fs::write(&unlinked, r#"{"data":"","status":"","bolo_link":null,"init_blob_time":1}"#).unwrap();

        let pending = find_unprocessed(&store).await.unwrap();

        assert_eq!(
            pending,
            vec![
                PendingRecord {
                    path: fresh,
                    link: Some("link-1".to_string()),
                },
                PendingRecord {
                    path: unlinked,
                    link: None,
                },
            ]
        );
        assert!(broken.exists());
    }
}
