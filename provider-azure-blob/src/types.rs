//! Azure Blob Storage response types
//!
//! Data structures for deserializing the `List Blobs` XML response.
//!
//! See: https://learn.microsoft.com/rest/api/storageservices/list-blobs

use serde::Deserialize;

use crate::error::{AzureBlobError, Result};

/// Root element of a `List Blobs` response
#[derive(Debug, Deserialize)]
#[serde(rename = "EnumerationResults")]
pub struct EnumerationResults {
    /// Blobs on this page
    #[serde(rename = "Blobs", default)]
    pub blobs: BlobList,

    /// Continuation marker; empty or absent on the last page
    #[serde(rename = "NextMarker", default)]
    pub next_marker: Option<String>,
}

/// `<Blobs>` wrapper element
#[derive(Debug, Default, Deserialize)]
pub struct BlobList {
    #[serde(rename = "Blob", default)]
    pub items: Vec<BlobItem>,
}

/// A single `<Blob>` entry
#[derive(Debug, Deserialize)]
pub struct BlobItem {
    /// Full blob name (the object key)
    #[serde(rename = "Name")]
    pub name: String,
}

impl EnumerationResults {
    /// Parse a response body, tolerating the UTF-8 BOM Azure prepends.
    pub fn from_xml(body: &str) -> Result<Self> {
        let body = body.trim_start_matches('\u{feff}');
        quick_xml::de::from_str(body)
            .map_err(|e| AzureBlobError::ParseError(format!("Invalid listing XML: {}", e)))
    }

    /// Continuation marker with empty values normalised to `None`.
    pub fn continuation(&self) -> Option<String> {
        self.next_marker
            .as_deref()
            .map(str::trim)
            .filter(|marker| !marker.is_empty())
            .map(str::to_string)
    }
}
