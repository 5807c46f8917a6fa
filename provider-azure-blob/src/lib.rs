//! # Azure Blob Storage Provider
//!
//! Implements the `StorageProvider` trait for a single Azure Blob Storage
//! container addressed by its URL and a shared access signature (SAS).
//!
//! ## Overview
//!
//! This module provides:
//! - Flat, paginated container listing (`List Blobs`, up to 5000 entries per page)
//! - SAS authentication appended to every request
//! - XML response parsing into [`RemoteFile`](bridge_traits::RemoteFile) entries
//!
//! Extension filtering is left to the caller.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::AzureBlobConnector;
pub use error::{AzureBlobError, Result};
