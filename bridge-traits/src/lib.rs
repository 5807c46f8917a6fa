//! # Host Bridge Traits
//!
//! Capability traits that the sync engine requires from its host.
//!
//! ## Overview
//!
//! This crate defines the contract between the reconciliation core and the
//! concrete platform it runs on. Each trait represents a capability the core
//! needs but must not implement itself, so the engine can be exercised
//! against in-memory fakes in tests and against the real disk and network in
//! production.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Sidecar file I/O
//! - [`StorageProvider`](storage::StorageProvider) - Paginated remote object listing
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic run stamps
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//! | Azure    | `provider-azure-blob` (`StorageProvider`) |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should convert platform-specific errors to `BridgeError`
//! and include context such as file paths or HTTP status codes.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared by every worker task of a sync run.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{FileSystemAccess, RemoteFile, StorageProvider};
pub use time::{Clock, FixedClock, SystemClock};
