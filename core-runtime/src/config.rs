//! # Sync Configuration Module
//!
//! Provides the configuration value for a sidecar sync run.
//!
//! ## Overview
//!
//! A [`SidecarConfig`] is constructed once at startup, validated fail-fast,
//! and then shared by reference with every component of the run. Nothing in
//! the engine reads global state.
//!
//! ## Usage
//!
//! ### Builder
//!
//! ```
//! use core_runtime::config::SidecarConfig;
//!
//! let config = SidecarConfig::builder()
//!     .container_url("https://acct.blob.core.windows.net/recordings")
//!     .sas_token("sv=2022-11-02&sig=abc")
//!     .extensions([".wav"])
//!     .create_concurrency(50)
//!     .delete_concurrency(20)
//!     .sweep_enabled(true)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.container_name(), "recordings");
//! ```
//!
//! ### JSON file
//!
//! ```json
//! {
//!   "ContainerUrl": "https://acct.blob.core.windows.net/recordings",
//!   "SAS_KEY": "sv=2022-11-02&sig=abc",
//!   "init_blob": {
//!     "ext": [".wav"],
//!     "syncWavToJsonConcurrency": 50,
//!     "deleteNotExistsConcurrency": 50,
//!     "deleteNotExists": true,
//!     "showTotal": true
//!   }
//! }
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default concurrency ceiling for both worker phases.
pub const DEFAULT_CONCURRENCY: usize = 50;

/// Upper bound accepted for either concurrency ceiling.
pub const MAX_CONCURRENCY: usize = 1024;

/// Default directory under which per-container sidecar trees live.
pub const DEFAULT_SIDECAR_ROOT: &str = "blob";

/// Configuration for one sidecar sync run.
#[derive(Clone, PartialEq, Eq)]
pub struct SidecarConfig {
    /// Container URL without query string, e.g. `https://acct.blob.core.windows.net/recordings`
    pub container_url: String,

    /// Shared access signature appended to listing requests
    pub sas_token: String,

    /// Lowercase extensions with a leading dot, e.g. `.wav`
    pub extensions: Vec<String>,

    /// Worker ceiling for the create/restamp phase
    pub create_concurrency: usize,

    /// Worker ceiling for the orphan sweep phase
    pub delete_concurrency: usize,

    /// Restamp existing records and sweep orphans afterwards
    pub sweep_enabled: bool,

    /// Run the advisory counting pre-pass for progress totals
    pub show_total: bool,

    /// Local directory holding `<container>/...` sidecar trees
    pub sidecar_root: PathBuf,
}

impl fmt::Debug for SidecarConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SidecarConfig")
            .field("container_url", &self.container_url)
            .field("sas_token", &"[REDACTED]")
            .field("extensions", &self.extensions)
            .field("create_concurrency", &self.create_concurrency)
            .field("delete_concurrency", &self.delete_concurrency)
            .field("sweep_enabled", &self.sweep_enabled)
            .field("show_total", &self.show_total)
            .field("sidecar_root", &self.sidecar_root)
            .finish()
    }
}

impl SidecarConfig {
    /// Creates a new builder for constructing a `SidecarConfig`.
    pub fn builder() -> SidecarConfigBuilder {
        SidecarConfigBuilder::default()
    }

    /// Load and validate a configuration file in the JSON format shown in the
    /// module documentation.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("Invalid config JSON: {}", e)))?;

        let mut builder = Self::builder()
            .container_url(file.container_url)
            .sas_token(file.sas_key)
            .extensions(file.init_blob.ext)
            .create_concurrency(file.init_blob.sync_concurrency)
            .delete_concurrency(file.init_blob.delete_concurrency)
            .sweep_enabled(file.init_blob.delete_not_exists)
            .show_total(file.init_blob.show_total);

        if let Some(root) = file.sidecar_root {
            builder = builder.sidecar_root(root);
        }

        builder.build()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.container_url.trim().is_empty() {
            return Err(Error::Config("Container URL cannot be empty".to_string()));
        }

        if !self.container_url.contains("://") {
            return Err(Error::Config(format!(
                "Container URL must be absolute: {}",
                self.container_url
            )));
        }

        if self.container_url.contains('?') {
            return Err(Error::Config(
                "Container URL must not carry a query string; put the SAS in SAS_KEY".to_string(),
            ));
        }

        if self.container_name().is_empty() {
            return Err(Error::Config(format!(
                "Container URL has no container segment: {}",
                self.container_url
            )));
        }

        if self.extensions.is_empty() {
            return Err(Error::Config(
                "Extension allow-list cannot be empty".to_string(),
            ));
        }

        if self.extensions.iter().any(|ext| ext.len() < 2) {
            return Err(Error::Config(
                "Extensions must name at least one character after the dot".to_string(),
            ));
        }

        for (name, value) in [
            ("create", self.create_concurrency),
            ("delete", self.delete_concurrency),
        ] {
            if value == 0 {
                return Err(Error::Config(format!(
                    "{} concurrency must be greater than 0",
                    name
                )));
            }
            if value > MAX_CONCURRENCY {
                return Err(Error::Config(format!(
                    "{} concurrency exceeds maximum of {}",
                    name, MAX_CONCURRENCY
                )));
            }
        }

        if self.sidecar_root.as_os_str().is_empty() {
            return Err(Error::Config("Sidecar root cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Last path segment of the container URL.
    pub fn container_name(&self) -> &str {
        container_name_of(&self.container_url)
    }
}

/// Builder for constructing [`SidecarConfig`] instances.
#[derive(Default)]
pub struct SidecarConfigBuilder {
    container_url: Option<String>,
    sas_token: Option<String>,
    extensions: Vec<String>,
    create_concurrency: Option<usize>,
    delete_concurrency: Option<usize>,
    sweep_enabled: bool,
    show_total: bool,
    sidecar_root: Option<PathBuf>,
}

impl SidecarConfigBuilder {
    pub fn container_url(mut self, url: impl Into<String>) -> Self {
        self.container_url = Some(url.into());
        self
    }

    pub fn sas_token(mut self, token: impl Into<String>) -> Self {
        self.sas_token = Some(token.into());
        self
    }

    /// Sets the extension allow-list. Entries are normalised to lowercase with
    /// a leading dot, so `WAV`, `.wav` and `.Wav` are equivalent.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        self
    }

    pub fn create_concurrency(mut self, value: usize) -> Self {
        self.create_concurrency = Some(value);
        self
    }

    pub fn delete_concurrency(mut self, value: usize) -> Self {
        self.delete_concurrency = Some(value);
        self
    }

    pub fn sweep_enabled(mut self, enabled: bool) -> Self {
        self.sweep_enabled = enabled;
        self
    }

    pub fn show_total(mut self, enabled: bool) -> Self {
        self.show_total = enabled;
        self
    }

    pub fn sidecar_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.sidecar_root = Some(root.into());
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the container URL is missing or any
    /// validation rule fails.
    pub fn build(self) -> Result<SidecarConfig> {
        let container_url = self
            .container_url
            .ok_or_else(|| Error::Config("Container URL is required".to_string()))?
            .trim()
            .trim_end_matches('/')
            .to_string();

        let mut extensions = self.extensions;
        extensions.sort();
        extensions.dedup();

        let config = SidecarConfig {
            container_url,
            sas_token: self
                .sas_token
                .unwrap_or_default()
                .trim()
                .trim_start_matches('?')
                .to_string(),
            extensions,
            create_concurrency: self.create_concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            delete_concurrency: self.delete_concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            sweep_enabled: self.sweep_enabled,
            show_total: self.show_total,
            sidecar_root: self
                .sidecar_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SIDECAR_ROOT)),
        };

        config.validate()?;
        Ok(config)
    }
}

/// On-disk configuration document.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "ContainerUrl")]
    container_url: String,

    #[serde(rename = "SAS_KEY", default)]
    sas_key: String,

    init_blob: InitBlobSection,

    #[serde(default)]
    sidecar_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitBlobSection {
    ext: Vec<String>,

    #[serde(rename = "syncWavToJsonConcurrency", default = "default_concurrency")]
    sync_concurrency: usize,

    #[serde(rename = "deleteNotExistsConcurrency", default = "default_concurrency")]
    delete_concurrency: usize,

    #[serde(default)]
    delete_not_exists: bool,

    #[serde(default)]
    show_total: bool,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

fn container_name_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    match without_scheme.split_once('/') {
        Some((_, path)) => path.trim_end_matches('/').rsplit('/').next().unwrap_or(""),
        None => "",
    }
}

/// Final extension of a slash-delimited key, lowercased with a leading dot.
/// Dotfiles such as `a/.hidden` have no extension.
pub fn extension_of(key: &str) -> Option<String> {
    let base = key.rsplit('/').next().unwrap_or(key);
    match base.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < base.len() => Some(base[idx..].to_lowercase()),
        _ => None,
    }
}
