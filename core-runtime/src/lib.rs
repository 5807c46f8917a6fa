//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sidecar sync engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Progress event bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the other crates depend on.
//! It establishes the logging conventions, the single configuration value that
//! is threaded through a run, and the broadcast channel used to report
//! progress without coupling the engine to any particular renderer.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
