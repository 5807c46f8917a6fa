//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host tooling can depend on `sidecar-workspace` and enable
//! `desktop-shims` to pull in the fully wired `core-service` façade without
//! naming each crate.

#[cfg(feature = "desktop-shims")]
pub use core_service;
