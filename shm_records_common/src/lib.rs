//! Common library for the shm_records workspace
//!
//! This crate provides shared constants, configuration loading and tracing
//! setup for every crate and binary in the workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Naming and sizing constants for shared memory segments
//! - [`config`] - Configuration loading traits and types
//! - [`logging`] - Tracing subscriber initialisation
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! common = { package = "shm_records_common", path = "../shm_records_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use shm_records_common::consts::*;
//! use shm_records_common::config::{ConfigLoader, ShmConfig};
//! ```

pub mod config;
pub mod consts;
pub mod logging;
