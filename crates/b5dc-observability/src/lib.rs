// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # b5dc-observability
//!
//! Logging setup shared by every B5DC proxy binary.
//!
//! Console output is always enabled. When a log directory is configured, JSON
//! log files are additionally written to a timestamped run folder, one per
//! crate plus a combined file.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known B5DC crate names for debug flags
///
/// These are also the `target:` values used by the crates' tracing calls.
pub const KNOWN_CRATES: &[&str] = &[
    "b5dc-proxy",
    "b5dc-config",
    "b5dc-device",
    "b5dc-supervisor",
];
