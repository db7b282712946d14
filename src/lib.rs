// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # B5DC Proxy
//!
//! Supervisory proxy for a Band 5 Down Converter (B5DC). The proxy keeps one
//! datagram session with the B5DC server alive, mirrors the device registers
//! into a published state table and accepts attenuation and frequency
//! commands on behalf of a front-facing adapter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use b5dc_proxy::prelude::*;
//! use std::sync::Arc;
//!
//! let config = load_config(None, None)?;
//! validate_config(&config)?;
//!
//! let manager = B5dcComponentManager::from_config(
//!     &config,
//!     Arc::new(SimulatedDevice::new()),
//!     None,
//! )?;
//! manager.start_communicating();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: b5dc-config, b5dc-observability            │
//! │  (TOML + overrides, console/JSON logging)               │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Device: b5dc-device                                    │
//! │  (Register link, device facade, register map)           │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Supervision: b5dc-supervisor                           │
//! │  (Session loop, sensor polling, command queue)          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - **`observability`** (default): logging initialization
//! - **`sim`** (default): builds the `b5dc_sim_proxy` tool
//!
//! ## License
//!
//! Apache-2.0

pub use b5dc_config as config;
pub use b5dc_device as device;
pub use b5dc_supervisor as supervisor;

#[cfg(feature = "observability")]
pub use b5dc_observability as observability;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{load_config, validate_config, DeviceEndpoint, ProxyConfig};
    pub use crate::device::sim::SimulatedDevice;
    pub use crate::device::{B5dcFrequency, DeviceDriver, PllState, SensorValue};
    pub use crate::supervisor::{
        B5dcComponentManager, CommunicationStatus, StateEvent, StateObserver, StateValue,
        TaskStatus, TaskUpdate,
    };
}
