// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # b5dc-device
//!
//! Everything the proxy core consumes from the band 5 down converter side:
//!
//! - [`RegisterLink`]: get/set primitive keyed by register name, bound to one
//!   datagram session, with a liveness flag and a one-shot loss notification
//! - [`DeviceFacade`]: sensor snapshot plus attenuation/frequency mutators
//!   built on a register link ([`RegisterFacade`] is the stock implementation)
//! - [`BuildInfoReader`]: physical configuration and firmware identity
//! - [`DeviceDriver`]: builds the three above for every new session
//! - [`sim::SimulatedDevice`]: an in-process B5DC used by tests and the
//!   `b5dc_sim_proxy` tool

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod build_info;
pub mod connection;
pub mod error;
pub mod facade;
pub mod mappings;
pub mod register_map;
pub mod sim;
pub mod traits;

pub use build_info::BuildInfo;
pub use connection::{connection_lost_pair, ConnectionLost, ConnectionLostNotifier};
pub use error::{DeviceError, DeviceResult};
pub use facade::RegisterFacade;
pub use mappings::{B5dcFrequency, PllState, SensorValue};
pub use register_map::{RegisterEntry, SensorKind, REGISTER_MAP};
pub use traits::{BuildInfoReader, DeviceDriver, DeviceFacade, RegisterLink};
