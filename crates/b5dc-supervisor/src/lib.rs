// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # b5dc-supervisor
//!
//! The B5DC proxy core. It keeps a session with the band 5 down converter
//! alive, keeps a published view of its sensor registers converged with the
//! device, and runs attenuation/frequency commands.
//!
//! ## Architecture
//!
//! ```text
//! B5dcComponentManager
//!   ├── ConnectionSupervisor   (session lifecycle, reconnect loop)
//!   │     └── SensorSynchronizer::poll_forever   (cancellable child task)
//!   ├── SensorSynchronizer     (register lock, refresh_one, poll passes)
//!   ├── CommandExecutor        (single worker, progress callbacks)
//!   ├── StatePublisher         (published state, StateEvent observer)
//!   └── DeviceHandle           (current session's facade, swapped on reconnect)
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod build_state;
pub mod component_manager;
pub mod device_handle;
pub mod error;
pub mod executor;
pub mod runtime;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod synchronizer;

pub use build_state::BuildState;
pub use component_manager::{B5dcComponentManager, ManagerSettings};
pub use device_handle::{ActiveDevice, DeviceHandle};
pub use error::{SupervisorError, SupervisorResult};
pub use executor::{CommandExecutor, TaskCallback, TaskStatus, TaskUpdate};
pub use state::{CommunicationStatus, EventChannel, StateEvent, StateObserver, StatePublisher, StateValue};
pub use supervisor::{ConnectionSupervisor, SupervisorPhase};
pub use synchronizer::{PassReport, SensorSynchronizer, SyncOutcome};
