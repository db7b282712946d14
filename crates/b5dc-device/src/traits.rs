// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Device-side contracts consumed by the proxy core

use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::UdpSocket;

use crate::{B5dcFrequency, BuildInfo, ConnectionLostNotifier, DeviceResult, SensorValue};

/// Register get/set primitive over one datagram session
///
/// Calls are not safe to interleave; callers serialize access.
#[async_trait]
pub trait RegisterLink: Send + Sync {
    /// Read a raw register value
    ///
    /// # Errors
    /// * `DeviceError::Timeout` - No answer after the link's internal retries
    /// * `DeviceError::Link` - The session is closed
    async fn read_register(&self, register: &str) -> DeviceResult<i64>;

    /// Write a raw register value
    async fn write_register(&self, register: &str, value: i64) -> DeviceResult<()>;

    /// Liveness flag; false once the link has signalled connection loss
    fn connection_established(&self) -> bool;

    /// Consecutive errors tolerated before the link reports failure
    ///
    /// Poll passes try each register `error_count_threshold() + 1` times.
    fn error_count_threshold(&self) -> u32;
}

/// Sensor snapshot and mutators for one session
#[async_trait]
pub trait DeviceFacade: Send + Sync {
    /// Refresh the cached value of one sensor from its register
    ///
    /// # Errors
    /// * `DeviceError::UnknownRegister` - Register is not in the register map
    /// * `DeviceError::Timeout` - Register link timed out
    async fn update_sensor(&self, register: &str) -> DeviceResult<()>;

    /// Most recently read value of a sensor, `None` if never read
    fn sensor_value(&self, register: &str) -> Option<SensorValue>;

    /// # Errors
    /// * `DeviceError::Attenuation` - Value outside `[0, 32)` or unknown register
    async fn set_attenuation(&self, attenuation_db: i64, register: &str) -> DeviceResult<()>;

    /// # Errors
    /// * `DeviceError::Frequency` - Device refused the frequency
    async fn set_frequency(&self, frequency: B5dcFrequency) -> DeviceResult<()>;
}

/// Physical configuration and firmware metadata accessor
#[async_trait]
pub trait BuildInfoReader: Send + Sync {
    async fn read_build_info(&self) -> DeviceResult<BuildInfo>;
}

/// Factory for the per-session device objects
pub trait DeviceDriver: Send + Sync {
    /// Create the register link for a freshly connected socket
    ///
    /// The link must fire `lost` when it decides the remote end is gone.
    fn open_link(
        &self,
        socket: Arc<UdpSocket>,
        lost: ConnectionLostNotifier,
    ) -> Arc<dyn RegisterLink>;

    fn build_facade(&self, link: Arc<dyn RegisterLink>) -> Arc<dyn DeviceFacade> {
        Arc::new(crate::RegisterFacade::new(link))
    }

    /// `None` when the device exposes no build metadata
    fn build_info_reader(&self, link: Arc<dyn RegisterLink>)
        -> Option<Arc<dyn BuildInfoReader>>;
}
