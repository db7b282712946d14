// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor synchronization
//!
//! Two paths refresh published sensor values: the periodic poll pass over the
//! whole register map, and single-register refreshes requested by readers.
//! Both take the same register lock for exactly one register access, so no
//! two register accesses ever overlap.

use b5dc_config::RetryPassPolicy;
use b5dc_device::register_map::{self, RegisterEntry, REGISTER_MAP};
use b5dc_device::{DeviceError, SensorValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::device_handle::{ActiveDevice, DeviceHandle};
use crate::state::{CommunicationStatus, StatePublisher};

/// Result of one register refresh
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Value read and published
    Updated(SensorValue),
    /// Facade-ready not set; nothing was touched
    NotReady,
    UnknownRegister,
    Timeout,
    /// The session was replaced or lost while the access was in flight
    SessionGone,
    Failed(DeviceError),
}

/// Summary of one poll pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub updated: usize,
    /// Registers whose every attempt timed out
    pub exhausted: Vec<&'static str>,
    /// Pass ended early under [`RetryPassPolicy::AbortPass`]
    pub aborted: bool,
    pub cancelled: bool,
}

pub struct SensorSynchronizer {
    handle: Arc<DeviceHandle>,
    publisher: Arc<StatePublisher>,
    register_lock: Mutex<()>,
    period: Duration,
    policy: RetryPassPolicy,
}

impl SensorSynchronizer {
    pub fn new(
        handle: Arc<DeviceHandle>,
        publisher: Arc<StatePublisher>,
        period: Duration,
        policy: RetryPassPolicy,
    ) -> Self {
        Self {
            handle,
            publisher,
            register_lock: Mutex::new(()),
            period,
            policy,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Refresh one register and publish its value
    ///
    /// A no-op (with a warning) while facade-ready is not set. Failures are
    /// logged and leave the published value untouched.
    pub async fn refresh_one(&self, register: &str) -> SyncOutcome {
        let Some(active) = self.handle.current() else {
            warn!(target: "b5dc-supervisor", "Connection not yet established or lost");
            return SyncOutcome::NotReady;
        };

        let Some(entry) = register_map::lookup(register) else {
            error!(
                target: "b5dc-supervisor",
                "Error on request to update unknown register: {}",
                register
            );
            return SyncOutcome::UnknownRegister;
        };

        self.sync_register(&active, entry, None).await
    }

    /// One register access under the register lock
    ///
    /// The session (and `cancel`, when given) is checked again once the lock
    /// is held, so a waiter never touches a link that was torn down while it
    /// queued.
    async fn sync_register(
        &self,
        active: &ActiveDevice,
        entry: &'static RegisterEntry,
        cancel: Option<&CancellationToken>,
    ) -> SyncOutcome {
        let result = {
            let _register_access = self.register_lock.lock().await;
            if cancel.is_some_and(CancellationToken::is_cancelled)
                || !self.handle.is_current(active.generation)
            {
                debug!(
                    target: "b5dc-supervisor",
                    "Skipping update of {}: session {} is gone",
                    entry.sensor,
                    active.generation
                );
                return SyncOutcome::SessionGone;
            }
            active.facade.update_sensor(entry.register).await
        };

        match result {
            Ok(()) => {}
            Err(DeviceError::UnknownRegister(_)) => {
                error!(
                    target: "b5dc-supervisor",
                    "Error on request to update unknown register: {}",
                    entry.register
                );
                return SyncOutcome::UnknownRegister;
            }
            Err(e) if e.is_timeout() => {
                error!(
                    target: "b5dc-supervisor",
                    "Protocol exception raised on request to update sensor: {}",
                    entry.sensor
                );
                return SyncOutcome::Timeout;
            }
            Err(e) => {
                error!(
                    target: "b5dc-supervisor",
                    "Failed to update sensor {}: {}",
                    entry.sensor,
                    e
                );
                return SyncOutcome::Failed(e);
            }
        }

        let Some(value) = active.facade.sensor_value(entry.register) else {
            return SyncOutcome::Failed(DeviceError::Link(format!(
                "No value cached for {} after update",
                entry.sensor
            )));
        };

        // Events go out when the batch drops, after the handle guard is released
        let mut batch = self.publisher.batch();
        let published = self.handle.publish_if_current(active.generation, || {
            batch.connectivity(CommunicationStatus::Established);
            batch.sensor(entry.register, value);
        });
        drop(batch);

        match published {
            Some(()) => SyncOutcome::Updated(value),
            None => SyncOutcome::SessionGone,
        }
    }

    /// One pass over the register map in map order
    ///
    /// Each register gets `error_count_threshold + 1` attempts against
    /// timeouts. `cancel` is checked before every register access, including
    /// after waiting for the register lock.
    pub async fn update_all_registers(
        &self,
        active: &ActiveDevice,
        cancel: &CancellationToken,
    ) -> PassReport {
        let max_attempts = active.link.error_count_threshold() + 1;
        let mut report = PassReport::default();

        for entry in REGISTER_MAP.iter() {
            let mut attempt = 0;
            let mut exhausted = false;

            loop {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    return report;
                }

                match self.sync_register(active, entry, Some(cancel)).await {
                    SyncOutcome::Updated(_) => {
                        report.updated += 1;
                        break;
                    }
                    SyncOutcome::Timeout => {
                        attempt += 1;
                        warn!(
                            target: "b5dc-supervisor",
                            "Timeout updating sensor {}. Retry attempt {}",
                            entry.sensor,
                            attempt
                        );
                        if attempt >= max_attempts {
                            warn!(
                                target: "b5dc-supervisor",
                                "Exceeded maximum retries for sensor update req: {}",
                                entry.sensor
                            );
                            exhausted = true;
                            break;
                        }
                    }
                    SyncOutcome::SessionGone => {
                        report.cancelled = true;
                        return report;
                    }
                    _ => break,
                }
            }

            if exhausted {
                report.exhausted.push(entry.register);
                if self.policy == RetryPassPolicy::AbortPass {
                    report.aborted = true;
                    return report;
                }
            }
        }

        report
    }

    /// Poll until cancelled: a pass, then one period of sleep, repeated
    ///
    /// Passes only run while `active` is still the installed session.
    pub async fn poll_forever(self: Arc<Self>, active: ActiveDevice, cancel: CancellationToken) {
        debug!(
            target: "b5dc-supervisor",
            "Sensor polling started for session {} (period {:?})",
            active.generation,
            self.period
        );

        while !cancel.is_cancelled() {
            if self.handle.is_current(active.generation) {
                let report = self.update_all_registers(&active, &cancel).await;
                debug!(target: "b5dc-supervisor", "Poll pass finished: {:?}", report);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.period) => {}
            }
        }

        debug!(
            target: "b5dc-supervisor",
            "Sensor polling stopped for session {}",
            active.generation
        );
    }
}
