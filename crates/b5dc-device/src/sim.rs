// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-process B5DC simulator
//!
//! [`SimulatedDevice`] is a register bank plus a [`DeviceDriver`]. Each
//! session's link holds the connected UDP socket for its lifetime while
//! register traffic is served from the bank. Faults (timeouts, latency,
//! connection loss) are injected through the device handle, and every
//! register access is counted so tests can check serialization.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::register_map::{FREQUENCY_REGISTER, REGISTER_MAP};
use crate::{
    connection_lost_pair, B5dcFrequency, BuildInfo, BuildInfoReader, ConnectionLostNotifier,
    DeviceDriver, DeviceError, DeviceResult, RegisterLink,
};

const DEFAULT_ERROR_COUNT_THRESHOLD: u32 = 2;

struct SimState {
    registers: Mutex<HashMap<String, i64>>,
    pending_timeouts: Mutex<HashMap<String, u32>>,
    access_delay: Mutex<Duration>,
    build_info: Mutex<Option<BuildInfo>>,
    error_count_threshold: AtomicUsize,
    current_session: Mutex<Option<ConnectionLostNotifier>>,
    sessions_opened: AtomicUsize,
    access_count: AtomicUsize,
    per_register_reads: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Handle to a simulated device; clones share the same device
#[derive(Clone)]
pub struct SimulatedDevice {
    state: Arc<SimState>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDevice {
    /// A locked device at 11.1 GHz with plausible analog readings
    pub fn new() -> Self {
        let mut registers: HashMap<String, i64> = REGISTER_MAP
            .iter()
            .map(|entry| (entry.register.to_string(), 0))
            .collect();
        for (register, raw) in [
            (FREQUENCY_REGISTER, B5dcFrequency::F11_1Ghz.value()),
            ("spi_rfcm_pll_lock", 1),
            ("spi_rfcm_h_attenuation", 10),
            ("spi_rfcm_v_attenuation", 10),
            ("spi_rfcm_photo_diode_ain0", 152),
            ("spi_rfcm_rf_in_h_ain1", -2540),
            ("spi_rfcm_rf_in_v_ain2", -2610),
            ("spi_rfcm_if_out_h_ain3", -1275),
            ("spi_rfcm_if_out_v_ain4", -1302),
            ("spi_rfcm_rf_temp_ain5", 3875),
            ("spi_rfcm_psu_pcb_temp_ain7", 4120),
        ] {
            registers.insert(register.to_string(), raw);
        }

        let build_info = BuildInfo {
            device_version: "1.0.0".to_string(),
            comms_engine_version: "2.1.0".to_string(),
            rfcm_psu_version: "1.2".to_string(),
            rfcm_pcb_version: "3.0".to_string(),
            backplane_version: "1.1".to_string(),
            psu_version: "1.0".to_string(),
            icd_version: "0.4".to_string(),
            fpga_model_name: "b5dc_rfcm".to_string(),
            fpga_build_time: "2024-06-12T09-30-00".to_string(),
        };

        Self {
            state: Arc::new(SimState {
                registers: Mutex::new(registers),
                pending_timeouts: Mutex::new(HashMap::new()),
                access_delay: Mutex::new(Duration::ZERO),
                build_info: Mutex::new(Some(build_info)),
                error_count_threshold: AtomicUsize::new(DEFAULT_ERROR_COUNT_THRESHOLD as usize),
                current_session: Mutex::new(None),
                sessions_opened: AtomicUsize::new(0),
                access_count: AtomicUsize::new(0),
                per_register_reads: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Simulate a device-side change of a register
    pub fn set_register(&self, register: &str, raw: i64) {
        self.state
            .registers
            .lock()
            .insert(register.to_string(), raw);
    }

    pub fn register(&self, register: &str) -> Option<i64> {
        self.state.registers.lock().get(register).copied()
    }

    /// Make the next `count` reads of `register` time out
    pub fn fail_reads(&self, register: &str, count: u32) {
        self.state
            .pending_timeouts
            .lock()
            .insert(register.to_string(), count);
    }

    /// Latency added to every register access
    pub fn set_access_delay(&self, delay: Duration) {
        *self.state.access_delay.lock() = delay;
    }

    /// `None` makes build metadata reads fail
    pub fn set_build_info(&self, build_info: Option<BuildInfo>) {
        *self.state.build_info.lock() = build_info;
    }

    pub fn set_error_count_threshold(&self, threshold: u32) {
        self.state
            .error_count_threshold
            .store(threshold as usize, Ordering::SeqCst);
    }

    /// Fire the current session's connection-lost signal
    ///
    /// Returns `false` if there is no live session.
    pub fn drop_connection(&self) -> bool {
        let session = self.state.current_session.lock().take();
        match session {
            Some(lost) => {
                info!(target: "b5dc-device", "Simulated B5DC dropping connection");
                lost.notify()
            }
            None => false,
        }
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    /// Total register reads and writes served (including injected timeouts)
    pub fn access_count(&self) -> usize {
        self.state.access_count.load(Ordering::SeqCst)
    }

    pub fn read_count(&self, register: &str) -> usize {
        self.state
            .per_register_reads
            .lock()
            .get(register)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of register accesses observed in progress at once
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.state.access_count.store(0, Ordering::SeqCst);
        self.state.max_in_flight.store(0, Ordering::SeqCst);
        self.state.per_register_reads.lock().clear();
    }

    /// A link on this device that is not tied to any socket or session
    pub fn detached_link(&self) -> Arc<dyn RegisterLink> {
        let (lost, _) = connection_lost_pair();
        Arc::new(SimulatedLink {
            state: Arc::clone(&self.state),
            lost,
            _socket: None,
        })
    }
}

impl DeviceDriver for SimulatedDevice {
    fn open_link(
        &self,
        socket: Arc<UdpSocket>,
        lost: ConnectionLostNotifier,
    ) -> Arc<dyn RegisterLink> {
        let session = self.state.sessions_opened.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(target: "b5dc-device", "Simulated B5DC session {} opened", session);
        *self.state.current_session.lock() = Some(lost.clone());
        Arc::new(SimulatedLink {
            state: Arc::clone(&self.state),
            lost,
            _socket: Some(socket),
        })
    }

    fn build_info_reader(
        &self,
        link: Arc<dyn RegisterLink>,
    ) -> Option<Arc<dyn BuildInfoReader>> {
        Some(Arc::new(SimulatedBuildInfoReader {
            state: Arc::clone(&self.state),
            link,
        }))
    }
}

/// Tracks one register access for the counters
struct AccessGuard<'a> {
    state: &'a SimState,
}

impl<'a> AccessGuard<'a> {
    fn begin(state: &'a SimState) -> Self {
        state.access_count.fetch_add(1, Ordering::SeqCst);
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { state }
    }
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct SimulatedLink {
    state: Arc<SimState>,
    lost: ConnectionLostNotifier,
    _socket: Option<Arc<UdpSocket>>,
}

impl SimulatedLink {
    fn ensure_open(&self) -> DeviceResult<()> {
        if self.lost.is_notified() {
            Err(DeviceError::Link("session closed".to_string()))
        } else {
            Ok(())
        }
    }

    async fn simulate_latency(&self) {
        let delay = *self.state.access_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RegisterLink for SimulatedLink {
    async fn read_register(&self, register: &str) -> DeviceResult<i64> {
        self.ensure_open()?;
        let _access = AccessGuard::begin(&self.state);
        *self
            .state
            .per_register_reads
            .lock()
            .entry(register.to_string())
            .or_insert(0) += 1;

        self.simulate_latency().await;

        {
            let mut pending = self.state.pending_timeouts.lock();
            if let Some(remaining) = pending.get_mut(register) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DeviceError::Timeout {
                        register: register.to_string(),
                    });
                }
            }
        }

        self.state
            .registers
            .lock()
            .get(register)
            .copied()
            .ok_or_else(|| DeviceError::UnknownRegister(register.to_string()))
    }

    async fn write_register(&self, register: &str, value: i64) -> DeviceResult<()> {
        self.ensure_open()?;
        let _access = AccessGuard::begin(&self.state);

        self.simulate_latency().await;

        if register == FREQUENCY_REGISTER && B5dcFrequency::try_from(value).is_err() {
            return Err(DeviceError::Frequency(format!(
                "Frequency selector {} rejected by device",
                value
            )));
        }

        let mut registers = self.state.registers.lock();
        match registers.get_mut(register) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(DeviceError::UnknownRegister(register.to_string())),
        }
    }

    fn connection_established(&self) -> bool {
        !self.lost.is_notified()
    }

    fn error_count_threshold(&self) -> u32 {
        self.state.error_count_threshold.load(Ordering::SeqCst) as u32
    }
}

struct SimulatedBuildInfoReader {
    state: Arc<SimState>,
    link: Arc<dyn RegisterLink>,
}

#[async_trait]
impl BuildInfoReader for SimulatedBuildInfoReader {
    async fn read_build_info(&self) -> DeviceResult<BuildInfo> {
        if !self.link.connection_established() {
            return Err(DeviceError::Link("session closed".to_string()));
        }
        self.state
            .build_info
            .lock()
            .clone()
            .ok_or_else(|| DeviceError::Link("build metadata unavailable".to_string()))
    }
}
