// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! B5DC component manager
//!
//! Wires the connection supervisor, sensor synchronizer, command executor and
//! state publisher together and exposes the operation surface used by a
//! front-facing adapter. Reads and refreshes are blocking from the caller's
//! point of view (async variants exist for callers already on a runtime);
//! commands never block.

use b5dc_config::{DeviceEndpoint, ProxyConfig, RetryPassPolicy};
use b5dc_device::register_map::{BUILD_STATE_KEY, CONNECTION_STATE_KEY};
use b5dc_device::{DeviceDriver, SensorValue};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::device_handle::DeviceHandle;
use crate::executor::{CommandExecutor, TaskCallback, TaskStatus};
use crate::runtime::{ambient_multi_thread_handle, block_on_handle, create_runtime};
use crate::state::{CommunicationStatus, StateObserver, StatePublisher, StateValue};
use crate::supervisor::{ConnectionSupervisor, SupervisorPhase};
use crate::synchronizer::{SensorSynchronizer, SyncOutcome};
use crate::{SupervisorError, SupervisorResult};

/// Settings consumed once at construction
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub endpoint: DeviceEndpoint,
    pub sensor_update_period: Duration,
    pub retry_delay: Duration,
    pub retry_policy: RetryPassPolicy,
}

impl ManagerSettings {
    /// # Errors
    /// * `SupervisorError::InvalidConfig` - The endpoint is not `host:port`
    pub fn from_config(config: &ProxyConfig) -> SupervisorResult<Self> {
        Ok(Self {
            endpoint: DeviceEndpoint::parse(&config.device.endpoint)?,
            sensor_update_period: config.polling.sensor_update_period(),
            retry_delay: config.device.retry_delay(),
            retry_policy: config.polling.retry_policy,
        })
    }
}

struct RunningSupervisor {
    task: JoinHandle<SupervisorResult<()>>,
    shutdown: CancellationToken,
}

pub struct B5dcComponentManager {
    settings: ManagerSettings,
    driver: Arc<dyn DeviceDriver>,
    publisher: Arc<StatePublisher>,
    handle: Arc<DeviceHandle>,
    synchronizer: Arc<SensorSynchronizer>,
    executor: CommandExecutor,
    phase: Arc<Mutex<SupervisorPhase>>,
    supervisor: Mutex<Option<RunningSupervisor>>,
    rt_handle: Handle,
    // Only set when no runtime was running at construction
    runtime: Option<Runtime>,
}

impl B5dcComponentManager {
    /// Build from a loaded configuration
    ///
    /// # Errors
    /// * `SupervisorError::InvalidConfig` - Malformed endpoint
    /// * `SupervisorError::Transport` - Own runtime could not be created
    pub fn from_config(
        config: &ProxyConfig,
        driver: Arc<dyn DeviceDriver>,
        observer: Option<Arc<dyn StateObserver>>,
    ) -> SupervisorResult<Self> {
        Self::new(ManagerSettings::from_config(config)?, driver, observer)
    }

    /// Tasks run on the ambient runtime when called inside a multi-threaded
    /// one; otherwise (no runtime, or a current-thread runtime) the manager
    /// owns a runtime of its own.
    ///
    /// # Errors
    /// * `SupervisorError::Transport` - Own runtime could not be created
    pub fn new(
        settings: ManagerSettings,
        driver: Arc<dyn DeviceDriver>,
        observer: Option<Arc<dyn StateObserver>>,
    ) -> SupervisorResult<Self> {
        let (runtime, rt_handle) = match ambient_multi_thread_handle() {
            Some(handle) => (None, handle),
            None => {
                let runtime = create_runtime()?;
                let handle = runtime.handle().clone();
                (Some(runtime), handle)
            }
        };

        let publisher = Arc::new(StatePublisher::new(observer));
        let handle = Arc::new(DeviceHandle::new());
        let synchronizer = Arc::new(SensorSynchronizer::new(
            Arc::clone(&handle),
            Arc::clone(&publisher),
            settings.sensor_update_period,
            settings.retry_policy,
        ));
        let executor = CommandExecutor::spawn(&rt_handle, Arc::clone(&handle));

        Ok(Self {
            settings,
            driver,
            publisher,
            handle,
            synchronizer,
            executor,
            phase: Arc::new(Mutex::new(SupervisorPhase::Stopped)),
            supervisor: Mutex::new(None),
            rt_handle,
            runtime,
        })
    }

    /// Start the supervisory loop; returns immediately
    ///
    /// Calling it while a loop is still running (including one that is
    /// stopping) has no effect.
    pub fn start_communicating(&self) {
        let mut supervisor = self.supervisor.lock();
        if supervisor
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
        {
            debug!(target: "b5dc-supervisor", "Communication with B5DC device already started");
            return;
        }

        debug!(target: "b5dc-supervisor", "Starting communication with B5DC device");
        self.publisher
            .update_connectivity(CommunicationStatus::NotEstablished);

        let shutdown = CancellationToken::new();
        let connection_supervisor = Arc::new(ConnectionSupervisor::new(
            self.settings.endpoint.clone(),
            Arc::clone(&self.driver),
            Arc::clone(&self.handle),
            Arc::clone(&self.publisher),
            Arc::clone(&self.synchronizer),
            self.settings.retry_delay,
            shutdown.clone(),
            Arc::clone(&self.phase),
        ));
        let task = self.rt_handle.spawn(connection_supervisor.run());

        *supervisor = Some(RunningSupervisor { task, shutdown });
    }

    /// Ask the supervisory loop to stop
    ///
    /// Connectivity becomes `Disabled` once the loop has torn the session
    /// down; use [`B5dcComponentManager::wait_for_supervisor`] to wait for it.
    pub fn stop_communicating(&self) {
        if let Some(running) = self.supervisor.lock().as_ref() {
            info!(target: "b5dc-supervisor", "Stopping communication with B5DC device");
            running.shutdown.cancel();
        }
    }

    /// Wait for the supervisory loop to end and return its outcome
    ///
    /// The loop only ends after `stop_communicating` or on a fatal transport
    /// error. Returns `Ok(())` if it was never started.
    pub async fn wait_for_supervisor(&self) -> SupervisorResult<()> {
        let running = self.supervisor.lock().take();
        match running {
            Some(running) => running
                .task
                .await
                .map_err(|e| SupervisorError::Runtime(format!("Supervisor task failed: {}", e)))?,
            None => Ok(()),
        }
    }

    /// Facade-ready: a session and device facade currently exist
    pub fn is_connection_established(&self) -> bool {
        self.handle.is_ready()
    }

    pub fn communication_state(&self) -> CommunicationStatus {
        self.publisher.connectivity()
    }

    pub fn supervisor_phase(&self) -> SupervisorPhase {
        *self.phase.lock()
    }

    /// Refresh one register from the device, blocking the caller
    pub fn refresh_one(&self, register: &str) -> SyncOutcome {
        block_on_handle(&self.rt_handle, self.synchronizer.refresh_one(register))
    }

    pub async fn refresh_one_async(&self, register: &str) -> SyncOutcome {
        self.synchronizer.refresh_one(register).await
    }

    /// Attribute-style read: refresh the register, then read published state
    ///
    /// `connectionstate` and `buildstate` are read without a refresh. A
    /// register that never synced reads as its default value.
    pub fn read_sensor(&self, key: &str) -> Option<StateValue> {
        if key != CONNECTION_STATE_KEY && key != BUILD_STATE_KEY {
            self.refresh_one(key);
        }
        self.publisher.get(key)
    }

    pub async fn read_sensor_async(&self, key: &str) -> Option<StateValue> {
        if key != CONNECTION_STATE_KEY && key != BUILD_STATE_KEY {
            self.refresh_one_async(key).await;
        }
        self.publisher.get(key)
    }

    /// Published value of a register, without touching the device
    pub fn sensor_value(&self, register: &str) -> Option<SensorValue> {
        self.publisher.sensor(register)
    }

    pub fn build_state(&self) -> String {
        self.publisher.build_state()
    }

    pub fn state_snapshot(&self) -> Vec<(&'static str, StateValue)> {
        self.publisher.snapshot()
    }

    pub fn set_attenuation(
        &self,
        attenuation_db: i64,
        register: &str,
        callback: Option<TaskCallback>,
    ) -> (TaskStatus, String) {
        self.executor.set_attenuation(attenuation_db, register, callback)
    }

    pub fn set_frequency(
        &self,
        frequency: i64,
        callback: Option<TaskCallback>,
    ) -> (TaskStatus, String) {
        self.executor.set_frequency(frequency, callback)
    }

    pub fn abort_commands(&self) -> (TaskStatus, String) {
        self.executor.abort_commands()
    }
}

impl Drop for B5dcComponentManager {
    fn drop(&mut self) {
        if let Some(running) = self.supervisor.get_mut().take() {
            running.shutdown.cancel();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
