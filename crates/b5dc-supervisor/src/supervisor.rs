// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Connection supervision
//!
//! Keeps exactly one session with the B5DC server alive for the life of the
//! process. Each iteration connects, installs fresh device objects, publishes
//! the build record, starts the poller and then waits for the link's
//! connection-lost signal before tearing everything down and retrying.
//!
//! Only transport construction failures end the loop; session loss is always
//! retried, without limit.

use b5dc_config::DeviceEndpoint;
use b5dc_device::DeviceDriver;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::build_state::BuildState;
use crate::device_handle::DeviceHandle;
use crate::session::Session;
use crate::state::{CommunicationStatus, StatePublisher};
use crate::synchronizer::SensorSynchronizer;
use crate::SupervisorResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    Connecting,
    Established,
    RetryWait,
    Stopped,
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SupervisorPhase::Connecting => "CONNECTING",
            SupervisorPhase::Established => "ESTABLISHED",
            SupervisorPhase::RetryWait => "RETRY_WAIT",
            SupervisorPhase::Stopped => "STOPPED",
        })
    }
}

enum SessionEnd {
    Lost,
    Shutdown,
}

pub struct ConnectionSupervisor {
    endpoint: DeviceEndpoint,
    driver: Arc<dyn DeviceDriver>,
    handle: Arc<DeviceHandle>,
    publisher: Arc<StatePublisher>,
    synchronizer: Arc<SensorSynchronizer>,
    retry_delay: Duration,
    shutdown: CancellationToken,
    phase: Arc<Mutex<SupervisorPhase>>,
}

impl ConnectionSupervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        endpoint: DeviceEndpoint,
        driver: Arc<dyn DeviceDriver>,
        handle: Arc<DeviceHandle>,
        publisher: Arc<StatePublisher>,
        synchronizer: Arc<SensorSynchronizer>,
        retry_delay: Duration,
        shutdown: CancellationToken,
        phase: Arc<Mutex<SupervisorPhase>>,
    ) -> Self {
        Self {
            endpoint,
            driver,
            handle,
            publisher,
            synchronizer,
            retry_delay,
            shutdown,
            phase,
        }
    }

    fn set_phase(&self, phase: SupervisorPhase) {
        debug!(target: "b5dc-supervisor", "Supervisor phase -> {}", phase);
        *self.phase.lock() = phase;
    }

    /// Run until `shutdown` is cancelled
    ///
    /// # Errors
    /// * `SupervisorError::Transport` - The configured endpoint could not be
    ///   resolved, bound or connected
    pub async fn run(self: Arc<Self>) -> SupervisorResult<()> {
        loop {
            self.set_phase(SupervisorPhase::Connecting);
            let mut session = match Session::establish(&self.endpoint, self.driver.as_ref()).await
            {
                Ok(session) => session,
                Err(e) => {
                    error!(
                        target: "b5dc-supervisor",
                        "Failed to create B5dc server connection to {}: {}",
                        self.endpoint,
                        e
                    );
                    self.set_phase(SupervisorPhase::Stopped);
                    return Err(e);
                }
            };
            info!(
                target: "b5dc-supervisor",
                "B5dc server session opened with {}",
                session.remote_addr()
            );

            let link = session.link();
            let facade = self.driver.build_facade(Arc::clone(&link));
            self.refresh_build_state(&session).await;

            let active = self.handle.install(facade, link);
            self.set_phase(SupervisorPhase::Established);

            let poll_cancel = self.shutdown.child_token();
            let poller = tokio::spawn(
                Arc::clone(&self.synchronizer).poll_forever(active, poll_cancel.clone()),
            );

            let end = tokio::select! {
                _ = session.connection_lost() => SessionEnd::Lost,
                _ = self.shutdown.cancelled() => SessionEnd::Shutdown,
            };

            poll_cancel.cancel();
            self.handle.clear();

            match end {
                SessionEnd::Lost => {
                    self.publisher
                        .update_connectivity(CommunicationStatus::NotEstablished);
                    warn!(target: "b5dc-supervisor", "Reestablishing lost B5dc server connection");
                }
                SessionEnd::Shutdown => {
                    self.publisher.update_connectivity(CommunicationStatus::Disabled);
                }
            }

            if let Err(e) = poller.await {
                error!(target: "b5dc-supervisor", "Sensor polling task failed: {}", e);
            }
            session.close();

            if matches!(end, SessionEnd::Shutdown) {
                self.set_phase(SupervisorPhase::Stopped);
                info!(target: "b5dc-supervisor", "B5dc communication stopped");
                return Ok(());
            }

            self.set_phase(SupervisorPhase::RetryWait);
            tokio::select! {
                _ = tokio::time::sleep(self.retry_delay) => {}
                _ = self.shutdown.cancelled() => {
                    self.publisher.update_connectivity(CommunicationStatus::Disabled);
                    self.set_phase(SupervisorPhase::Stopped);
                    return Ok(());
                }
            }
        }
    }

    /// Fetch build metadata once per session; degraded record on failure
    async fn refresh_build_state(&self, session: &Session) {
        let record = match self.driver.build_info_reader(session.link()) {
            Some(reader) => match reader.read_build_info().await {
                Ok(info) => BuildState::from_build_info(&self.endpoint.host, &info),
                Err(e) => {
                    warn!(
                        target: "b5dc-supervisor",
                        "Build state was not updated successfully: {}",
                        e
                    );
                    BuildState::degraded()
                }
            },
            None => {
                warn!(target: "b5dc-supervisor", "Build state was not updated successfully.");
                BuildState::degraded()
            }
        };

        match record.to_json() {
            Ok(json) => {
                debug!(target: "b5dc-supervisor", "Build state updated: [{}]", json);
                self.publisher.update_build_state(json);
            }
            Err(e) => error!(target: "b5dc-supervisor", "Failed to serialize build state: {}", e),
        }
    }
}
