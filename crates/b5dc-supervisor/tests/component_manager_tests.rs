// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Component manager behaviour against the simulated B5DC
//!
//! Every test binds a real UDP socket on the loopback interface; register
//! traffic is served by the simulator.

use b5dc_config::{DeviceEndpoint, ProxyConfig, RetryPassPolicy};
use b5dc_device::register_map::{H_ATTENUATION_REGISTER, PLL_LOCK_REGISTER, REGISTER_MAP};
use b5dc_device::sim::SimulatedDevice;
use b5dc_device::{PllState, SensorValue};
use b5dc_supervisor::{
    B5dcComponentManager, BuildState, CommunicationStatus, ManagerSettings, StateEvent,
    StateValue, SupervisorError, SupervisorPhase, SyncOutcome, TaskCallback, TaskStatus,
    TaskUpdate,
};
use crossbeam::channel::{unbounded, Receiver};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn settings(period_ms: u64, retry_delay_ms: u64) -> ManagerSettings {
    ManagerSettings {
        endpoint: DeviceEndpoint::new("127.0.0.1", 10001),
        sensor_update_period: Duration::from_millis(period_ms),
        retry_delay: Duration::from_millis(retry_delay_ms),
        retry_policy: RetryPassPolicy::SkipRegister,
    }
}

fn manager_with_events(
    device: &SimulatedDevice,
    settings: ManagerSettings,
) -> (B5dcComponentManager, Receiver<StateEvent>) {
    let (tx, rx) = unbounded();
    let manager =
        B5dcComponentManager::new(settings, Arc::new(device.clone()), Some(Arc::new(tx)))
            .unwrap();
    (manager, rx)
}

async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

async fn settle<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation did not finish in time")
}

fn task_recorder() -> (TaskCallback, Receiver<TaskUpdate>) {
    let (tx, rx) = unbounded();
    let callback: TaskCallback = Arc::new(move |update| {
        let _ = tx.send(update);
    });
    (callback, rx)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_first_pass_converges_published_state() {
    let device = SimulatedDevice::new();
    let (manager, events) = manager_with_events(&device, settings(60_000, 100));

    assert_eq!(manager.communication_state(), CommunicationStatus::Disabled);
    manager.start_communicating();

    assert!(
        wait_until(Duration::from_secs(2), || {
            device.access_count() >= REGISTER_MAP.len()
                && manager.communication_state() == CommunicationStatus::Established
        })
        .await
    );
    // Allow the last publication of the pass to land
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        manager.sensor_value(PLL_LOCK_REGISTER),
        Some(SensorValue::PllLock(PllState::Locked))
    );
    assert_eq!(
        manager.sensor_value("spi_rfcm_rf_temp_ain5"),
        Some(SensorValue::Float(38.75))
    );
    assert_eq!(
        manager.sensor_value("spi_rfcm_frequency"),
        Some(SensorValue::Float(11.1))
    );
    assert_eq!(manager.supervisor_phase(), SupervisorPhase::Established);

    let received: Vec<StateEvent> = events.try_iter().collect();
    assert_eq!(
        received.first(),
        Some(&StateEvent::ConnectivityChanged {
            status: CommunicationStatus::NotEstablished
        })
    );
    let build_at = received
        .iter()
        .position(|e| matches!(e, StateEvent::BuildInfoUpdated { .. }))
        .unwrap();
    let established_at = received
        .iter()
        .position(|e| {
            *e == StateEvent::ConnectivityChanged {
                status: CommunicationStatus::Established,
            }
        })
        .unwrap();
    assert!(build_at < established_at);

    let build: BuildState = serde_json::from_str(&manager.build_state()).unwrap();
    assert_eq!(build.device_ip, "127.0.0.1");
    assert_eq!(build.fpga_firmware_file, "b5dc_rfcm_2024-06-12T09-30-00.fpg");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_degraded_build_state_does_not_block_connection() {
    let device = SimulatedDevice::new();
    device.set_build_info(None);
    let (manager, _events) = manager_with_events(&device, settings(60_000, 100));

    manager.start_communicating();
    assert!(wait_until(Duration::from_secs(2), || manager.is_connection_established()).await);

    let build: BuildState = serde_json::from_str(&manager.build_state()).unwrap();
    assert_eq!(build, BuildState::degraded());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refresh_before_connection_is_noop() {
    let device = SimulatedDevice::new();
    let (manager, events) = manager_with_events(&device, settings(60_000, 100));

    assert_eq!(manager.refresh_one(PLL_LOCK_REGISTER), SyncOutcome::NotReady);
    assert_eq!(
        manager.read_sensor(PLL_LOCK_REGISTER),
        Some(StateValue::Sensor(SensorValue::PllLock(PllState::NotLocked)))
    );
    assert_eq!(device.access_count(), 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_repeated_refresh_is_stable() {
    let device = SimulatedDevice::new();
    let (manager, events) = manager_with_events(&device, settings(60_000, 100));
    manager.start_communicating();
    assert!(wait_until(Duration::from_secs(2), || device.access_count() >= REGISTER_MAP.len()).await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    device.set_register(H_ATTENUATION_REGISTER, 17);
    let _ = events.try_iter().count();

    let first = manager.refresh_one_async(H_ATTENUATION_REGISTER).await;
    let second = manager.refresh_one_async(H_ATTENUATION_REGISTER).await;

    assert_eq!(first, SyncOutcome::Updated(SensorValue::Float(17.0)));
    assert_eq!(second, first);
    let updates: Vec<StateEvent> = events.try_iter().collect();
    assert_eq!(
        updates,
        vec![StateEvent::SensorUpdated {
            register: H_ATTENUATION_REGISTER,
            value: SensorValue::Float(17.0),
        }]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_set_attenuation_then_refresh_round_trip() {
    let device = SimulatedDevice::new();
    let (manager, _events) = manager_with_events(&device, settings(60_000, 100));

    let (callback, updates) = task_recorder();
    assert_eq!(
        manager.set_attenuation(31, H_ATTENUATION_REGISTER, Some(callback)),
        (TaskStatus::Rejected, "Command is not allowed".to_string())
    );
    assert!(updates.try_recv().is_err());

    manager.start_communicating();
    assert!(wait_until(Duration::from_secs(2), || manager.is_connection_established()).await);

    let (callback, updates) = task_recorder();
    assert_eq!(
        manager.set_attenuation(31, H_ATTENUATION_REGISTER, Some(callback)),
        (TaskStatus::Queued, "Task queued".to_string())
    );
    let statuses: Vec<TaskStatus> = (0..3)
        .map(|_| updates.recv_timeout(Duration::from_secs(2)).unwrap().status)
        .collect();
    assert_eq!(
        statuses,
        vec![TaskStatus::Queued, TaskStatus::InProgress, TaskStatus::Completed]
    );

    assert_eq!(
        manager.read_sensor_async(H_ATTENUATION_REGISTER).await,
        Some(StateValue::Sensor(SensorValue::Float(31.0)))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refreshes_and_poll_pass_never_overlap() {
    const REFRESHES: usize = 5;
    let device = SimulatedDevice::new();
    device.set_access_delay(Duration::from_millis(2));
    let (manager, _events) = manager_with_events(&device, settings(60_000, 100));
    let manager = Arc::new(manager);

    manager.start_communicating();
    assert!(wait_until(Duration::from_secs(2), || manager.is_connection_established()).await);

    let refreshes: Vec<_> = REGISTER_MAP
        .iter()
        .take(REFRESHES)
        .map(|entry| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.refresh_one_async(entry.register).await })
        })
        .collect();
    for refresh in refreshes {
        assert!(matches!(
            settle(refresh).await.unwrap(),
            SyncOutcome::Updated(_)
        ));
    }

    let expected = REFRESHES + REGISTER_MAP.len();
    assert!(wait_until(Duration::from_secs(2), || device.access_count() >= expected).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(device.access_count(), expected);
    assert_eq!(device.max_in_flight(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_loss_cancels_polling_and_reconnects() {
    let device = SimulatedDevice::new();
    let (manager, events) = manager_with_events(&device, settings(20, 300));

    manager.start_communicating();
    assert!(
        wait_until(Duration::from_secs(2), || {
            manager.communication_state() == CommunicationStatus::Established
        })
        .await
    );
    assert_eq!(device.sessions_opened(), 1);

    assert!(device.drop_connection());
    assert!(
        wait_until(Duration::from_secs(2), || {
            manager.communication_state() == CommunicationStatus::NotEstablished
        })
        .await
    );
    assert!(!manager.is_connection_established());
    assert_eq!(
        manager.refresh_one_async(PLL_LOCK_REGISTER).await,
        SyncOutcome::NotReady
    );

    // Poller is gone for the whole retry delay
    tokio::time::sleep(Duration::from_millis(30)).await;
    let accesses = device.access_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(device.access_count(), accesses);
    assert_eq!(manager.supervisor_phase(), SupervisorPhase::RetryWait);

    assert!(
        wait_until(Duration::from_secs(3), || {
            device.sessions_opened() == 2
                && manager.communication_state() == CommunicationStatus::Established
        })
        .await
    );
    assert!(device.access_count() > accesses);

    let connectivity: Vec<CommunicationStatus> = events
        .try_iter()
        .filter_map(|e| match e {
            StateEvent::ConnectivityChanged { status } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(
        connectivity,
        vec![
            CommunicationStatus::NotEstablished,
            CommunicationStatus::Established,
            CommunicationStatus::NotEstablished,
            CommunicationStatus::Established,
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_is_idempotent_and_stop_disables() {
    let device = SimulatedDevice::new();
    let (manager, _events) = manager_with_events(&device, settings(60_000, 100));

    manager.start_communicating();
    manager.start_communicating();
    assert!(wait_until(Duration::from_secs(2), || manager.is_connection_established()).await);
    assert_eq!(device.sessions_opened(), 1);

    manager.stop_communicating();
    settle(manager.wait_for_supervisor()).await.unwrap();

    assert_eq!(manager.communication_state(), CommunicationStatus::Disabled);
    assert_eq!(manager.supervisor_phase(), SupervisorPhase::Stopped);
    assert!(!manager.is_connection_established());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unusable_endpoint_is_fatal() {
    let device = SimulatedDevice::new();
    let mut settings = settings(60_000, 100);
    // Connecting a UDP socket to the broadcast address needs SO_BROADCAST
    settings.endpoint = DeviceEndpoint::new("255.255.255.255", 10001);
    let (manager, _events) = manager_with_events(&device, settings);

    manager.start_communicating();
    let result = settle(manager.wait_for_supervisor()).await;

    assert!(matches!(result, Err(SupervisorError::Transport(_))));
    assert_eq!(device.sessions_opened(), 0);
}

#[test]
fn test_malformed_endpoint_rejected_at_construction() {
    let mut config = ProxyConfig::default();
    config.device.endpoint = "b5dc-without-port".to_string();

    let result =
        B5dcComponentManager::from_config(&config, Arc::new(SimulatedDevice::new()), None);

    assert!(matches!(result, Err(SupervisorError::InvalidConfig(_))));
}

#[test]
fn test_blocking_surface_outside_runtime() {
    let device = SimulatedDevice::new();
    let manager =
        B5dcComponentManager::new(settings(60_000, 100), Arc::new(device.clone()), None).unwrap();

    manager.start_communicating();
    let deadline = Instant::now() + Duration::from_secs(2);
    while !manager.is_connection_established() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(manager.is_connection_established());

    device.set_register(PLL_LOCK_REGISTER, 2);
    assert_eq!(
        manager.read_sensor(PLL_LOCK_REGISTER),
        Some(StateValue::Sensor(SensorValue::PllLock(
            PllState::LockLossDetected
        )))
    );
}

#[tokio::test]
async fn test_blocking_surface_on_current_thread_runtime() {
    let device = SimulatedDevice::new();
    let (manager, _events) = manager_with_events(&device, settings(60_000, 100));

    manager.start_communicating();
    assert!(wait_until(Duration::from_secs(2), || manager.is_connection_established()).await);

    device.set_register(H_ATTENUATION_REGISTER, 7);
    assert_eq!(
        manager.read_sensor(H_ATTENUATION_REGISTER),
        Some(StateValue::Sensor(SensorValue::Float(7.0)))
    );
    assert_eq!(
        manager.refresh_one(H_ATTENUATION_REGISTER),
        SyncOutcome::Updated(SensorValue::Float(7.0))
    );

    manager.stop_communicating();
    settle(manager.wait_for_supervisor()).await.unwrap();
    assert_eq!(manager.communication_state(), CommunicationStatus::Disabled);
}
