// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end: configuration file -> component manager -> simulated B5DC
//!
//! Exercises the whole stack the way the `b5dc_sim_proxy` tool does, with
//! timings shortened so the test finishes quickly.

use b5dc_proxy::config::{load_config, validate_config, RetryPassPolicy};
use b5dc_proxy::device::register_map::{
    FREQUENCY_REGISTER, H_ATTENUATION_REGISTER, REGISTER_MAP, V_ATTENUATION_REGISTER,
};
use b5dc_proxy::prelude::*;
use b5dc_proxy::supervisor::{BuildState, TaskCallback};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const TEST_CONFIG: &str = r#"
[device]
endpoint = "127.0.0.1:10001"
retry_delay_secs = 0.1

[polling]
sensor_update_period_secs = 0.05
retry_policy = "skip_register"

[logging]
level = "debug"
"#;

fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("b5dc_configuration.toml");
    fs::write(&path, TEST_CONFIG).unwrap();
    path
}

async fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[test]
fn test_config_file_with_cli_overrides() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir);

    let mut overrides = HashMap::new();
    overrides.insert("retry_policy".to_string(), "abort_pass".to_string());
    let config = load_config(Some(&path), Some(&overrides)).unwrap();
    validate_config(&config).unwrap();

    assert_eq!(config.device.retry_delay(), Duration::from_millis(100));
    assert_eq!(config.polling.sensor_update_period(), Duration::from_millis(50));
    assert_eq!(config.polling.retry_policy, RetryPassPolicy::AbortPass);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_proxy_session_lifecycle() {
    let dir = TempDir::new().unwrap();
    let config = load_config(Some(&write_config(&dir)), None).unwrap();
    validate_config(&config).unwrap();

    let device = SimulatedDevice::new();
    let (tx, events) = crossbeam::channel::unbounded::<StateEvent>();
    let manager =
        B5dcComponentManager::from_config(&config, Arc::new(device.clone()), Some(Arc::new(tx)))
            .unwrap();

    manager.start_communicating();
    assert!(
        wait_until(Duration::from_secs(3), || {
            manager.communication_state() == CommunicationStatus::Established
                && device.access_count() >= REGISTER_MAP.len()
        })
        .await
    );

    // Build record names the device and its address
    let build: BuildState = serde_json::from_str(&manager.build_state()).unwrap();
    assert_eq!(build.device, "ska-mid-b5dc");
    assert_eq!(build.device_ip, "127.0.0.1");

    // Frequency command is reflected by the next poll pass
    let (updates_tx, updates) = crossbeam::channel::unbounded();
    let callback: TaskCallback = Arc::new(move |update| {
        let _ = updates_tx.send(update);
    });
    assert_eq!(
        manager.set_frequency(3, Some(callback)).0,
        TaskStatus::Queued
    );
    let last = loop {
        let update = updates.recv_timeout(Duration::from_secs(3)).unwrap();
        if update.result.is_some() {
            break update;
        }
    };
    assert_eq!(last.status, TaskStatus::Completed);
    assert_eq!(
        last.result.as_deref(),
        Some("SetFrequency(B5dcFrequency.F_13_86_GHZ) completed")
    );
    assert!(
        wait_until(Duration::from_secs(3), || {
            manager.sensor_value(FREQUENCY_REGISTER) == Some(SensorValue::Float(13.86))
        })
        .await
    );

    // Out-of-range attenuation fails without disturbing the register
    let (updates_tx, updates) = crossbeam::channel::unbounded();
    let callback: TaskCallback = Arc::new(move |update| {
        let _ = updates_tx.send(update);
    });
    manager.set_attenuation(40, V_ATTENUATION_REGISTER, Some(callback));
    let last = loop {
        let update = updates.recv_timeout(Duration::from_secs(3)).unwrap();
        if update.result.is_some() {
            break update;
        }
    };
    assert_eq!(last.status, TaskStatus::Failed);
    assert_eq!(device.register(V_ATTENUATION_REGISTER), Some(10));

    // Lost session is re-established with the same published table
    assert!(device.drop_connection());
    assert!(
        wait_until(Duration::from_secs(3), || device.sessions_opened() == 2
            && manager.is_connection_established())
        .await
    );
    device.set_register(H_ATTENUATION_REGISTER, 5);
    assert_eq!(
        manager.read_sensor_async(H_ATTENUATION_REGISTER).await,
        Some(StateValue::Sensor(SensorValue::Float(5.0)))
    );

    manager.stop_communicating();
    tokio::time::timeout(Duration::from_secs(3), manager.wait_for_supervisor())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(manager.communication_state(), CommunicationStatus::Disabled);

    let keys: Vec<&str> = manager
        .state_snapshot()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(keys.len(), REGISTER_MAP.len() + 2);
    assert!(keys.contains(&"connectionstate"));
    assert!(keys.contains(&"buildstate"));
    assert!(events.try_iter().count() > REGISTER_MAP.len());
}
