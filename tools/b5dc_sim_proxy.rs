// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
B5DC Simulated Proxy

Runs the component manager against an in-process simulated B5DC and prints
every published state change. The simulated server can drop its connection
periodically to exercise reconnection.

Usage:
  cargo run --bin b5dc_sim_proxy -- [--config b5dc_configuration.toml] [--duration-secs 30]

Example:
  cargo run --bin b5dc_sim_proxy -- --duration-secs 20 --drop-every-secs 5 --set log_level=debug --debug-b5dc-supervisor

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use anyhow::{anyhow, Context, Result};
use b5dc_proxy::config::{load_config, validate_config};
use b5dc_proxy::device::register_map::{H_ATTENUATION_REGISTER, PLL_LOCK_REGISTER};
use b5dc_proxy::device::sim::SimulatedDevice;
use b5dc_proxy::observability::{debug_flags_help, init_logging, parse_debug_flags};
use b5dc_proxy::supervisor::{B5dcComponentManager, StateEvent, TaskCallback};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "b5dc_sim_proxy",
    about = "Run the B5DC proxy against a simulated device",
    after_help = debug_flags_help()
)]
struct Cli {
    /// Configuration file (defaults to b5dc_configuration.toml discovery)
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long to run before stopping
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,

    /// Drop the simulated connection this often (0 disables)
    #[arg(long, default_value_t = 0)]
    drop_every_secs: u64,

    /// Override a configuration key, e.g. `--set endpoint=127.0.0.1:10001`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

fn parse_overrides(overrides: &[String]) -> Result<HashMap<String, String>> {
    overrides
        .iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| anyhow!("Override '{}' is not KEY=VALUE", entry))
        })
        .collect()
}

fn print_event(event: &StateEvent) {
    match event {
        StateEvent::SensorUpdated { register, value } => {
            println!("   📈 {:<28} {}", register, value);
        }
        StateEvent::ConnectivityChanged { status } => {
            println!("   🔌 {:<28} {}", event.key(), status);
        }
        StateEvent::BuildInfoUpdated { record } => {
            println!("   🏷️  {}:\n{}", event.key(), record);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Debug flags are handled by b5dc-observability, not clap
    let cli = Cli::parse_from(std::env::args().filter(|arg| !arg.starts_with("--debug-")));

    let overrides = parse_overrides(&cli.overrides)?;
    let config = load_config(cli.config.as_deref(), Some(&overrides))
        .context("Failed to load configuration")?;
    validate_config(&config).context("Invalid configuration")?;

    let _logging = init_logging(
        &parse_debug_flags(),
        &config.logging.level,
        config.logging.log_dir.clone(),
        Some(config.logging.retention_runs),
    )?;

    println!("📡 B5DC Simulated Proxy");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   Endpoint:      {}", config.device.endpoint);
    println!("   Poll period:   {:?}", config.polling.sensor_update_period());
    println!("   Retry delay:   {:?}", config.device.retry_delay());
    println!("   Retry policy:  {:?}", config.polling.retry_policy);
    println!();

    let device = SimulatedDevice::new();
    let (events_tx, events_rx) = crossbeam::channel::unbounded::<StateEvent>();
    let manager = B5dcComponentManager::from_config(
        &config,
        Arc::new(device.clone()),
        Some(Arc::new(events_tx)),
    )?;

    // Printer runs on its own thread; it ends when the manager drops the sender
    let printer = std::thread::spawn(move || {
        for event in events_rx {
            print_event(&event);
        }
    });

    manager.start_communicating();

    let mut drop_timer = (cli.drop_every_secs > 0)
        .then(|| tokio::time::interval(Duration::from_secs(cli.drop_every_secs)));
    if let Some(timer) = drop_timer.as_mut() {
        // First tick completes immediately
        timer.tick().await;
    }

    let deadline = tokio::time::sleep(Duration::from_secs(cli.duration_secs));
    tokio::pin!(deadline);
    let mut demo_command_sent = false;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!(target: "b5dc-proxy", "Interrupted, stopping");
                break;
            }
            _ = async {
                match drop_timer.as_mut() {
                    Some(timer) => { timer.tick().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                if device.drop_connection() {
                    println!("   ✂️  simulated connection dropped");
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(500)), if !demo_command_sent => {
                if manager.is_connection_established() {
                    let callback: TaskCallback = Arc::new(|update| {
                        println!(
                            "   ⚙️  SetAttenuation {} {}",
                            update.status,
                            update.result.or(update.progress).unwrap_or_default()
                        );
                    });
                    let (status, message) =
                        manager.set_attenuation(12, H_ATTENUATION_REGISTER, Some(callback));
                    println!("   ⚙️  SetAttenuation submitted: {} ({})", status, message);
                    demo_command_sent = true;
                }
            }
        }
    }

    println!();
    println!("   PLL lock on exit: {:?}", manager.read_sensor_async(PLL_LOCK_REGISTER).await);
    println!("   Sessions opened:  {}", device.sessions_opened());

    manager.stop_communicating();
    manager
        .wait_for_supervisor()
        .await
        .context("B5DC supervisor ended with an error")?;
    println!("   🔌 Communication state: {}", manager.communication_state());

    drop(manager);
    printer
        .join()
        .map_err(|_| anyhow!("Event printer thread panicked"))?;

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Done");
    Ok(())
}
