// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `b5dc_configuration.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub device: DeviceConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

/// B5DC server connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Remote B5DC server, `host:port`
    pub endpoint: String,
    /// Delay between a lost session and the next connection attempt (seconds)
    pub retry_delay_secs: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:10001".to_string(),
            retry_delay_secs: 5.0,
        }
    }
}

impl DeviceConfig {
    /// Saturates at `Duration::MAX` for values too large to represent
    pub fn retry_delay(&self) -> Duration {
        seconds_to_duration(self.retry_delay_secs)
    }
}

/// What a poll pass does once a register has exhausted its retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPassPolicy {
    /// Give up on that register for this pass and continue with the next one
    #[default]
    SkipRegister,
    /// Give up on the remainder of the pass
    AbortPass,
}

impl RetryPassPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "skip_register" | "skip" => Some(Self::SkipRegister),
            "abort_pass" | "abort" => Some(Self::AbortPass),
            _ => None,
        }
    }
}

/// Sensor polling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Sensor value polling period (seconds)
    pub sensor_update_period_secs: f64,
    pub retry_policy: RetryPassPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            sensor_update_period_secs: 10.0,
            retry_policy: RetryPassPolicy::SkipRegister,
        }
    }
}

impl PollingConfig {
    /// Saturates at `Duration::MAX` for values too large to represent
    pub fn sensor_update_period(&self) -> Duration {
        seconds_to_duration(self.sensor_update_period_secs)
    }
}

// Negative and NaN map to zero
fn seconds_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    pub level: String,
    /// Base directory for rolling JSON log files; console only when unset
    pub log_dir: Option<PathBuf>,
    /// Number of most recent run folders to keep under `log_dir`
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            retention_runs: 10,
        }
    }
}
