// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures configuration values are within valid ranges before the proxy
//! starts talking to the device.

use crate::{ConfigError, ConfigResult, DeviceEndpoint, ProxyConfig};
use std::time::Duration;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "warning", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// All problems are collected and reported together.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &ProxyConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_device(config, &mut errors);
    validate_polling(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_device(config: &ProxyConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.device.endpoint.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "device.endpoint".to_string(),
        });
    } else if let Err(e) = DeviceEndpoint::parse(&config.device.endpoint) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "device.endpoint".to_string(),
            reason: e.to_string(),
        });
    }

    let delay = config.device.retry_delay_secs;
    if !delay.is_finite() || delay < 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "device.retry_delay_secs".to_string(),
            reason: format!("must be a non-negative number of seconds (got {})", delay),
        });
    } else {
        check_representable("device.retry_delay_secs", delay, errors);
    }
}

/// Reject second counts that do not fit in a `Duration`
fn check_representable(field: &str, secs: f64, errors: &mut Vec<ConfigValidationError>) {
    if let Err(e) = Duration::try_from_secs_f64(secs) {
        errors.push(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("{} seconds is out of range ({})", secs, e),
        });
    }
}

fn validate_polling(config: &ProxyConfig, errors: &mut Vec<ConfigValidationError>) {
    let period = config.polling.sensor_update_period_secs;
    if !period.is_finite() || period <= 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "polling.sensor_update_period_secs".to_string(),
            reason: format!("must be greater than 0 (got {})", period),
        });
    } else {
        check_representable("polling.sensor_update_period_secs", period, errors);
    }
}

fn validate_logging(config: &ProxyConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("'{}' is not one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        });
    }
}
