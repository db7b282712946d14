// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, ProxyConfig, RetryPassPolicy};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for when no explicit path is given
pub const CONFIG_FILE_NAME: &str = "b5dc_configuration.toml";

/// Find the B5DC proxy configuration file
///
/// Search order:
/// 1. `B5DC_CONFIG_PATH` environment variable
/// 2. Current working directory: `./b5dc_configuration.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("B5DC_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by B5DC_CONFIG_PATH not found: {}",
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "B5DC configuration file '{}' not found in any of these locations:\n{}\n\nSet B5DC_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML. Call
/// [`crate::validate_config`] afterwards to check value ranges.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<ProxyConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: ProxyConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `B5DC_ENDPOINT` -> `device.endpoint`
/// - `B5DC_RETRY_DELAY` -> `device.retry_delay_secs`
/// - `B5DC_SENSOR_UPDATE_PERIOD` -> `polling.sensor_update_period_secs`
/// - `B5DC_RETRY_POLICY` -> `polling.retry_policy`
/// - `B5DC_LOG_LEVEL` -> `logging.level`
/// - `B5DC_LOG_DIR` -> `logging.log_dir`
pub fn apply_environment_overrides(config: &mut ProxyConfig) {
    let overrides: HashMap<String, String> = [
        ("B5DC_ENDPOINT", "endpoint"),
        ("B5DC_RETRY_DELAY", "retry_delay"),
        ("B5DC_SENSOR_UPDATE_PERIOD", "sensor_update_period"),
        ("B5DC_RETRY_POLICY", "retry_policy"),
        ("B5DC_LOG_LEVEL", "log_level"),
    ]
    .iter()
    .filter_map(|(var, key)| env::var(var).ok().map(|value| (key.to_string(), value)))
    .collect();

    apply_cli_overrides(config, &overrides);

    if let Ok(value) = env::var("B5DC_LOG_DIR") {
        config.logging.log_dir = Some(PathBuf::from(value));
    }
}

/// Apply CLI argument overrides to configuration
///
/// Unparseable numeric values are ignored and leave the current value in place.
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"endpoint": "10.0.0.5:10001"}`)
pub fn apply_cli_overrides(config: &mut ProxyConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("endpoint") {
        config.device.endpoint = value.clone();
    }
    if let Some(value) = cli_args.get("retry_delay") {
        if let Ok(secs) = value.parse::<f64>() {
            config.device.retry_delay_secs = secs;
        }
    }
    if let Some(value) = cli_args.get("sensor_update_period") {
        if let Ok(secs) = value.parse::<f64>() {
            config.polling.sensor_update_period_secs = secs;
        }
    }
    if let Some(value) = cli_args.get("retry_policy") {
        if let Some(policy) = RetryPassPolicy::parse(value) {
            config.polling.retry_policy = policy;
        }
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("B5DC_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("B5DC_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("B5DC_CONFIG_PATH", "/definitely/not/here.toml");
        let result = find_config_file();
        env::remove_var("B5DC_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("B5DC_ENDPOINT");
        env::remove_var("B5DC_SENSOR_UPDATE_PERIOD");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[device]").unwrap();
        writeln!(file, "endpoint = \"10.1.2.3:10001\"").unwrap();
        writeln!(file, "[polling]").unwrap();
        writeln!(file, "sensor_update_period_secs = 2.0").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.device.endpoint, "10.1.2.3:10001");
        assert_eq!(config.polling.sensor_update_period_secs, 2.0);
        assert_eq!(config.device.retry_delay_secs, 5.0);
    }

    #[test]
    fn test_load_invalid_toml() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[device\nendpoint = ").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = ProxyConfig::default();

        env::set_var("B5DC_ENDPOINT", "192.168.1.100:10002");
        env::set_var("B5DC_SENSOR_UPDATE_PERIOD", "0.5");
        env::set_var("B5DC_RETRY_POLICY", "abort_pass");

        apply_environment_overrides(&mut config);

        env::remove_var("B5DC_ENDPOINT");
        env::remove_var("B5DC_SENSOR_UPDATE_PERIOD");
        env::remove_var("B5DC_RETRY_POLICY");

        assert_eq!(config.device.endpoint, "192.168.1.100:10002");
        assert_eq!(config.polling.sensor_update_period_secs, 0.5);
        assert_eq!(config.polling.retry_policy, RetryPassPolicy::AbortPass);
    }

    #[test]
    fn test_cli_overrides_ignore_unparseable_numbers() {
        let mut config = ProxyConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("endpoint".to_string(), "10.0.0.1:7777".to_string());
        cli_args.insert("retry_delay".to_string(), "soon".to_string());

        apply_cli_overrides(&mut config, &cli_args);

        assert_eq!(config.device.endpoint, "10.0.0.1:7777");
        assert_eq!(config.device.retry_delay_secs, 5.0);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[device]").unwrap();
        writeln!(file, "endpoint = \"file-host:1000\"").unwrap();
        writeln!(file, "retry_delay_secs = 1.0").unwrap();

        env::set_var("B5DC_ENDPOINT", "env-host:2000");
        env::set_var("B5DC_RETRY_DELAY", "3.0");

        let mut cli_args = HashMap::new();
        cli_args.insert("endpoint".to_string(), "cli-host:3000".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("B5DC_ENDPOINT");
        env::remove_var("B5DC_RETRY_DELAY");

        // CLI wins for endpoint, env wins for retry delay (no CLI override)
        assert_eq!(config.device.endpoint, "cli-host:3000");
        assert_eq!(config.device.retry_delay_secs, 3.0);
    }
}
