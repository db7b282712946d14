// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use b5dc_config::ConfigError;

/// Errors that stop the proxy core
///
/// Register-level failures never show up here; they are absorbed by the
/// sensor synchronizer and the command executor.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// Socket bind/connect or address resolution failed
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
