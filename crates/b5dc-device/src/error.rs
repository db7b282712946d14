// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/// Errors raised by register links and device facades
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    /// No response within the link's retry/error-count threshold
    #[error("Timeout on request for register {register}")]
    Timeout { register: String },

    #[error("Unknown register: {0}")]
    UnknownRegister(String),

    /// Attenuation rejected by the device; the message is shown verbatim
    #[error("{0}")]
    Attenuation(String),

    /// Frequency rejected by the device; the message is shown verbatim
    #[error("{0}")]
    Frequency(String),

    /// The session underneath the link is gone
    #[error("Register link error: {0}")]
    Link(String),
}

impl DeviceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeviceError::Timeout { .. })
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;
