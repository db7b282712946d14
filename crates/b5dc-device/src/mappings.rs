// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Device value types
//!
//! Raw register contents are integers; these types are what the facade turns
//! them into.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DeviceError, DeviceResult};

/// RFCM phase-locked loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PllState {
    #[default]
    NotLocked,
    Locked,
    LockLossDetected,
}

impl PllState {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(PllState::NotLocked),
            1 => Some(PllState::Locked),
            2 => Some(PllState::LockLossDetected),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i64 {
        match self {
            PllState::NotLocked => 0,
            PllState::Locked => 1,
            PllState::LockLossDetected => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PllState::NotLocked => "NOT_LOCKED",
            PllState::Locked => "LOCKED",
            PllState::LockLossDetected => "LOCK_LOSS_DETECTED",
        }
    }
}

impl fmt::Display for PllState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selectable RFCM carrier frequencies
///
/// Discriminants are the values accepted on the command surface and written
/// to the frequency register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum B5dcFrequency {
    F11_1Ghz = 1,
    F13_2Ghz = 2,
    F13_86Ghz = 3,
}

impl B5dcFrequency {
    pub const ALL: [B5dcFrequency; 3] = [
        B5dcFrequency::F11_1Ghz,
        B5dcFrequency::F13_2Ghz,
        B5dcFrequency::F13_86Ghz,
    ];

    pub fn value(self) -> i64 {
        self as i64
    }

    pub fn ghz(self) -> f64 {
        match self {
            B5dcFrequency::F11_1Ghz => 11.1,
            B5dcFrequency::F13_2Ghz => 13.2,
            B5dcFrequency::F13_86Ghz => 13.86,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            B5dcFrequency::F11_1Ghz => "F_11_1_GHZ",
            B5dcFrequency::F13_2Ghz => "F_13_2_GHZ",
            B5dcFrequency::F13_86Ghz => "F_13_86_GHZ",
        }
    }
}

impl TryFrom<i64> for B5dcFrequency {
    type Error = DeviceError;

    fn try_from(value: i64) -> DeviceResult<Self> {
        B5dcFrequency::ALL
            .into_iter()
            .find(|f| f.value() == value)
            .ok_or_else(|| {
                DeviceError::Frequency(format!("{} is not a valid B5dcFrequency", value))
            })
    }
}

/// Rendered as `B5dcFrequency.F_11_1_GHZ`, the form used in command
/// progress and result messages.
impl fmt::Display for B5dcFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B5dcFrequency.{}", self.name())
    }
}

/// A decoded sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Float(f64),
    PllLock(PllState),
}

impl SensorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Float(v) => Some(*v),
            SensorValue::PllLock(_) => None,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Float(v) => write!(f, "{}", v),
            SensorValue::PllLock(state) => write!(f, "{}", state),
        }
    }
}
