// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Register-backed device facade
//!
//! Decodes raw register values according to the register map and caches the
//! result per sensor. One instance lives exactly as long as its session.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::register_map::{self, RegisterEntry, SensorKind, FREQUENCY_REGISTER};
use crate::{
    B5dcFrequency, DeviceError, DeviceFacade, DeviceResult, PllState, RegisterLink, SensorValue,
};

/// Exclusive upper bound of the attenuator, in dB
pub const MAX_ATTENUATION_DB: i64 = 32;

pub struct RegisterFacade {
    link: Arc<dyn RegisterLink>,
    sensors: RwLock<HashMap<&'static str, SensorValue>>,
}

impl RegisterFacade {
    pub fn new(link: Arc<dyn RegisterLink>) -> Self {
        Self {
            link,
            sensors: RwLock::new(HashMap::new()),
        }
    }

    fn decode(entry: &RegisterEntry, raw: i64) -> DeviceResult<SensorValue> {
        match entry.kind {
            SensorKind::Frequency => {
                // The register reads 0 until a frequency has been selected
                if raw == 0 {
                    return Ok(SensorValue::Float(0.0));
                }
                B5dcFrequency::try_from(raw).map(|f| SensorValue::Float(f.ghz()))
            }
            SensorKind::PllLock => PllState::from_raw(raw)
                .map(SensorValue::PllLock)
                .ok_or_else(|| {
                    DeviceError::Link(format!("Invalid PLL lock state {} read", raw))
                }),
            SensorKind::Attenuation => Ok(SensorValue::Float(raw as f64)),
            SensorKind::Analog => Ok(SensorValue::Float(raw as f64 / 100.0)),
        }
    }
}

#[async_trait]
impl DeviceFacade for RegisterFacade {
    async fn update_sensor(&self, register: &str) -> DeviceResult<()> {
        let entry = register_map::lookup(register)
            .ok_or_else(|| DeviceError::UnknownRegister(register.to_string()))?;

        let raw = self.link.read_register(entry.register).await?;
        let value = Self::decode(entry, raw)?;
        debug!(target: "b5dc-device", "{} = {}", entry.sensor, value);

        self.sensors.write().insert(entry.register, value);
        Ok(())
    }

    fn sensor_value(&self, register: &str) -> Option<SensorValue> {
        self.sensors.read().get(register).copied()
    }

    async fn set_attenuation(&self, attenuation_db: i64, register: &str) -> DeviceResult<()> {
        if !register_map::is_attenuation_register(register) {
            return Err(DeviceError::Attenuation(format!(
                "Register {} is not an attenuation register",
                register
            )));
        }
        if !(0..MAX_ATTENUATION_DB).contains(&attenuation_db) {
            return Err(DeviceError::Attenuation(format!(
                "Attenuation value {} dB is out of range. Valid range is [0, {}) dB",
                attenuation_db, MAX_ATTENUATION_DB
            )));
        }

        self.link.write_register(register, attenuation_db).await
    }

    async fn set_frequency(&self, frequency: B5dcFrequency) -> DeviceResult<()> {
        match self
            .link
            .write_register(FREQUENCY_REGISTER, frequency.value())
            .await
        {
            Err(DeviceError::Timeout { .. }) => Err(DeviceError::Frequency(format!(
                "Timeout writing {} to the frequency register",
                frequency
            ))),
            other => other,
        }
    }
}
