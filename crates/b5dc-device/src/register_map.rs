// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The polled register set
//!
//! Order is significant: poll passes visit registers in this order.

use crate::{PllState, SensorValue};

/// Published state key carrying connectivity
pub const CONNECTION_STATE_KEY: &str = "connectionstate";
/// Published state key carrying the JSON build record
pub const BUILD_STATE_KEY: &str = "buildstate";

pub const FREQUENCY_REGISTER: &str = "spi_rfcm_frequency";
pub const PLL_LOCK_REGISTER: &str = "spi_rfcm_pll_lock";
pub const H_ATTENUATION_REGISTER: &str = "spi_rfcm_h_attenuation";
pub const V_ATTENUATION_REGISTER: &str = "spi_rfcm_v_attenuation";

/// How a raw register value is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Carrier frequency selector, decoded to GHz
    Frequency,
    PllLock,
    /// Attenuation in whole dB
    Attenuation,
    /// ADC channel in hundredths of the engineering unit
    Analog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterEntry {
    pub register: &'static str,
    pub sensor: &'static str,
    pub kind: SensorKind,
}

impl RegisterEntry {
    const fn new(register: &'static str, sensor: &'static str, kind: SensorKind) -> Self {
        Self {
            register,
            sensor,
            kind,
        }
    }

    /// Value published before the register has ever been read
    pub fn default_value(&self) -> SensorValue {
        match self.kind {
            SensorKind::PllLock => SensorValue::PllLock(PllState::NotLocked),
            _ => SensorValue::Float(0.0),
        }
    }
}

pub static REGISTER_MAP: [RegisterEntry; 11] = [
    RegisterEntry::new(FREQUENCY_REGISTER, "rfcm_frequency", SensorKind::Frequency),
    RegisterEntry::new(PLL_LOCK_REGISTER, "rfcm_pll_lock", SensorKind::PllLock),
    RegisterEntry::new(
        H_ATTENUATION_REGISTER,
        "rfcm_h_attenuation_db",
        SensorKind::Attenuation,
    ),
    RegisterEntry::new(
        V_ATTENUATION_REGISTER,
        "rfcm_v_attenuation_db",
        SensorKind::Attenuation,
    ),
    RegisterEntry::new(
        "spi_rfcm_photo_diode_ain0",
        "clk_photodiode_current_ma",
        SensorKind::Analog,
    ),
    RegisterEntry::new("spi_rfcm_rf_in_h_ain1", "h_pol_rf_power_in_dbm", SensorKind::Analog),
    RegisterEntry::new("spi_rfcm_rf_in_v_ain2", "v_pol_rf_power_in_dbm", SensorKind::Analog),
    RegisterEntry::new("spi_rfcm_if_out_h_ain3", "h_pol_if_power_out_dbm", SensorKind::Analog),
    RegisterEntry::new("spi_rfcm_if_out_v_ain4", "v_pol_if_power_out_dbm", SensorKind::Analog),
    RegisterEntry::new("spi_rfcm_rf_temp_ain5", "rf_temperature_degc", SensorKind::Analog),
    RegisterEntry::new(
        "spi_rfcm_psu_pcb_temp_ain7",
        "rfcm_psu_pcb_temperature_degc",
        SensorKind::Analog,
    ),
];

pub fn lookup(register: &str) -> Option<&'static RegisterEntry> {
    REGISTER_MAP.iter().find(|entry| entry.register == register)
}

pub fn is_attenuation_register(register: &str) -> bool {
    register == H_ATTENUATION_REGISTER || register == V_ATTENUATION_REGISTER
}
