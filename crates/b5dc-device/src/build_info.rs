// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Physical configuration and FPGA firmware identity read from the device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub device_version: String,
    pub comms_engine_version: String,
    pub rfcm_psu_version: String,
    pub rfcm_pcb_version: String,
    pub backplane_version: String,
    pub psu_version: String,
    pub icd_version: String,
    pub fpga_model_name: String,
    pub fpga_build_time: String,
}

impl BuildInfo {
    /// Firmware image name, `<model>_<build time>.fpg`
    pub fn fpga_firmware_file(&self) -> String {
        format!("{}_{}.fpg", self.fpga_model_name, self.fpga_build_time)
    }
}
