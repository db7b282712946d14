// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Build state record published under `buildstate`

use b5dc_device::BuildInfo;
use serde::{Deserialize, Serialize};

use crate::SupervisorResult;

/// Device name reported in every build record
pub const BUILD_STATE_DEVICE_NAME: &str = "ska-mid-b5dc";

/// Placed in `device_ip` when the metadata could not be read
pub const BUILD_STATE_FAILURE_MESSAGE: &str =
    "Failed to retrieve build state data for band 5 down converter.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    pub device: String,
    pub device_ip: String,
    pub device_version: String,
    pub comms_engine_version: String,
    pub rfcm_psu_version: String,
    pub rfcm_pcb_version: String,
    pub backplane_version: String,
    pub psu_version: String,
    pub icd_version: String,
    pub fpga_firmware_file: String,
}

impl BuildState {
    pub fn from_build_info(device_ip: &str, info: &BuildInfo) -> Self {
        Self {
            device: BUILD_STATE_DEVICE_NAME.to_string(),
            device_ip: device_ip.to_string(),
            device_version: info.device_version.clone(),
            comms_engine_version: info.comms_engine_version.clone(),
            rfcm_psu_version: info.rfcm_psu_version.clone(),
            rfcm_pcb_version: info.rfcm_pcb_version.clone(),
            backplane_version: info.backplane_version.clone(),
            psu_version: info.psu_version.clone(),
            icd_version: info.icd_version.clone(),
            fpga_firmware_file: info.fpga_firmware_file(),
        }
    }

    /// Record used when build metadata is unavailable
    pub fn degraded() -> Self {
        Self {
            device: BUILD_STATE_DEVICE_NAME.to_string(),
            device_ip: BUILD_STATE_FAILURE_MESSAGE.to_string(),
            ..Default::default()
        }
    }

    /// JSON with 4-space indentation
    pub fn to_json(&self) -> SupervisorResult<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_record() {
        let json = BuildState::degraded().to_json().unwrap();
        let parsed: BuildState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.device, BUILD_STATE_DEVICE_NAME);
        assert_eq!(parsed.device_ip, BUILD_STATE_FAILURE_MESSAGE);
        assert!(parsed.fpga_firmware_file.is_empty());
    }

    #[test]
    fn test_json_layout() {
        let info = BuildInfo {
            device_version: "1.0.0".to_string(),
            fpga_model_name: "b5dc".to_string(),
            fpga_build_time: "20240101".to_string(),
            ..Default::default()
        };
        let json = BuildState::from_build_info("10.0.0.5", &info).to_json().unwrap();

        assert!(json.starts_with("{\n    \"device\": \"ska-mid-b5dc\",\n    \"device_ip\": \"10.0.0.5\","));
        assert!(json.contains("\"fpga_firmware_file\": \"b5dc_20240101.fpg\"\n}"));
    }
}
