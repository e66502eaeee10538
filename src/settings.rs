use serde::{Deserialize, Serialize};

use crate::errors::BlindError;
use crate::variant::DeviceKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mqtt: MqttSettings,
    /// Directory where per-device snapshot files live.
    pub state_dir: String,
    pub devices: Vec<DeviceSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mqtt: MqttSettings::default(),
            state_dir: String::from("state"),
            devices: vec![],
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), BlindError> {
        if self.devices.is_empty() {
            return Err(BlindError::InvalidConfig(
                "no devices configured".to_string(),
            ));
        }
        for (i, device) in self.devices.iter().enumerate() {
            if device.device_id.is_empty() {
                return Err(BlindError::InvalidConfig(format!(
                    "device #{i} has an empty device_id"
                )));
            }
        }
        let mut ids: Vec<&str> = self.devices.iter().map(|d| d.device_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.devices.len() {
            return Err(BlindError::InvalidConfig(
                "duplicate device_id in settings".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttSettings {
    fn default() -> Self {
        MqttSettings {
            host: String::from("localhost"),
            port: 1883,
            username: None,
            password: None,
        }
    }
}

/// One RF blind. Capability flags live in the variant, not here: only the
/// family selector and the tunables are user-facing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub device_id: String,
    pub name: Option<String>,
    pub kind: DeviceKind,
    /// Steps from fully tilted to the mid/home angle.
    pub mid_steps: u16,
    pub open_secs: u64,
    pub close_secs: u64,
    pub step_millis: u64,
    pub signal_repetitions: u8,
    /// Re-anchor on the mid command whenever a tilt crosses the mid point.
    pub sync_mid: bool,
    pub eu_mode: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            device_id: String::new(),
            name: None,
            kind: DeviceKind::SimulatedVenetian,
            mid_steps: 2,
            open_secs: 30,
            close_secs: 30,
            step_millis: 500,
            signal_repetitions: 1,
            sync_mid: false,
            eu_mode: false,
        }
    }
}

impl DeviceSettings {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.device_id)
    }
}
