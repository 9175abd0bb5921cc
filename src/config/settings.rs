//! Global settings, including the state map
//!
//! The state map assigns a profile name to each operating state
//! (e.g. `power_ac`, `power_bat` or a custom trigger id).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::state;

/// Singleton settings record stored in the authoritative settings file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_state_map")]
    pub state_map: BTreeMap<String, String>,
    #[serde(default)]
    pub fahrenheit: bool,
    #[serde(default = "default_true")]
    pub cpu_settings_enabled: bool,
    #[serde(default = "default_true")]
    pub fan_control_enabled: bool,
    /// Scheduled shutdown time (HH:MM), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_time: Option<String>,
}

fn default_state_map() -> BTreeMap<String, String> {
    BTreeMap::from([
        (state::POWER_AC.to_string(), "Balanced".to_string()),
        (state::POWER_BATTERY.to_string(), "Quiet".to_string()),
    ])
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_map: default_state_map(),
            fahrenheit: false,
            cpu_settings_enabled: true,
            fan_control_enabled: true,
            shutdown_time: None,
        }
    }
}

impl Settings {
    /// Profile name assigned to `state_id`
    pub fn profile_for_state(&self, state_id: &str) -> Option<&str> {
        self.state_map.get(state_id).map(String::as_str)
    }

    /// Copy of these settings with `state_id` assigned to `profile_name`.
    /// All other state map entries are carried over unchanged.
    pub fn with_profile_for_state(&self, state_id: &str, profile_name: &str) -> Settings {
        let mut settings = self.clone();
        settings
            .state_map
            .insert(state_id.to_string(), profile_name.to_string());
        settings
    }
}
