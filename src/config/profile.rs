//! Profile data model
//!
//! A profile is a named bundle of hardware behavior parameters. Every
//! parameter is optional on disk; [`Profile::fill_defaults`] completes a
//! profile with the canonical default for each unset field.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::validation::*;

/// Profile - a complete set of display, CPU, fan, power and webcam parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub cpu: CpuSettings,
    #[serde(default)]
    pub fan: FanSettings,
    #[serde(default)]
    pub power: PowerLimits,
    #[serde(default)]
    pub webcam: WebcamSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Brightness in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_brightness: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_cores: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_performance_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_turbo: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_control: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_profile: Option<String>,
    /// Lower bound for the fan speed in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_speed: Option<u8>,
    /// Added to every curve point, in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_speed: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<Vec<FanCurvePoint>>,
}

/// One point of a fan curve: at `temperature` °C run at `speed` percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanCurvePoint {
    pub temperature: u8,
    pub speed: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odm_profile: Option<String>,
    /// Firmware TDP values in watts; empty keeps the firmware defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tdp_values: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebcamSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_status: Option<bool>,
}

// Canonical default values
fn default_description() -> String {
    String::new()
}

fn default_brightness() -> u8 {
    100
}

fn default_online_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

fn default_governor() -> String {
    "powersave".to_string()
}

fn default_energy_performance_preference() -> String {
    "balance_performance".to_string()
}

fn default_fan_profile() -> String {
    "Balanced".to_string()
}

fn default_fan_curve() -> Vec<FanCurvePoint> {
    [(40, 10), (55, 25), (70, 45), (80, 65), (90, 100)]
        .into_iter()
        .map(|(temperature, speed)| FanCurvePoint { temperature, speed })
        .collect()
}

fn default_odm_profile() -> String {
    "balanced".to_string()
}

/// Assign the default when the field is unset
macro_rules! fill_if_unset {
    ($field:expr, $val:expr) => {
        if $field.is_none() {
            $field = Some($val);
        }
    };
}

/// Record the dotted field name when the field is unset
macro_rules! push_if_unset {
    ($out:ident, $field:expr, $name:literal) => {
        if $field.is_none() {
            $out.push($name);
        }
    };
}

impl Profile {
    /// Create a profile with only a name; every parameter is unset
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            display: DisplaySettings::default(),
            cpu: CpuSettings::default(),
            fan: FanSettings::default(),
            power: PowerLimits::default(),
            webcam: WebcamSettings::default(),
        }
    }

    /// Set every unset field to its canonical default. Fields that are
    /// already set are left untouched.
    pub fn fill_defaults(&mut self) {
        fill_if_unset!(self.description, default_description());

        fill_if_unset!(self.display.brightness, default_brightness());
        fill_if_unset!(self.display.use_brightness, false);

        fill_if_unset!(self.cpu.online_cores, default_online_cores());
        fill_if_unset!(self.cpu.governor, default_governor());
        fill_if_unset!(
            self.cpu.energy_performance_preference,
            default_energy_performance_preference()
        );
        fill_if_unset!(self.cpu.no_turbo, false);

        fill_if_unset!(self.fan.use_control, true);
        fill_if_unset!(self.fan.fan_profile, default_fan_profile());
        fill_if_unset!(self.fan.minimum_speed, 0);
        fill_if_unset!(self.fan.offset_speed, 0);
        fill_if_unset!(self.fan.curve, default_fan_curve());

        fill_if_unset!(self.power.odm_profile, default_odm_profile());
        fill_if_unset!(self.power.tdp_values, Vec::new());

        fill_if_unset!(self.webcam.status, true);
        fill_if_unset!(self.webcam.use_status, false);
    }

    /// Dotted names of all fields that are still unset
    pub fn unset_fields(&self) -> Vec<&'static str> {
        let mut unset = Vec::new();
        push_if_unset!(unset, self.description, "description");
        push_if_unset!(unset, self.display.brightness, "display.brightness");
        push_if_unset!(unset, self.display.use_brightness, "display.use_brightness");
        push_if_unset!(unset, self.cpu.online_cores, "cpu.online_cores");
        push_if_unset!(unset, self.cpu.governor, "cpu.governor");
        push_if_unset!(
            unset,
            self.cpu.energy_performance_preference,
            "cpu.energy_performance_preference"
        );
        push_if_unset!(unset, self.cpu.no_turbo, "cpu.no_turbo");
        push_if_unset!(unset, self.fan.use_control, "fan.use_control");
        push_if_unset!(unset, self.fan.fan_profile, "fan.fan_profile");
        push_if_unset!(unset, self.fan.minimum_speed, "fan.minimum_speed");
        push_if_unset!(unset, self.fan.offset_speed, "fan.offset_speed");
        push_if_unset!(unset, self.fan.curve, "fan.curve");
        push_if_unset!(unset, self.power.odm_profile, "power.odm_profile");
        push_if_unset!(unset, self.power.tdp_values, "power.tdp_values");
        push_if_unset!(unset, self.webcam.status, "webcam.status");
        push_if_unset!(unset, self.webcam.use_status, "webcam.use_status");
        unset
    }

    /// Clamp parameters to safe ranges. Returns true if anything changed.
    pub fn validate_and_clamp(&mut self) -> bool {
        let mut changed = false;

        if let Some(brightness) = self.display.brightness
            && brightness > MAX_BRIGHTNESS
        {
            warn!(profile = %self.name, brightness, max = MAX_BRIGHTNESS, "brightness exceeds maximum, clamping");
            self.display.brightness = Some(MAX_BRIGHTNESS);
            changed = true;
        }

        if let Some(speed) = self.fan.minimum_speed
            && speed > MAX_FAN_SPEED
        {
            warn!(profile = %self.name, minimum_speed = speed, max = MAX_FAN_SPEED, "minimum_speed exceeds maximum, clamping");
            self.fan.minimum_speed = Some(MAX_FAN_SPEED);
            changed = true;
        }

        if let Some(offset) = self.fan.offset_speed {
            let clamped = offset.clamp(MIN_FAN_OFFSET, MAX_FAN_OFFSET);
            if clamped != offset {
                warn!(profile = %self.name, offset_speed = offset, clamped, "offset_speed out of range, clamping");
                self.fan.offset_speed = Some(clamped);
                changed = true;
            }
        }

        if let Some(curve) = self.fan.curve.as_mut() {
            for point in curve.iter_mut() {
                if point.speed > MAX_FAN_SPEED {
                    warn!(profile = %self.name, temperature = point.temperature, speed = point.speed, "fan curve speed exceeds maximum, clamping");
                    point.speed = MAX_FAN_SPEED;
                    changed = true;
                }
                if point.temperature > MAX_CURVE_TEMPERATURE {
                    warn!(profile = %self.name, temperature = point.temperature, max = MAX_CURVE_TEMPERATURE, "fan curve temperature exceeds maximum, clamping");
                    point.temperature = MAX_CURVE_TEMPERATURE;
                    changed = true;
                }
            }
            if !curve.is_sorted_by_key(|p| p.temperature) {
                warn!(profile = %self.name, "fan curve not ordered by temperature, sorting");
                curve.sort_by_key(|p| p.temperature);
                changed = true;
            }
        }

        if let Some(cores) = self.cpu.online_cores
            && cores == 0
        {
            warn!(profile = %self.name, "online_cores is 0, keeping at least one core online");
            self.cpu.online_cores = Some(1);
            changed = true;
        }

        changed
    }
}

/// Built-in profiles in declaration order. Some parameters are left unset
/// on purpose; the catalog fills them at load time.
pub fn builtin_profiles() -> Vec<Profile> {
    let mut balanced = Profile::named("Balanced");
    balanced.description = Some("Balanced performance and noise".to_string());

    let mut quiet = Profile::named("Quiet");
    quiet.description = Some("Low fan noise, reduced boost".to_string());
    quiet.cpu.energy_performance_preference = Some("balance_power".to_string());
    quiet.fan.fan_profile = Some("Quiet".to_string());
    quiet.fan.curve = Some(
        [(50, 0), (65, 20), (75, 40), (85, 70), (95, 100)]
            .into_iter()
            .map(|(temperature, speed)| FanCurvePoint { temperature, speed })
            .collect(),
    );
    quiet.power.odm_profile = Some("quiet".to_string());

    let mut powersave = Profile::named("Powersave");
    powersave.description = Some("Maximum battery life".to_string());
    powersave.display.brightness = Some(40);
    powersave.display.use_brightness = Some(true);
    powersave.cpu.online_cores = Some(4);
    powersave.cpu.energy_performance_preference = Some("power".to_string());
    powersave.cpu.no_turbo = Some(true);
    powersave.fan.fan_profile = Some("Silent".to_string());
    powersave.power.odm_profile = Some("power_save".to_string());

    vec![balanced, quiet, powersave]
}
