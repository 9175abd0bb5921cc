//! File locations and front-end configuration
//!
//! The daemon and helper only ever use [`Paths`]. The front-end additionally
//! reads a small per-user config file that names the escalation wrapper and
//! the daemon executable. Precedence: defaults < config file < environment
//! < command line.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{env, frontend, paths};

/// Every file location the system touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    pub profiles_file: PathBuf,
    pub tmp_settings: PathBuf,
    pub tmp_profiles: PathBuf,
    pub pid_file: PathBuf,
    pub power_supply_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::with_config_dir(paths::CONFIG_DIR)
    }
}

impl Paths {
    /// Default locations with the authoritative files under `config_dir`
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        Self {
            settings_file: config_dir.join(paths::SETTINGS_FILE),
            profiles_file: config_dir.join(paths::PROFILES_FILE),
            config_dir,
            tmp_settings: PathBuf::from(paths::TMP_SETTINGS),
            tmp_profiles: PathBuf::from(paths::TMP_PROFILES),
            pid_file: PathBuf::from(paths::PID_FILE),
            power_supply_dir: PathBuf::from(paths::POWER_SUPPLY_DIR),
        }
    }

    /// Every location below `root`
    #[cfg(test)]
    pub fn under(root: &Path) -> Self {
        let mut paths = Self::with_config_dir(root.join("etc"));
        paths.tmp_settings = root.join("tmp").join("tmphwpsettings");
        paths.tmp_profiles = root.join("tmp").join("tmphwpprofiles");
        paths.pid_file = root.join("run").join("hwprofile.pid");
        paths.power_supply_dir = root.join("sys").join("power_supply");
        paths
    }

    /// True if the authoritative files live in the compiled-in location
    pub fn is_default_config_dir(&self) -> bool {
        self.config_dir == Path::new(paths::CONFIG_DIR)
    }
}

/// Per-user front-end configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Privilege escalation wrapper; empty means commit in-process
    #[serde(default = "default_escalation")]
    pub escalation: String,
    /// Helper executable; defaults to the running binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_exec: Option<PathBuf>,
    /// Directory of the authoritative files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,
}

fn default_escalation() -> String {
    frontend::ESCALATION.to_string()
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            escalation: default_escalation(),
            daemon_exec: None,
            config_dir: None,
        }
    }
}

impl FrontendConfig {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(frontend::APP_DIR);
        path.push(frontend::FILENAME);
        path
    }

    /// Load from the default location, then apply environment overrides.
    /// Never fails: a missing or broken file yields the defaults.
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::path());
        config.apply_env_overrides();
        config
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<FrontendConfig>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded front-end config");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse front-end config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No front-end config, using defaults");
                Self::default()
            }
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(env::CONFIG_DIR) {
            self.config_dir = Some(PathBuf::from(dir));
        }
        if let Some(escalation) = lookup(env::ESCALATION) {
            self.escalation = escalation.trim().to_string();
        }
        if let Some(exec) = lookup(env::DAEMON_EXEC) {
            self.daemon_exec = Some(PathBuf::from(exec));
        }
    }

    /// Escalation wrapper, or None when commits run in-process
    pub fn escalation(&self) -> Option<&str> {
        let escalation = self.escalation.trim();
        (!escalation.is_empty()).then_some(escalation)
    }

    /// Helper executable: configured path or the running binary
    pub fn daemon_exec(&self) -> Result<PathBuf> {
        match &self.daemon_exec {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe().context("Failed to resolve executable path"),
        }
    }

    pub fn paths(&self) -> Paths {
        match &self.config_dir {
            Some(dir) => Paths::with_config_dir(dir),
            None => Paths::default(),
        }
    }
}
