//! Privileged daemon - owns the authoritative files and applies profiles
//!
//! The daemon resolves the profile assigned to the current operating state
//! and applies it. It reloads its files on SIGHUP (sent by the helper after
//! installing a new payload) and re-applies when the power state changes.

pub mod helper;
mod power;

use anyhow::{Context, Result};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::catalog::ProfileCatalog;
use crate::config::{Paths, Profile, Settings};
use crate::constants::daemon::POLL_INTERVAL_MS;
use crate::persistence::ConfigStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonEvent {
    Reload,
    Shutdown,
}

/// PID file removed again when the daemon exits
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create pid directory {}", parent.display()))?;
        }
        fs::write(path, format!("{}\n", std::process::id()))
            .with_context(|| format!("Failed to write pid file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Runtime state: cached files plus what is currently applied
pub struct DaemonState {
    paths: Paths,
    store: ConfigStore,
    catalog: ProfileCatalog,
    settings: Settings,
    power_state: &'static str,
    applied: Option<(&'static str, Profile)>,
}

impl DaemonState {
    pub fn load(paths: Paths) -> Self {
        let store = ConfigStore::from_paths(&paths);
        let catalog = ProfileCatalog::new(store.read_custom_profiles_or_default());
        let settings = store.read_settings_or_default();
        let power_state = power::detect_state(&paths.power_supply_dir);
        info!(power_state, customs = catalog.customs().len(), "Loaded daemon state");
        Self {
            paths,
            store,
            catalog,
            settings,
            power_state,
            applied: None,
        }
    }

    /// Re-read both files and re-apply unconditionally
    pub fn reload(&mut self) {
        self.catalog
            .replace_custom_profiles(self.store.read_custom_profiles_or_default());
        self.settings = self.store.read_settings_or_default();
        info!(customs = self.catalog.customs().len(), "Reloaded settings and profiles");
        self.apply(true);
    }

    /// Profile assigned to `state_id`, with every field filled. An unknown
    /// or dangling assignment falls back to the first built-in profile.
    pub fn resolve_profile(&self, state_id: &str) -> Profile {
        let assigned = self.settings.profile_for_state(state_id);
        let mut profile = match assigned.and_then(|name| self.catalog.find_by_name(name)) {
            Some(profile) => profile,
            None => {
                warn!(state = %state_id, assigned = ?assigned, "No usable profile for state, using fallback");
                self.catalog
                    .default_profiles()
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| Profile::named("Balanced"))
            }
        };
        profile.fill_defaults();
        profile
    }

    /// Re-detect the power state. Returns true if it changed.
    fn poll_power_state(&mut self) -> bool {
        let detected = power::detect_state(&self.paths.power_supply_dir);
        if detected == self.power_state {
            return false;
        }
        info!(from = self.power_state, to = detected, "Power state changed");
        self.power_state = detected;
        true
    }

    /// Apply the profile for the current state; skipped when the same
    /// profile is already applied for this state unless `force` is set
    fn apply(&mut self, force: bool) {
        let profile = self.resolve_profile(self.power_state);
        if !force
            && let Some((state, applied)) = &self.applied
            && *state == self.power_state
            && *applied == profile
        {
            debug!(profile = %profile.name, "Profile already applied");
            return;
        }
        apply_profile(&profile, &self.settings);
        self.applied = Some((self.power_state, profile));
    }

    pub fn applied_profile(&self) -> Option<&Profile> {
        self.applied.as_ref().map(|(_, profile)| profile)
    }
}

/// Hand the resolved parameters to the hardware layer
fn apply_profile(profile: &Profile, settings: &Settings) {
    info!(
        profile = %profile.name,
        brightness = ?profile.display.brightness,
        online_cores = ?profile.cpu.online_cores,
        governor = ?profile.cpu.governor,
        fan_profile = ?profile.fan.fan_profile,
        odm_profile = ?profile.power.odm_profile,
        "Applying profile"
    );
    if !settings.cpu_settings_enabled {
        info!("CPU control disabled in settings, leaving CPU parameters untouched");
    }
    if !settings.fan_control_enabled {
        info!("Fan control disabled in settings, leaving fan parameters untouched");
    }
}

/// Forward SIGHUP/SIGTERM/SIGINT to the main loop
fn spawn_signal_listener(tx: Sender<DaemonEvent>) -> Result<thread::JoinHandle<()>> {
    let mut signals =
        Signals::new([SIGHUP, SIGTERM, SIGINT]).context("Failed to register signal handlers")?;

    Ok(thread::spawn(move || {
        for signal in signals.forever() {
            let event = if signal == SIGHUP {
                DaemonEvent::Reload
            } else {
                DaemonEvent::Shutdown
            };
            debug!(signal, event = ?event, "Received signal");
            if tx.send(event).is_err() || event == DaemonEvent::Shutdown {
                break;
            }
        }
    }))
}

/// Run the daemon until SIGTERM/SIGINT
pub fn run(paths: Paths) -> Result<()> {
    let _pid_file = PidFile::create(&paths.pid_file)?;
    let (tx, rx) = mpsc::channel();
    let _signal_handle = spawn_signal_listener(tx)?;

    let mut state = DaemonState::load(paths);
    state.apply(true);
    info!("Daemon running");

    loop {
        match rx.recv_timeout(Duration::from_millis(POLL_INTERVAL_MS)) {
            Ok(DaemonEvent::Reload) => state.reload(),
            Ok(DaemonEvent::Shutdown) => {
                info!("Shutdown requested");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if state.poll_power_state() {
                    state.apply(false);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("Signal listener exited unexpectedly");
                break;
            }
        }
    }

    if let Some(profile) = state.applied_profile() {
        info!(profile = %profile.name, "Daemon exiting");
    }
    Ok(())
}
