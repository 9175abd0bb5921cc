//! Privileged helper: adopt a staged settings or profiles file
//!
//! Invoked as `hwprofile --new-settings <path>` or
//! `hwprofile --new-profiles <path>` through the escalation wrapper. The
//! staged payload is parsed strictly, validated, written over the
//! authoritative file and the running daemon is told to reload.

use anyhow::{Context, Result, bail};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::ProfileCatalog;
use crate::config::{Paths, Profile, Settings};
use crate::persistence::{self, ConfigStore, PersistenceError};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("profile name must not be empty")]
    EmptyName,

    #[error("duplicate profile name '{0}'")]
    DuplicateName(String),

    #[error("profile name '{0}' is reserved by a built-in profile")]
    ReservedName(String),

    #[error("state map entry '{0}' is empty")]
    EmptyStateEntry(String),

    #[error("invalid shutdown time '{0}' (expected HH:MM)")]
    InvalidShutdownTime(String),
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Check names and clamp parameters of a custom profile collection
pub fn validate_profiles(profiles: &mut [Profile]) -> Result<(), ValidationError> {
    let builtins = ProfileCatalog::default();
    let mut seen = HashSet::new();

    for profile in profiles.iter_mut() {
        if profile.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if builtins.is_default_name(&profile.name) {
            return Err(ValidationError::ReservedName(profile.name.clone()));
        }
        if !seen.insert(profile.name.clone()) {
            return Err(ValidationError::DuplicateName(profile.name.clone()));
        }
        profile.validate_and_clamp();
    }

    Ok(())
}

pub fn validate_settings(settings: &Settings) -> Result<(), ValidationError> {
    for (state_id, profile_name) in &settings.state_map {
        if state_id.trim().is_empty() || profile_name.trim().is_empty() {
            return Err(ValidationError::EmptyStateEntry(state_id.clone()));
        }
    }

    if let Some(time) = &settings.shutdown_time
        && !is_valid_clock_time(time)
    {
        return Err(ValidationError::InvalidShutdownTime(time.clone()));
    }

    Ok(())
}

fn is_valid_clock_time(time: &str) -> bool {
    let Some((hours, minutes)) = time.split_once(':') else {
        return false;
    };
    let in_range = |s: &str, max: u8| {
        s.len() == 2 && s.parse::<u8>().is_ok_and(|v| v <= max)
    };
    in_range(hours, 23) && in_range(minutes, 59)
}

/// Validate and atomically install new settings, then notify the daemon
pub fn install_settings(paths: &Paths, settings: &Settings) -> Result<(), InstallError> {
    validate_settings(settings)?;

    // Referential integrity is not enforced; dangling names only get logged
    let catalog = ProfileCatalog::new(ConfigStore::from_paths(paths).read_custom_profiles_or_default());
    for (state_id, profile_name) in &settings.state_map {
        if !catalog.contains_name(profile_name) {
            warn!(state = %state_id, profile = %profile_name, "State assigned to unknown profile");
        }
    }

    persistence::write_settings(settings, &paths.settings_file)?;
    notify_daemon(&paths.pid_file);
    Ok(())
}

/// Validate and atomically install a custom profile collection, then notify the daemon
pub fn install_profiles(paths: &Paths, mut profiles: Vec<Profile>) -> Result<(), InstallError> {
    validate_profiles(&mut profiles)?;
    persistence::write_profiles(&profiles, &paths.profiles_file)?;
    notify_daemon(&paths.pid_file);
    Ok(())
}

/// Allow a non-default config directory only when it is listed in
/// `allow_file`. The list must be owned by the effective user and must not
/// be writable by group or others.
pub fn authorize_config_dir(paths: &Paths, allow_file: &Path) -> Result<()> {
    if paths.is_default_config_dir() {
        return Ok(());
    }
    let dir = &paths.config_dir;

    let meta = match fs::metadata(allow_file) {
        Ok(meta) => meta,
        Err(e) => {
            debug!(path = %allow_file.display(), error = %e, "No config directory allow list");
            bail!("Config directory {} is not allowed", dir.display());
        }
    };
    if meta.uid() != nix::unistd::geteuid().as_raw() || meta.mode() & 0o022 != 0 {
        bail!(
            "Refusing allow list {}: must be owned by root and not writable by others",
            allow_file.display()
        );
    }

    let contents = fs::read_to_string(allow_file)
        .with_context(|| format!("Failed to read {}", allow_file.display()))?;
    let allowed = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| Path::new(line) == dir.as_path());
    if !allowed {
        bail!("Config directory {} is not allowed", dir.display());
    }

    info!(dir = %dir.display(), "Using allowed non-default config directory");
    Ok(())
}

/// Entry point for `--new-settings <staged>`
pub fn apply_new_settings(paths: &Paths, staged: &Path) -> Result<()> {
    let settings: Settings = persistence::read_json(staged)
        .with_context(|| format!("Failed to read staged settings from {}", staged.display()))?;
    install_settings(paths, &settings).context("Failed to install new settings")?;
    info!(path = %paths.settings_file.display(), "Installed new settings");
    Ok(())
}

/// Entry point for `--new-profiles <staged>`
pub fn apply_new_profiles(paths: &Paths, staged: &Path) -> Result<()> {
    let profiles: Vec<Profile> = persistence::read_json(staged)
        .with_context(|| format!("Failed to read staged profiles from {}", staged.display()))?;
    let count = profiles.len();
    install_profiles(paths, profiles).context("Failed to install new profiles")?;
    info!(path = %paths.profiles_file.display(), count, "Installed new profiles");
    Ok(())
}

/// Send SIGHUP to the daemon named in the pid file. Returns true if a
/// daemon was signaled; a missing or stale pid file is not an error.
pub fn notify_daemon(pid_file: &Path) -> bool {
    let contents = match fs::read_to_string(pid_file) {
        Ok(contents) => contents,
        Err(e) => {
            debug!(path = %pid_file.display(), error = %e, "No daemon pid file, skipping reload signal");
            return false;
        }
    };

    let pid = match contents.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => pid,
        _ => {
            warn!(path = %pid_file.display(), contents = %contents.trim(), "Invalid daemon pid file");
            return false;
        }
    };

    match kill(Pid::from_raw(pid), Signal::SIGHUP) {
        Ok(()) => {
            info!(pid, "Signaled daemon to reload");
            true
        }
        Err(Errno::ESRCH) => {
            warn!(pid, "Daemon pid file is stale");
            false
        }
        Err(e) => {
            warn!(pid, error = %e, "Failed to signal daemon");
            false
        }
    }
}
