//! Reading and writing settings and profile collections
//!
//! Reads come in two flavors: strict (`read_*`) for callers that must reject
//! broken input, and fallback (`read_*_or_default`) which substitutes a safe
//! default for a missing, corrupt or unreadable file. Writes are atomic:
//! the payload goes to a sibling `.tmp` file which is then renamed over the
//! target, so a concurrent reader never sees a partial file.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Paths, Profile, Settings};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PersistenceError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True if the error means the file does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Read access to the authoritative settings and profiles files
#[derive(Debug, Clone)]
pub struct ConfigStore {
    settings_path: PathBuf,
    profiles_path: PathBuf,
}

impl ConfigStore {
    pub fn new(settings_path: impl Into<PathBuf>, profiles_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
            profiles_path: profiles_path.into(),
        }
    }

    pub fn from_paths(paths: &Paths) -> Self {
        Self::new(&paths.settings_file, &paths.profiles_file)
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn profiles_path(&self) -> &Path {
        &self.profiles_path
    }

    pub fn read_settings(&self) -> Result<Settings, PersistenceError> {
        read_json(&self.settings_path)
    }

    pub fn read_custom_profiles(&self) -> Result<Vec<Profile>, PersistenceError> {
        read_json(&self.profiles_path)
    }

    /// Settings from disk, or default settings if the file can't be used
    pub fn read_settings_or_default(&self) -> Settings {
        or_default(self.read_settings(), &self.settings_path)
    }

    /// Custom profiles from disk, or an empty collection if the file can't be used
    pub fn read_custom_profiles_or_default(&self) -> Vec<Profile> {
        or_default(self.read_custom_profiles(), &self.profiles_path)
    }
}

fn or_default<T: Default>(result: Result<T, PersistenceError>, path: &Path) -> T {
    match result {
        Ok(value) => value,
        Err(e) if e.is_not_found() => {
            debug!(path = %path.display(), "File not found, using defaults");
            T::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read file, using defaults");
            T::default()
        }
    }
}

/// Parse a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let contents = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|source| PersistenceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically write `settings` to `path`
pub fn write_settings(settings: &Settings, path: &Path) -> Result<(), PersistenceError> {
    write_json_atomic(settings, path)?;
    info!(path = %path.display(), "Wrote settings");
    Ok(())
}

/// Atomically write a custom profile collection to `path`
pub fn write_profiles(profiles: &[Profile], path: &Path) -> Result<(), PersistenceError> {
    write_json_atomic(profiles, path)?;
    info!(path = %path.display(), count = profiles.len(), "Wrote profiles");
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize as pretty JSON, write to a sibling file, fsync, rename into place
pub fn write_json_atomic<T: Serialize + ?Sized>(
    value: &T,
    path: &Path,
) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(value)?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
    }

    let tmp = staging_path(path);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(json.as_bytes())?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(PersistenceError::io(path, e));
    }

    // Persist the rename itself
    if let Some(parent) = parent
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn store_in(dir: &Path) -> ConfigStore {
        ConfigStore::new(dir.join("settings"), dir.join("profiles"))
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        assert_eq!(store.read_settings_or_default(), Settings::default());
        assert!(store.read_custom_profiles_or_default().is_empty());
        assert!(store.read_settings().unwrap_err().is_not_found());
    }

    #[test]
    fn test_corrupt_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.settings_path(), "{ \"state_map\": ").unwrap();
        fs::write(store.profiles_path(), "not json at all").unwrap();

        assert_eq!(store.read_settings_or_default(), Settings::default());
        assert!(store.read_custom_profiles_or_default().is_empty());
        assert!(matches!(
            store.read_custom_profiles(),
            Err(PersistenceError::Parse { .. })
        ));
    }

    #[test]
    fn test_write_then_read_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let mut settings = Settings::default();
        settings.state_map = BTreeMap::from([("battery".to_string(), "Quiet".to_string())]);
        settings.fahrenheit = true;

        write_settings(&settings, store.settings_path()).unwrap();

        assert_eq!(store.read_settings().unwrap(), settings);
    }

    #[test]
    fn test_write_then_read_profiles_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let mut second = Profile::named("Zeta");
        second.fan.minimum_speed = Some(30);
        let profiles = vec![Profile::named("Omega"), second, Profile::named("Alpha")];

        write_profiles(&profiles, store.profiles_path()).unwrap();

        assert_eq!(store.read_custom_profiles().unwrap(), profiles);
    }

    #[test]
    fn test_atomic_write_replaces_target_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings");
        fs::write(&path, "old contents").unwrap();

        write_settings(&Settings::default(), &path).unwrap();

        assert!(!staging_path(&path).exists());
        let reread: Settings = read_json(&path).unwrap();
        assert_eq!(reread, Settings::default());
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("profiles");

        write_profiles(&[Profile::named("One")], &path).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // Parent "directory" is a regular file, so nothing can be created below it
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let result = write_settings(&Settings::default(), &blocker.join("settings"));
        assert!(matches!(result, Err(PersistenceError::Io { .. })));
    }

    #[test]
    fn test_staging_path_is_sibling() {
        assert_eq!(
            staging_path(Path::new("/tmp/tmphwpsettings")),
            PathBuf::from("/tmp/tmphwpsettings.tmp")
        );
    }
}
