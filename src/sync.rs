//! Front-end view of settings and profiles
//!
//! `ConfigService` owns the cached settings and catalog, the editing session
//! and the commit channel. The caches change only in [`ConfigService::resync`],
//! which runs at construction and after every successful commit. Mutations
//! build a new desired state, commit it, then resync; the cached objects are
//! never modified in place.
//!
//! Expected failures (unknown name, duplicate name, nothing to commit) are
//! reported as `Ok(false)`. Infrastructure failures are `Err(CommitError)`.

use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::catalog::ProfileCatalog;
use crate::commit::{CommitChannel, CommitError};
use crate::config::{Profile, Settings};
use crate::persistence::ConfigStore;
use crate::staging::{EditSession, Rebase};

pub struct ConfigService<C: CommitChannel> {
    store: ConfigStore,
    channel: C,
    catalog: ProfileCatalog,
    settings: Settings,
    session: EditSession,
    settings_subscribers: Vec<Sender<Settings>>,
    editing_subscribers: Vec<Sender<Option<Profile>>>,
}

/// Send to every subscriber, dropping the ones whose receiver is gone
fn publish<T: Clone>(subscribers: &mut Vec<Sender<T>>, value: &T) {
    subscribers.retain(|tx| tx.send(value.clone()).is_ok());
}

impl<C: CommitChannel> ConfigService<C> {
    pub fn new(store: ConfigStore, channel: C) -> Self {
        let mut service = Self {
            store,
            channel,
            catalog: ProfileCatalog::default(),
            settings: Settings::default(),
            session: EditSession::Idle,
            settings_subscribers: Vec::new(),
            editing_subscribers: Vec::new(),
        };
        service.resync();
        service
    }

    /// Re-read settings and custom profiles from disk and notify subscribers
    pub fn resync(&mut self) {
        self.catalog
            .replace_custom_profiles(self.store.read_custom_profiles_or_default());
        self.settings = self.store.read_settings_or_default();
        debug!(
            settings = %self.store.settings_path().display(),
            profiles = %self.store.profiles_path().display(),
            customs = self.catalog.customs().len(),
            states = self.settings.state_map.len(),
            "Resynchronized with authoritative files"
        );
        publish(&mut self.settings_subscribers, &self.settings);

        match self.session.rebase(self.catalog.customs()) {
            Rebase::Unchanged => {}
            Rebase::Moved => debug!(index = ?self.session.index(), "Edited profile moved, session rebased"),
            Rebase::Dropped => {
                warn!("Edited profile no longer exists, ending editing session");
                publish(&mut self.editing_subscribers, &None);
            }
        }
    }

    /// Receives the settings after every resync
    pub fn subscribe_settings(&mut self) -> Receiver<Settings> {
        let (tx, rx) = mpsc::channel();
        self.settings_subscribers.push(tx);
        rx
    }

    /// Receives the working copy whenever the editing session starts or ends
    pub fn subscribe_editing(&mut self) -> Receiver<Option<Profile>> {
        let (tx, rx) = mpsc::channel();
        self.editing_subscribers.push(tx);
        rx
    }

    pub fn settings(&self) -> Settings {
        self.settings.clone()
    }

    pub fn default_profiles(&self) -> Vec<Profile> {
        self.catalog.default_profiles()
    }

    pub fn custom_profiles(&self) -> Vec<Profile> {
        self.catalog.custom_profiles()
    }

    pub fn all_profiles(&self) -> Vec<Profile> {
        self.catalog.all_profiles()
    }

    pub fn profile_by_name(&self, name: &str) -> Option<Profile> {
        self.catalog.find_by_name(name)
    }

    pub fn custom_profile_by_name(&self, name: &str) -> Option<Profile> {
        self.catalog.find_custom_by_name(name)
    }

    pub fn is_default_profile(&self, name: &str) -> bool {
        self.catalog.is_default_name(name)
    }

    /// Assign `profile_name` to `state_id`. The new settings are built from
    /// a fresh read of the settings file, not from the cache.
    pub fn set_active_profile(&mut self, profile_name: &str, state_id: &str) -> Result<(), CommitError> {
        let base = self.store.read_settings_or_default();
        let new_settings = base.with_profile_for_state(state_id, profile_name);
        info!(state = %state_id, profile = %profile_name, "Setting active profile");
        self.channel.commit_settings(&new_settings)?;
        self.resync();
        Ok(())
    }

    /// Copy any profile to a new custom profile called `new_name`. Fails
    /// without changes if the source is unknown or `new_name` is taken.
    pub fn copy_profile(&mut self, name: &str, new_name: &str) -> Result<bool, CommitError> {
        let fresh = ProfileCatalog::new(self.store.read_custom_profiles_or_default());
        let Some(mut copy) = fresh.find_by_name(name) else {
            warn!(profile = %name, "Cannot copy unknown profile");
            return Ok(false);
        };
        if fresh.contains_name(new_name) {
            warn!(profile = %new_name, "Cannot copy, name already exists");
            return Ok(false);
        }

        copy.name = new_name.to_string();
        let mut customs = fresh.custom_profiles();
        customs.push(copy);
        info!(from = %name, to = %new_name, "Copying profile");
        self.write_custom_profiles(&customs)?;
        Ok(true)
    }

    /// Remove the custom profile called `name`. Built-in profiles are never
    /// touched; an unknown name is a no-op failure. State map entries that
    /// still reference the profile are left dangling.
    pub fn delete_custom_profile(&mut self, name: &str) -> Result<bool, CommitError> {
        let customs = self.store.read_custom_profiles_or_default();
        let remaining: Vec<Profile> = customs.iter().filter(|p| p.name != name).cloned().collect();
        if remaining.len() == customs.len() {
            warn!(profile = %name, "Cannot delete, no such custom profile");
            return Ok(false);
        }

        info!(profile = %name, "Deleting custom profile");
        self.write_custom_profiles(&remaining)?;
        Ok(true)
    }

    /// Commit a complete custom profile collection and resync
    pub fn write_custom_profiles(&mut self, profiles: &[Profile]) -> Result<(), CommitError> {
        self.channel.commit_profiles(profiles)?;
        self.resync();
        Ok(())
    }

    /// Start editing the custom profile `name`, or end the session with
    /// `None`. Any uncommitted changes of a previous session are discarded.
    /// Returns false if `name` is not a custom profile (the session is
    /// then idle).
    pub fn begin_edit(&mut self, name: Option<&str>) -> bool {
        if self.session.has_changes(self.catalog.customs()) {
            debug!(index = ?self.session.index(), "Discarding uncommitted edit");
        }

        self.session = match name {
            Some(name) => EditSession::begin(self.catalog.customs(), name),
            None => EditSession::Idle,
        };
        publish(&mut self.editing_subscribers, &self.session.working_copy().cloned());

        match name {
            Some(name) if !self.session.is_editing() => {
                warn!(profile = %name, "Cannot edit, no such custom profile");
                false
            }
            _ => true,
        }
    }

    pub fn editing_profile(&self) -> Option<&Profile> {
        self.session.working_copy()
    }

    /// Working copy for in-place edits by the caller
    pub fn editing_profile_mut(&mut self) -> Option<&mut Profile> {
        self.session.working_copy_mut()
    }

    /// True if the working copy differs from the last synchronized version
    pub fn has_changes(&self) -> bool {
        self.session.has_changes(self.catalog.customs())
    }

    /// Commit the working copy. Returns Ok(false) when idle, unchanged or
    /// renamed onto an empty or existing name. On failure the session stays
    /// as it was so the caller can retry.
    pub fn write_current_editing_profile(&mut self) -> Result<bool, CommitError> {
        if !self.has_changes() {
            return Ok(false);
        }
        let (Some(original), Some(working)) = (self.session.original_name(), self.session.working_copy()) else {
            return Ok(false);
        };
        if working.name != original {
            if working.name.trim().is_empty() {
                warn!(profile = %original, "Cannot rename profile to an empty name");
                return Ok(false);
            }
            if self.catalog.contains_name(&working.name) {
                warn!(profile = %original, to = %working.name, "Cannot rename, name already exists");
                return Ok(false);
            }
        }
        let Some(staged) = self.session.staged_collection(self.catalog.customs()) else {
            return Ok(false);
        };

        self.channel.commit_profiles(&staged)?;
        info!(index = ?self.session.index(), "Committed edited profile");
        self.session = EditSession::Idle;
        publish(&mut self.editing_subscribers, &None);
        self.resync();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::rc::Rc;

    /// Writes straight to the authoritative files, or fails on demand
    #[derive(Clone)]
    struct StubChannel {
        store: ConfigStore,
        fail: Rc<RefCell<bool>>,
        commits: Rc<RefCell<usize>>,
    }

    impl StubChannel {
        fn new(store: ConfigStore) -> Self {
            Self {
                store,
                fail: Rc::new(RefCell::new(false)),
                commits: Rc::new(RefCell::new(0)),
            }
        }

        fn check(&self) -> Result<(), CommitError> {
            *self.commits.borrow_mut() += 1;
            if *self.fail.borrow() {
                Err(CommitError::PrivilegeDenied)
            } else {
                Ok(())
            }
        }
    }

    impl CommitChannel for StubChannel {
        fn commit_settings(&mut self, settings: &Settings) -> Result<(), CommitError> {
            self.check()?;
            persistence::write_settings(settings, self.store.settings_path())?;
            Ok(())
        }

        fn commit_profiles(&mut self, profiles: &[Profile]) -> Result<(), CommitError> {
            self.check()?;
            persistence::write_profiles(profiles, self.store.profiles_path())?;
            Ok(())
        }
    }

    fn performance(speed: u8) -> Profile {
        let mut profile = Profile::named("Performance");
        profile.fan.minimum_speed = Some(speed);
        profile
    }

    fn service_in(dir: &Path, customs: &[Profile]) -> (ConfigService<StubChannel>, StubChannel) {
        let store = ConfigStore::new(dir.join("settings"), dir.join("profiles"));
        if !customs.is_empty() {
            persistence::write_profiles(customs, store.profiles_path()).unwrap();
        }
        let channel = StubChannel::new(store.clone());
        (ConfigService::new(store, channel.clone()), channel)
    }

    fn custom_names(service: &ConfigService<StubChannel>) -> Vec<String> {
        service.custom_profiles().into_iter().map(|p| p.name).collect()
    }

    #[test]
    fn test_startup_with_no_files_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_in(dir.path(), &[]);

        assert_eq!(service.settings(), Settings::default());
        assert!(service.custom_profiles().is_empty());
        assert_eq!(service.all_profiles().len(), 3);
        assert!(!service.has_changes());
    }

    #[test]
    fn test_edit_commit_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[performance(50)]);

        assert!(service.begin_edit(Some("Performance")));
        assert!(!service.has_changes());

        service.editing_profile_mut().unwrap().fan.minimum_speed = Some(80);
        assert!(service.has_changes());

        assert!(service.write_current_editing_profile().unwrap());
        assert!(!service.has_changes());
        assert!(service.editing_profile().is_none());
        assert_eq!(service.custom_profiles(), vec![performance(80)]);
    }

    #[test]
    fn test_failed_commit_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, channel) = service_in(dir.path(), &[performance(50)]);
        service.begin_edit(Some("Performance"));
        service.editing_profile_mut().unwrap().fan.minimum_speed = Some(80);
        *channel.fail.borrow_mut() = true;

        let result = service.write_current_editing_profile();

        assert!(matches!(result, Err(CommitError::PrivilegeDenied)));
        assert!(service.has_changes());
        assert_eq!(service.editing_profile(), Some(&performance(80)));
        assert_eq!(service.custom_profiles(), vec![performance(50)]);

        // Retry succeeds with the intact working copy
        *channel.fail.borrow_mut() = false;
        assert!(service.write_current_editing_profile().unwrap());
        assert_eq!(service.custom_profiles(), vec![performance(80)]);
    }

    #[test]
    fn test_commit_without_changes_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, channel) = service_in(dir.path(), &[performance(50)]);

        assert!(!service.write_current_editing_profile().unwrap());
        service.begin_edit(Some("Performance"));
        assert!(!service.write_current_editing_profile().unwrap());
        assert_eq!(*channel.commits.borrow(), 0);
    }

    #[test]
    fn test_begin_edit_unknown_or_default_name_goes_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[performance(50)]);
        service.begin_edit(Some("Performance"));

        assert!(!service.begin_edit(Some("Balanced")));
        assert!(service.editing_profile().is_none());

        assert!(service.begin_edit(Some("Performance")));
        assert!(service.begin_edit(None));
        assert!(service.editing_profile().is_none());
    }

    #[test]
    fn test_new_session_discards_uncommitted_edit() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[performance(50), Profile::named("Office")]);
        service.begin_edit(Some("Performance"));
        service.editing_profile_mut().unwrap().fan.minimum_speed = Some(99);

        assert!(service.begin_edit(Some("Office")));
        assert!(service.begin_edit(Some("Performance")));

        assert_eq!(service.editing_profile(), Some(&performance(50)));
        assert!(!service.has_changes());
    }

    #[test]
    fn test_rename_onto_existing_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, channel) = service_in(dir.path(), &[performance(50), Profile::named("Office")]);
        service.begin_edit(Some("Performance"));

        for taken in ["Office", "Balanced", "  "] {
            service.editing_profile_mut().unwrap().name = taken.to_string();
            assert!(!service.write_current_editing_profile().unwrap());
        }

        assert_eq!(*channel.commits.borrow(), 0);
        assert!(service.has_changes());
        assert_eq!(custom_names(&service), vec!["Performance", "Office"]);
    }

    #[test]
    fn test_rename_to_free_name_commits() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[performance(50), Profile::named("Office")]);
        service.begin_edit(Some("Performance"));
        service.editing_profile_mut().unwrap().name = "Turbo".to_string();

        assert!(service.write_current_editing_profile().unwrap());
        assert_eq!(custom_names(&service), vec!["Turbo", "Office"]);
    }

    #[test]
    fn test_delete_before_edited_profile_keeps_session_clean() {
        let dir = tempfile::tempdir().unwrap();
        let customs = [Profile::named("A"), Profile::named("B"), Profile::named("C")];
        let (mut service, _) = service_in(dir.path(), &customs);
        service.begin_edit(Some("B"));

        assert!(service.delete_custom_profile("A").unwrap());

        assert!(!service.has_changes());
        assert_eq!(service.editing_profile().map(|p| p.name.as_str()), Some("B"));
    }

    #[test]
    fn test_rename_commit_after_delete_targets_edited_profile() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[Profile::named("A"), Profile::named("B")]);
        service.begin_edit(Some("B"));
        service.editing_profile_mut().unwrap().name = "X".to_string();

        assert!(service.delete_custom_profile("A").unwrap());
        assert!(service.write_current_editing_profile().unwrap());

        assert_eq!(custom_names(&service), vec!["X"]);
    }

    #[test]
    fn test_copy_during_edit_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[performance(50)]);
        service.begin_edit(Some("Performance"));
        service.editing_profile_mut().unwrap().fan.minimum_speed = Some(80);

        assert!(service.copy_profile("Quiet", "Quieter").unwrap());
        assert!(service.write_current_editing_profile().unwrap());

        assert_eq!(custom_names(&service), vec!["Performance", "Quieter"]);
        assert_eq!(service.custom_profile_by_name("Performance"), Some(performance(80)));
    }

    #[test]
    fn test_deleting_edited_profile_ends_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, channel) = service_in(dir.path(), &[performance(50), Profile::named("Office")]);
        let rx = service.subscribe_editing();
        service.begin_edit(Some("Performance"));
        service.editing_profile_mut().unwrap().fan.minimum_speed = Some(80);

        assert!(service.delete_custom_profile("Performance").unwrap());

        assert!(service.editing_profile().is_none());
        assert!(!service.write_current_editing_profile().unwrap());
        assert_eq!(*channel.commits.borrow(), 1);
        assert_eq!(custom_names(&service), vec!["Office"]);
        let events: Vec<Option<Profile>> = rx.try_iter().collect();
        assert_eq!(events, vec![Some(performance(50)), None]);
    }

    #[test]
    fn test_set_active_profile_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[]);
        let mut base = Settings::default();
        base.state_map = BTreeMap::from([
            ("battery".to_string(), "Balanced".to_string()),
            ("AC".to_string(), "Powersave".to_string()),
        ]);
        persistence::write_settings(&base, &dir.path().join("settings")).unwrap();
        service.resync();

        service.set_active_profile("Quiet", "battery").unwrap();

        let settings = service.settings();
        assert_eq!(settings.profile_for_state("battery"), Some("Quiet"));
        assert_eq!(settings.profile_for_state("AC"), Some("Powersave"));
        assert_eq!(settings.state_map.len(), 2);
    }

    #[test]
    fn test_set_active_profile_uses_fresh_base() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[]);
        // Another writer adds a state behind the cache's back
        let external = Settings::default().with_profile_for_state("docked", "Powersave");
        persistence::write_settings(&external, &dir.path().join("settings")).unwrap();

        service.set_active_profile("Quiet", "power_bat").unwrap();

        let settings = service.settings();
        assert_eq!(settings.profile_for_state("docked"), Some("Powersave"));
        assert_eq!(settings.profile_for_state("power_bat"), Some("Quiet"));
    }

    #[test]
    fn test_settings_round_trip_through_channel() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[]);
        let expected = service.settings().with_profile_for_state("lid_closed", "Powersave");

        service.set_active_profile("Powersave", "lid_closed").unwrap();

        assert_eq!(service.settings(), expected);
    }

    #[test]
    fn test_failed_set_active_profile_leaves_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, channel) = service_in(dir.path(), &[]);
        *channel.fail.borrow_mut() = true;

        assert!(service.set_active_profile("Quiet", "power_ac").is_err());
        assert_eq!(service.settings(), Settings::default());
    }

    #[test]
    fn test_copy_profile_appends_one() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[performance(50)]);

        assert!(service.copy_profile("Quiet", "Quieter").unwrap());

        assert_eq!(custom_names(&service), vec!["Performance", "Quieter"]);
        let copy = service.custom_profile_by_name("Quieter").unwrap();
        let source = service.profile_by_name("Quiet").unwrap();
        assert_eq!(copy.fan, source.fan);
    }

    #[test]
    fn test_copy_profile_name_collision_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, channel) = service_in(dir.path(), &[performance(50)]);

        assert!(!service.copy_profile("Quiet", "Performance").unwrap());
        assert!(!service.copy_profile("Performance", "Balanced").unwrap());
        assert!(!service.copy_profile("Missing", "Fresh").unwrap());

        assert_eq!(custom_names(&service), vec!["Performance"]);
        assert_eq!(*channel.commits.borrow(), 0);
    }

    #[test]
    fn test_delete_custom_profile() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[performance(50), Profile::named("Office")]);

        assert!(service.delete_custom_profile("Performance").unwrap());
        assert_eq!(custom_names(&service), vec!["Office"]);
    }

    #[test]
    fn test_delete_unknown_or_default_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, channel) = service_in(dir.path(), &[performance(50)]);

        assert!(!service.delete_custom_profile("Balanced").unwrap());
        assert!(!service.delete_custom_profile("performance").unwrap());

        assert_eq!(custom_names(&service), vec!["Performance"]);
        assert_eq!(service.default_profiles().len(), 3);
        assert_eq!(*channel.commits.borrow(), 0);
    }

    #[test]
    fn test_delete_leaves_dangling_state_reference() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[performance(50)]);
        service.set_active_profile("Performance", "power_ac").unwrap();

        assert!(service.delete_custom_profile("Performance").unwrap());

        assert_eq!(service.settings().profile_for_state("power_ac"), Some("Performance"));
        assert!(service.profile_by_name("Performance").is_none());
    }

    #[test]
    fn test_lookups_return_copies() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service_in(dir.path(), &[performance(50)]);

        let mut found = service.profile_by_name("Performance").unwrap();
        found.fan.minimum_speed = Some(1);
        let mut settings = service.settings();
        settings.state_map.clear();

        assert_eq!(service.profile_by_name("Performance"), Some(performance(50)));
        assert!(!service.settings().state_map.is_empty());
    }

    #[test]
    fn test_settings_subscribers_notified_once_per_resync() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[]);
        let rx = service.subscribe_settings();

        service.resync();
        service.set_active_profile("Quiet", "power_ac").unwrap();

        let events: Vec<Settings> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].profile_for_state("power_ac"), Some("Quiet"));
    }

    #[test]
    fn test_editing_subscribers_follow_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[performance(50)]);
        let rx = service.subscribe_editing();

        service.begin_edit(Some("Performance"));
        service.editing_profile_mut().unwrap().fan.minimum_speed = Some(80);
        service.write_current_editing_profile().unwrap();
        service.begin_edit(Some("Nope"));

        let events: Vec<Option<Profile>> = rx.try_iter().collect();
        assert_eq!(events, vec![Some(performance(50)), None, None]);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let (mut service, _) = service_in(dir.path(), &[]);
        drop(service.subscribe_settings());
        let kept = service.subscribe_settings();

        service.resync();

        assert_eq!(service.settings_subscribers.len(), 1);
        assert_eq!(kept.try_iter().count(), 1);
    }
}
