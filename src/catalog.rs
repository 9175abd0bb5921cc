//! Built-in and custom profiles
//!
//! Built-in profiles are filled with defaults once at construction and are
//! never mutated afterwards. Lookups hand out clones so callers can't reach
//! the cached objects.

use tracing::debug;

use crate::config::Profile;
use crate::config::profile::builtin_profiles;

#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    defaults: Vec<Profile>,
    customs: Vec<Profile>,
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ProfileCatalog {
    pub fn new(customs: Vec<Profile>) -> Self {
        let mut defaults = builtin_profiles();
        for profile in defaults.iter_mut() {
            profile.fill_defaults();
        }
        debug!(defaults = defaults.len(), customs = customs.len(), "Built profile catalog");
        Self { defaults, customs }
    }

    pub fn default_profiles(&self) -> Vec<Profile> {
        self.defaults.clone()
    }

    pub fn custom_profiles(&self) -> Vec<Profile> {
        self.customs.clone()
    }

    /// Defaults first in declaration order, then customs in persisted order
    pub fn all_profiles(&self) -> Vec<Profile> {
        self.iter_all().cloned().collect()
    }

    /// Exact, case-sensitive lookup across defaults and customs
    pub fn find_by_name(&self, name: &str) -> Option<Profile> {
        self.iter_all().find(|p| p.name == name).cloned()
    }

    pub fn find_custom_by_name(&self, name: &str) -> Option<Profile> {
        self.customs.iter().find(|p| p.name == name).cloned()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.iter_all().any(|p| p.name == name)
    }

    pub fn is_default_name(&self, name: &str) -> bool {
        self.defaults.iter().any(|p| p.name == name)
    }

    /// Replace the cached custom collection (resync only)
    pub fn replace_custom_profiles(&mut self, customs: Vec<Profile>) {
        self.customs = customs;
    }

    /// Borrowed view of the cached customs, for diffing without a copy
    pub(crate) fn customs(&self) -> &[Profile] {
        &self.customs
    }

    fn iter_all(&self) -> impl Iterator<Item = &Profile> {
        self.defaults.iter().chain(self.customs.iter())
    }
}
